mod common;

use common::*;

#[test]
fn test_detection_is_idempotent() {
    let pipeline = default_pipeline();
    let img = tray_image();
    let first = pipeline.detect(&img);
    let second = pipeline.detect(&img);
    assert_eq!(first, second);
}

#[test]
fn test_input_image_is_not_modified() {
    let pipeline = default_pipeline();
    let img = large_egg_image();
    let before = img.clone();
    pipeline.detect(&img);
    assert_eq!(img, before);
}

#[test]
fn test_elongated_shape_is_never_detected() {
    // Roughly 250 x 50 after edge growth, aspect ratio about 5
    let img = draw_eggs(400, 200, &[Egg::new(200.0, 100.0, 120.0, 20.0)]);
    let pipeline = default_pipeline();
    let (result, events) = pipeline.detect_with_diagnostics(&img);

    assert_eq!(result.total_eggs, 0, "{:?}", result);
    assert!(
        events
            .iter()
            .any(|e| e.stage == Stage::ShapeFilter && e.message.contains("aspect ratio")),
        "{:?}",
        events
    );
}

#[test]
fn test_detections_respect_aspect_bounds() {
    let config = DetectorConfig {
        min_aspect: 0.9,
        max_aspect: 1.1,
        ..DetectorConfig::default()
    };
    let result = pipeline_with(config).detect(&tray_image());

    // Only the round eggs survive
    assert!(!result.detections.is_empty());
    for detection in &result.detections {
        let aspect = detection.bbox.width as f64 / detection.bbox.height as f64;
        assert!((0.9..=1.1).contains(&aspect), "aspect {}", aspect);
    }
    assert_eq!(result.grade_counts.grade0_count + result.grade_counts.grade2_count, 0);
}

#[test]
fn test_low_circularity_is_rejected_even_when_size_fits() {
    let config = DetectorConfig {
        min_circularity: 0.97,
        ..DetectorConfig::default()
    };
    let (result, events) = pipeline_with(config).detect_with_diagnostics(&large_egg_image());

    assert_eq!(result.total_eggs, 0);
    assert!(result.error.is_none());
    assert!(
        events.iter().any(|e| e.message.contains("circularity")),
        "{:?}",
        events
    );
}

#[test]
fn test_area_bounds_are_respected() {
    let config = DetectorConfig {
        max_area: 15_000.0,
        ..DetectorConfig::default()
    };
    let result = pipeline_with(config).detect(&tray_image());

    assert_eq!(result.grade_counts.grade0_count, 0);
    assert_eq!(result.grade_counts.grade1_count, 0);
    assert!(result.detections.iter().all(|d| d.area <= 15_000));
    assert_eq!(result.grade_counts.grade2_count, 1);
}

#[test]
fn test_confidence_floor_drops_detections() {
    let config = DetectorConfig {
        min_confidence: 0.6,
        ..DetectorConfig::default()
    };
    let result = pipeline_with(config).detect(&tray_image());

    assert!(result.detections.iter().all(|d| d.confidence >= 0.6));
    // The grade4 egg sits near the bottom of its band
    assert_eq!(result.grade_counts.grade4_count, 0);
    assert!(result.processed_contours > result.total_eggs);
}

#[test]
fn test_success_percent_matches_recomputation() {
    let config = DetectorConfig {
        min_confidence: 0.6,
        ..DetectorConfig::default()
    };
    let result = pipeline_with(config).detect(&tray_image());

    let expected = (100.0 * result.total_eggs as f64 / result.processed_contours.max(1) as f64 * 10.0).round() / 10.0;
    assert_eq!(result.success_percent, expected);
}

#[test]
fn test_every_stage_reports_diagnostics() {
    let pipeline = default_pipeline();
    let (_, events) = pipeline.detect_with_diagnostics(&large_egg_image());

    for stage in [
        Stage::Preprocess,
        Stage::EdgeDetection,
        Stage::ContourExtraction,
        Stage::ShapeFilter,
        Stage::Grading,
        Stage::Aggregation,
    ] {
        assert!(events.iter().any(|e| e.stage == stage), "no events for {}", stage);
    }
}

#[test]
fn test_confidence_stays_in_range() {
    let pipeline = default_pipeline();
    for img in [large_egg_image(), small_egg_image(), tray_image()] {
        for detection in pipeline.detect(&img).detections {
            assert!((0.0..=0.95).contains(&detection.confidence));
        }
    }
}
