use crate::config::GradeThresholds;
use crate::models::{BoundingBox, Grade};

/// Per-band (base, cap) confidence for grade0..grade4
const BAND_CONFIDENCE: [(f64, f64); 5] = [(0.7, 0.95), (0.6, 0.90), (0.5, 0.85), (0.4, 0.80), (0.3, 0.75)];

/// Area above a band floor that adds 1.0 to the confidence
const CONFIDENCE_AREA_SCALE: f64 = 10_000.0;

const CIRCULARITY_BONUS: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;

/// What a classifier gets to look at for one object
#[derive(Debug, Clone, Copy)]
pub struct Measurement<'a> {
    /// Contour area, or box area for external boxes (px²)
    pub area: f64,
    pub circularity: Option<f64>,
    pub bbox: BoundingBox,
    pub image_area: f64,
    /// Score reported by an external detector
    pub score: Option<f64>,
    pub label: Option<&'a str>,
}

impl<'a> Measurement<'a> {
    pub fn from_contour(area: f64, circularity: f64, bbox: BoundingBox) -> Self {
        Self {
            area,
            circularity: Some(circularity),
            bbox,
            image_area: 0.0,
            score: None,
            label: None,
        }
    }
}

/// Maps a measured object to a grade and a confidence in `[0, 1]`
pub trait GradeClassifier: Send + Sync {
    fn classify(&self, measurement: &Measurement) -> (Grade, f64);

    fn name(&self) -> &str;
}

/// Grades contours by pixel area against fixed bands.
#[derive(Debug, Clone, Copy, Default)]
pub struct AreaBandClassifier {
    pub thresholds: GradeThresholds,
}

impl AreaBandClassifier {
    pub fn new(thresholds: GradeThresholds) -> Self {
        Self { thresholds }
    }

    /// Confidence from area alone, before the circularity bonus and final clamp.
    ///
    /// Grows with the distance above the band floor and saturates at the band
    /// cap. Grade5 follows `max(0.3, 0.2 + area / t4)`, which can exceed 1.0
    /// for thresholds far below the area; the final clamp bounds it.
    pub fn area_confidence(&self, grade: Grade, area: f64) -> f64 {
        match BAND_CONFIDENCE.get(grade.index()) {
            Some(&(base, cap)) => {
                let floor = self.thresholds.threshold(grade);
                cap.min(base + (area - floor) / CONFIDENCE_AREA_SCALE)
            }
            None => {
                let t4 = self.thresholds.threshold(Grade::Grade4);
                (0.2 + area / t4).max(0.3)
            }
        }
    }
}

impl GradeClassifier for AreaBandClassifier {
    fn classify(&self, measurement: &Measurement) -> (Grade, f64) {
        let grade = self.thresholds.grade_for(measurement.area);
        let mut confidence = self.area_confidence(grade, measurement.area);
        if let Some(circularity) = measurement.circularity {
            confidence += CIRCULARITY_BONUS * circularity;
        }
        (grade, confidence.clamp(0.0, MAX_CONFIDENCE))
    }

    fn name(&self) -> &str {
        "contour-area"
    }
}
