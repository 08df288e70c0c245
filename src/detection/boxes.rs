//! Grading for boxes produced by an external detector.
//!
//! A box is graded from an explicit grade token in its class label when there
//! is one, otherwise from the share of the image its box covers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use crate::detection::aggregate::ResultBuilder;
use crate::detection::grading::{GradeClassifier, Measurement};
use crate::models::{BoundingBox, DetectionResult, Grade};
use crate::pipeline::{PipelineContext, Stage};

/// Box-area / image-area floors for grade0..grade4
const BOX_RATIO_BANDS: [f64; 5] = [0.12, 0.09, 0.06, 0.04, 0.02];

/// `grade<d>`, `no<d>` or `no.<d>` anywhere in a normalized label
static GRADE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(grade|no\.?)([0-5])")
        .unwrap_or_else(|e| panic!("Failed to compile grade token pattern: {e}"))
});

/// One box from an external detector, `bbox` is `[x, y, width, height]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalBox {
    pub bbox: [f64; 4],
    pub score: f64,
    #[serde(default)]
    pub label: Option<String>,
}

impl ExternalBox {
    pub fn width(&self) -> f64 {
        sanitize(self.bbox[2])
    }

    pub fn height(&self) -> f64 {
        sanitize(self.bbox[3])
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            x: sanitize(self.bbox[0]).round() as u32,
            y: sanitize(self.bbox[1]).round() as u32,
            width: self.width().round() as u32,
            height: self.height().round() as u32,
        }
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .replace('-', "_")
        .replace(' ', "")
}

/// Explicit grade named by a class label, e.g. `grade3`, `No.2`, `egg-large`
pub fn grade_from_label(label: &str) -> Option<Grade> {
    let name = normalize_label(label);
    if let Some(caps) = GRADE_TOKEN.captures(&name) {
        return caps[2].parse().ok().and_then(Grade::from_index);
    }
    match name.as_str() {
        "egg_small" | "small" | "eggs" => Some(Grade::Grade4),
        "egg_medium" | "medium" => Some(Grade::Grade2),
        "egg_large" | "large" => Some(Grade::Grade1),
        _ => None,
    }
}

/// Grade from the fraction of the image a box covers
pub fn grade_from_box_ratio(box_area: f64, image_area: f64) -> Grade {
    let ratio = if image_area > 0.0 { box_area / image_area } else { 0.0 };
    BOX_RATIO_BANDS
        .iter()
        .position(|floor| ratio >= *floor)
        .and_then(Grade::from_index)
        .unwrap_or(Grade::Grade5)
}

/// Label first, box ratio as fallback; confidence is the detector score
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxRatioClassifier;

impl GradeClassifier for BoxRatioClassifier {
    fn classify(&self, measurement: &Measurement) -> (Grade, f64) {
        let grade = measurement
            .label
            .and_then(grade_from_label)
            .unwrap_or_else(|| grade_from_box_ratio(measurement.area, measurement.image_area));
        let confidence = measurement.score.filter(|s| s.is_finite()).unwrap_or(0.0);
        (grade, confidence.clamp(0.0, 1.0))
    }

    fn name(&self) -> &str {
        "box-ratio"
    }
}

/// Turns external detector boxes into a `DetectionResult`
pub struct BoxGrader {
    classifier: Box<dyn GradeClassifier>,
    min_confidence: f64,
}

impl BoxGrader {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            classifier: Box::new(BoxRatioClassifier),
            min_confidence,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn GradeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn grade_boxes(&self, boxes: &[ExternalBox], width: u32, height: u32) -> DetectionResult {
        let mut context = PipelineContext::new();
        self.grade_boxes_with_context(boxes, width, height, &mut context)
    }

    pub fn grade_boxes_with_context(
        &self,
        boxes: &[ExternalBox],
        width: u32,
        height: u32,
        context: &mut PipelineContext,
    ) -> DetectionResult {
        let image_area = width as f64 * height as f64;
        context.record(
            Stage::Grading,
            format!("grading {} external boxes with {}", boxes.len(), self.classifier.name()),
        );

        let mut builder = ResultBuilder::new(self.min_confidence);
        for b in boxes {
            let bbox = b.bounding_box();
            let measurement = Measurement {
                area: b.area(),
                circularity: None,
                bbox,
                image_area,
                score: Some(b.score),
                label: b.label.as_deref(),
            };
            let (grade, confidence) = self.classifier.classify(&measurement);
            builder.push(grade, confidence, measurement.area, bbox, context);
        }
        builder.finish(context)
    }
}
