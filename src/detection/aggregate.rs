use crate::detection::shapes::Rejection;
use crate::models::{BoundingBox, Detection, DetectionResult, Grade, GradeCounts};
use crate::pipeline::{PipelineContext, Stage};

/// Collects graded objects into a `DetectionResult`.
///
/// Ids are assigned 1-based in the order objects are accepted. Every object
/// offered counts as processed, accepted or not.
#[derive(Debug)]
pub struct ResultBuilder {
    min_confidence: f64,
    processed: usize,
    detections: Vec<Detection>,
    grade_counts: GradeCounts,
}

impl ResultBuilder {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            min_confidence,
            processed: 0,
            detections: Vec::new(),
            grade_counts: GradeCounts::default(),
        }
    }

    /// Offer one graded object.
    ///
    /// Objects below the confidence floor are dropped and the drop is recorded
    /// in `context`; the accepted detection is returned otherwise.
    pub fn push(
        &mut self,
        grade: Grade,
        confidence: f64,
        area: f64,
        bbox: BoundingBox,
        context: &mut PipelineContext,
    ) -> Option<&Detection> {
        self.processed += 1;

        if confidence < self.min_confidence {
            let reason = Rejection::LowConfidence { confidence };
            context.record(Stage::Grading, format!("object {} dropped: {}", self.processed, reason));
            return None;
        }

        self.grade_counts.increment(grade);
        let detection = Detection {
            id: self.detections.len() + 1,
            grade,
            confidence: round_to(confidence, 2),
            area: area.max(0.0).round() as u64,
            bbox,
        };
        context.record(
            Stage::Grading,
            format!(
                "object {} -> #{} {} (confidence {:.2}, area {})",
                self.processed, detection.id, grade, detection.confidence, detection.area
            ),
        );
        self.detections.push(detection);
        self.detections.last()
    }

    pub fn finish(self, context: &mut PipelineContext) -> DetectionResult {
        let total_eggs = self.detections.len();
        let success_percent = success_percent(total_eggs, self.processed);
        context.record(
            Stage::Aggregation,
            format!(
                "{} of {} objects accepted ({:.1}%)",
                total_eggs, self.processed, success_percent
            ),
        );
        DetectionResult {
            detections: self.detections,
            grade_counts: self.grade_counts,
            total_eggs,
            success_percent,
            processed_contours: self.processed,
            error: None,
        }
    }
}

/// `accepted / max(1, processed) × 100`, one decimal
pub fn success_percent(accepted: usize, processed: usize) -> f64 {
    round_to(accepted as f64 / processed.max(1) as f64 * 100.0, 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox { x: 10, y: 20, width: 30, height: 40 }
    }

    #[test]
    fn ids_are_sequential_over_accepted_objects() {
        let mut context = PipelineContext::new();
        let mut builder = ResultBuilder::new(0.5);
        builder.push(Grade::Grade1, 0.8, 13000.0, bbox(), &mut context).unwrap();
        assert!(builder.push(Grade::Grade2, 0.2, 8000.0, bbox(), &mut context).is_none());
        builder.push(Grade::Grade4, 0.6, 2000.4, bbox(), &mut context).unwrap();

        let result = builder.finish(&mut context);
        let ids: Vec<_> = result.detections.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(result.detections[1].area, 2000);
        assert_eq!(result.grade_counts.grade2_count, 0);
        assert_eq!(result.grade_counts.total() as usize, result.total_eggs);
    }

    #[test]
    fn success_percent_matches_recomputation() {
        let mut context = PipelineContext::new();
        let mut builder = ResultBuilder::new(0.5);
        for confidence in [0.9, 0.4, 0.7] {
            builder.push(Grade::Grade3, confidence, 4000.0, bbox(), &mut context);
        }
        let result = builder.finish(&mut context);
        let expected = ((100.0 * 2.0 / 3.0) * 10.0f64).round() / 10.0;
        assert_eq!(result.success_percent, expected);
        assert_eq!(result.success_percent, 66.7);
        assert_eq!(result.processed_contours, 3);
    }

    #[test]
    fn dropped_objects_are_recorded() {
        let mut context = PipelineContext::new();
        let mut builder = ResultBuilder::new(0.5);
        builder.push(Grade::Grade2, 0.3, 8000.0, bbox(), &mut context);

        let messages: Vec<_> = context.events_for(Stage::Grading).map(|e| e.message.clone()).collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("dropped"), "{:?}", messages);
        assert!(messages[0].contains("0.30"), "{:?}", messages);
        assert_eq!(builder.finish(&mut context).processed_contours, 1);
    }

    #[test]
    fn empty_run_reports_zero_percent() {
        let mut context = PipelineContext::new();
        let result = ResultBuilder::new(0.1).finish(&mut context);
        assert_eq!(result.total_eggs, 0);
        assert_eq!(result.success_percent, 0.0);
        assert_eq!(result.processed_contours, 0);
        assert!(result.error.is_none());
    }

    #[test]
    fn confidence_is_rounded_to_two_decimals() {
        let mut context = PipelineContext::new();
        let mut builder = ResultBuilder::new(0.0);
        let detection = builder.push(Grade::Grade0, 0.87654, 20000.0, bbox(), &mut context).unwrap();
        assert_eq!(detection.confidence, 0.88);
    }
}
