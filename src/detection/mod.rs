pub mod preprocessing;
pub mod edges;
pub mod contours;
pub mod shapes;
pub mod grading;
pub mod aggregate;
pub mod boxes;

use image::{DynamicImage, GrayImage, RgbImage};
use crate::config::DetectorConfig;
use crate::error::{DetectionError, Result};
use crate::models::DetectionResult;
use crate::pipeline::{DiagnosticEvent, PipelineContext, Stage};
use aggregate::ResultBuilder;
use grading::{AreaBandClassifier, GradeClassifier, Measurement};
use shapes::ShapeFilter;

/// Intermediate images of one run, kept for debug output
pub struct StageImages {
    pub grayscale: GrayImage,
    pub edges: GrayImage,
}

/// Main detection pipeline orchestrator.
///
/// Holds a validated, read-only configuration. Every call allocates its own
/// buffers and diagnostics, so one pipeline can serve many threads at once.
pub struct DetectionPipeline {
    config: DetectorConfig,
    classifier: Box<dyn GradeClassifier>,
}

impl DetectionPipeline {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let classifier = Box::new(AreaBandClassifier::new(config.grade_thresholds));
        Ok(Self { config, classifier })
    }

    /// Replace the contour grader
    pub fn with_classifier(mut self, classifier: Box<dyn GradeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run the full detection pipeline on an image.
    ///
    /// Never fails: a stage error yields a degraded result carrying the message.
    pub fn detect(&self, img: &DynamicImage) -> DetectionResult {
        self.detect_with_diagnostics(img).0
    }

    /// Like [`detect`](Self::detect), also returning what each stage recorded
    pub fn detect_with_diagnostics(&self, img: &DynamicImage) -> (DetectionResult, Vec<DiagnosticEvent>) {
        let mut context = PipelineContext::new();
        let result = match self.run(img, &mut context) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, width = img.width(), height = img.height(), "detection failed");
                DetectionResult::degraded(e.to_string())
            }
        };
        (result, context.into_events())
    }

    /// Grayscale and edge mask exactly as the detector sees them
    pub fn stage_images(&self, img: &DynamicImage) -> Result<StageImages> {
        let mut context = PipelineContext::new();
        let grayscale = preprocessing::preprocess(img, &self.config.preprocess, &mut context)?;
        let edges = edges::detect_edges(&grayscale, &self.config.edges, &mut context)?;
        Ok(StageImages { grayscale, edges })
    }

    fn run(&self, img: &DynamicImage, context: &mut PipelineContext) -> Result<DetectionResult> {
        let gray = preprocessing::preprocess(img, &self.config.preprocess, context)?;
        let edge_mask = edges::detect_edges(&gray, &self.config.edges, context)?;
        let all_contours = contours::find_external_contours(&edge_mask, context);

        let filter = ShapeFilter::from_config(&self.config);
        let candidates = filter.filter(all_contours, context);

        context.record(
            Stage::Grading,
            format!("grading {} candidates with {}", candidates.len(), self.classifier.name()),
        );
        let mut builder = ResultBuilder::new(self.config.min_confidence);
        for candidate in &candidates {
            let metrics = &candidate.metrics;
            let measurement = Measurement::from_contour(metrics.area, metrics.circularity, metrics.bbox);
            let (grade, confidence) = self.classifier.classify(&measurement);
            builder.push(grade, confidence, metrics.area, metrics.bbox, context);
        }

        let result = builder.finish(context);
        tracing::info!(
            eggs = result.total_eggs,
            processed = result.processed_contours,
            success_percent = result.success_percent,
            "detection complete"
        );
        Ok(result)
    }
}

/// Decode an encoded image (PNG, JPEG, ...) from memory
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| DetectionError::Decode(e.to_string()))
}

/// Wrap raw interleaved RGB bytes; `pixels` must hold exactly `width * height * 3` bytes
pub fn image_from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<DynamicImage> {
    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(DetectionError::Decode(format!(
            "expected {} bytes for {}x{} RGB, got {}",
            expected,
            width,
            height,
            pixels.len()
        )));
    }
    RgbImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| DetectionError::Decode("pixel buffer does not match dimensions".to_string()))
}
