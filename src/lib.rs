pub mod batch;
pub mod config;
pub mod debug;
pub mod detection;
pub mod error;
pub mod logger;
pub mod models;
pub mod pipeline;

pub use config::{DetectorConfig, EdgeConfig, GradeThresholds, PreprocessConfig, Profile};
pub use detection::boxes::{grade_from_box_ratio, grade_from_label, BoxGrader, BoxRatioClassifier, ExternalBox};
pub use detection::grading::{AreaBandClassifier, GradeClassifier, Measurement};
pub use detection::shapes::Rejection;
pub use detection::{decode_image, image_from_rgb, DetectionPipeline, StageImages};
pub use error::{DetectionError, Result};
pub use models::{BoundingBox, Contour, Detection, DetectionResult, Grade, GradeCounts};
pub use pipeline::{DiagnosticEvent, PipelineContext, Stage};
