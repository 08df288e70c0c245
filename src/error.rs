use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Edge detection failed: {0}")]
    EdgeDetection(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DetectionError>;
