#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from eggsize for tests
pub use eggsize::{
    DetectionPipeline, DetectionResult, DetectorConfig, Grade, GradeCounts, Profile, Stage,
};
