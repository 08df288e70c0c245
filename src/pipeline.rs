use serde::Serialize;
use std::fmt;

/// Pipeline stage identifiers, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preprocess,
    EdgeDetection,
    ContourExtraction,
    ShapeFilter,
    Grading,
    Aggregation,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Preprocess => "Preprocess",
            Stage::EdgeDetection => "Edge Detection",
            Stage::ContourExtraction => "Contour Extraction",
            Stage::ShapeFilter => "Shape Filter",
            Stage::Grading => "Grading",
            Stage::Aggregation => "Aggregation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A diagnostic note produced while running one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEvent {
    pub stage: Stage,
    pub message: String,
}

/// Context owned by a single detection run.
///
/// Stages record what they did here instead of writing to shared state, so
/// concurrent runs never interleave their diagnostics. Every event is also
/// forwarded to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct PipelineContext {
    events: Vec<DiagnosticEvent>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(stage = stage.name(), "{}", message);
        self.events.push(DiagnosticEvent { stage, message });
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    /// Events recorded by one stage
    pub fn events_for(&self, stage: Stage) -> impl Iterator<Item = &DiagnosticEvent> {
        self.events.iter().filter(move |e| e.stage == stage)
    }

    pub fn into_events(self) -> Vec<DiagnosticEvent> {
        self.events
    }
}
