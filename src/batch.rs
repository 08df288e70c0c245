use anyhow::{Context, Result};
use image::DynamicImage;
use std::sync::Arc;
use tokio::task;
use crate::detection::DetectionPipeline;
use crate::models::DetectionResult;

/// Run `job` once per item on the blocking pool, preserving input order
pub async fn map_blocking<T, R, F>(items: Vec<T>, job: F) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    let job = Arc::new(job);
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let job = Arc::clone(&job);
            task::spawn_blocking(move || job(item))
        })
        .collect();

    let mut outputs = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        outputs.push(handle.await.with_context(|| format!("detection task {} panicked", index))?);
    }
    Ok(outputs)
}

/// Detect eggs in every image concurrently with one shared pipeline
pub async fn detect_all(pipeline: Arc<DetectionPipeline>, images: Vec<DynamicImage>) -> Result<Vec<DetectionResult>> {
    tracing::debug!(images = images.len(), "starting batch detection");
    map_blocking(images, move |img| pipeline.detect(&img)).await
}
