mod common;

use common::*;
use std::sync::Arc;
use std::thread;

#[test]
fn test_threads_share_one_pipeline() {
    let pipeline = default_pipeline();
    let images = vec![large_egg_image(), small_egg_image(), tray_image(), blank_image(200, 150)];
    let sequential: Vec<DetectionResult> = images.iter().map(|img| pipeline.detect(img)).collect();

    let shared = &pipeline;
    let parallel: Vec<DetectionResult> = thread::scope(|scope| {
        let handles: Vec<_> = images
            .iter()
            .map(|img| scope.spawn(move || shared.detect(img)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(parallel, sequential);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_detection_keeps_order() -> anyhow::Result<()> {
    let pipeline = Arc::new(default_pipeline());
    let images = vec![small_egg_image(), blank_image(200, 150), large_egg_image(), small_egg_image()];

    let results = eggsize::batch::detect_all(Arc::clone(&pipeline), images).await?;

    assert_eq!(results.len(), 4);
    assert_eq!(grades(&results[0]), vec![Grade::Grade4]);
    assert_eq!(results[1].total_eggs, 0);
    assert_eq!(grades(&results[2]), vec![Grade::Grade0]);
    assert_eq!(results[3], results[0]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_with_degraded_input() -> anyhow::Result<()> {
    let pipeline = Arc::new(default_pipeline());
    let results = eggsize::batch::detect_all(pipeline, vec![empty_image(), blank_image(12, 12), small_egg_image()]).await?;

    assert!(results[0].is_degraded());
    assert!(!results[1].is_degraded());
    assert_eq!(results[1].total_eggs, 0);
    assert!(!results[2].is_degraded());
    Ok(())
}
