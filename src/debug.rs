use anyhow::Result;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use crate::detection::StageImages;
use crate::models::{DetectionResult, Grade};

/// Box colour per grade, largest first
const GRADE_COLORS: [Rgb<u8>; 6] = [
    Rgb([230, 25, 75]),
    Rgb([245, 130, 48]),
    Rgb([255, 225, 25]),
    Rgb([60, 180, 75]),
    Rgb([0, 130, 200]),
    Rgb([145, 30, 180]),
];

/// Writes per-stage images for each processed input
#[derive(Debug, Clone)]
pub struct DebugDump {
    output_dir: PathBuf,
}

impl DebugDump {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save `00_input`, `01_grayscale`, `02_edges` and `03_overlay` under a
    /// sub-directory named after `stem`
    pub fn save(
        &self,
        stem: &str,
        input: &DynamicImage,
        stages: &StageImages,
        result: &DetectionResult,
    ) -> Result<PathBuf> {
        let dir = self.output_dir.join(stem);
        std::fs::create_dir_all(&dir)?;

        let overlay = draw_overlay(input, result);
        let outputs = [
            ("00_input.png", input.clone()),
            ("01_grayscale.png", DynamicImage::ImageLuma8(stages.grayscale.clone())),
            ("02_edges.png", DynamicImage::ImageLuma8(stages.edges.clone())),
            ("03_overlay.png", DynamicImage::ImageRgb8(overlay)),
        ];
        for (name, img) in outputs {
            let path = dir.join(name);
            img.save(&path)
                .map_err(|e| anyhow::anyhow!("Failed to save debug image {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "saved debug image");
        }
        Ok(dir)
    }
}

/// Input image with one box per detection, coloured by grade
pub fn draw_overlay(input: &DynamicImage, result: &DetectionResult) -> RgbImage {
    let mut canvas = input.to_rgb8();
    for detection in &result.detections {
        let bbox = detection.bbox;
        if bbox.width == 0 || bbox.height == 0 {
            continue;
        }
        let color = grade_color(detection.grade);
        // Two pixels thick so boxes stay visible on large images
        for inset in 0..2u32 {
            if bbox.width <= 2 * inset || bbox.height <= 2 * inset {
                break;
            }
            let rect = Rect::at((bbox.x + inset) as i32, (bbox.y + inset) as i32)
                .of_size(bbox.width - 2 * inset, bbox.height - 2 * inset);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }
    canvas
}

fn grade_color(grade: Grade) -> Rgb<u8> {
    GRADE_COLORS[grade.index()]
}
