use eggsize::{DetectionPipeline, DetectorConfig, Grade, DetectionResult};
use image::{DynamicImage, Rgb, RgbImage};
use tempfile::NamedTempFile;

pub const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);
pub const SHELL: Rgb<u8> = Rgb([200, 190, 170]);

/// Filled axis-aligned ellipse to draw on a test canvas
#[derive(Debug, Clone, Copy)]
pub struct Egg {
    pub cx: f64,
    pub cy: f64,
    pub rx: f64,
    pub ry: f64,
}

impl Egg {
    pub fn new(cx: f64, cy: f64, rx: f64, ry: f64) -> Self {
        Self { cx, cy, rx, ry }
    }

    pub fn round(cx: f64, cy: f64, r: f64) -> Self {
        Self::new(cx, cy, r, r)
    }

    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.rx * self.ry
    }

    fn contains(&self, x: u32, y: u32) -> bool {
        let dx = (x as f64 - self.cx) / self.rx;
        let dy = (y as f64 - self.cy) / self.ry;
        dx * dx + dy * dy <= 1.0
    }
}

/// Dark canvas with bright eggs painted on it
pub fn draw_eggs(width: u32, height: u32, eggs: &[Egg]) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if eggs.iter().any(|e| e.contains(x, y)) { SHELL } else { BACKGROUND }
    });
    DynamicImage::ImageRgb8(img)
}

pub fn blank_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
}

/// Image with no pixels at all
pub fn empty_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(0, 0))
}

/// One large egg, about 20000 px², aspect 1.5
pub fn large_egg_image() -> DynamicImage {
    draw_eggs(400, 300, &[Egg::new(200.0, 150.0, 98.0, 65.0)])
}

/// One round egg, about 2000 px²
pub fn small_egg_image() -> DynamicImage {
    draw_eggs(200, 200, &[Egg::round(100.0, 100.0, 25.0)])
}

/// Four separated eggs of about 20000, 8000, 2000 and 600 px²
pub fn tray_image() -> DynamicImage {
    draw_eggs(
        640,
        480,
        &[
            Egg::new(150.0, 120.0, 98.0, 65.0),
            Egg::new(450.0, 120.0, 62.0, 41.0),
            Egg::round(150.0, 360.0, 25.0),
            Egg::round(450.0, 360.0, 14.0),
        ],
    )
}

pub fn default_pipeline() -> DetectionPipeline {
    DetectionPipeline::new(DetectorConfig::default()).expect("default config is valid")
}

pub fn pipeline_with(config: DetectorConfig) -> DetectionPipeline {
    DetectionPipeline::new(config).expect("test config is valid")
}

pub fn grades(result: &DetectionResult) -> Vec<Grade> {
    result.detections.iter().map(|d| d.grade).collect()
}

/// Saves `img` as a PNG temp file, removed when dropped
pub fn save_png(img: &DynamicImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}
