use image::{GrayImage, Luma};
use imageproc::edges::canny;
use imageproc::filter::box_filter;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};
use crate::config::EdgeConfig;
use crate::error::Result;
use crate::pipeline::{PipelineContext, Stage};

/// Fuse Canny, Sobel magnitude and local-mean thresholding into one binary mask.
///
/// The fused mask is closed and dilated with a 2×2 window, then a strip of
/// `config.border` pixels is cleared on every side. An image with no interior
/// inside that strip yields an empty mask.
pub fn detect_edges(
    gray: &GrayImage,
    config: &EdgeConfig,
    context: &mut PipelineContext,
) -> Result<GrayImage> {
    let canny_edges = canny(gray, config.canny_low, config.canny_high);
    let sobel_edges = sobel_mask(gray, config.sobel_threshold);
    let adaptive = adaptive_mask(gray, config.adaptive_window, config.adaptive_offset);

    let mut combined = union(&canny_edges, &sobel_edges);
    combined = union(&combined, &adaptive);

    let closed = close_2x2(&combined);
    let mut mask = dilate_2x2(&closed);
    clear_border(&mut mask, config.border);

    context.record(
        Stage::EdgeDetection,
        format!(
            "edge pixels: canny {}, sobel {}, adaptive {}, fused {}",
            count_set(&canny_edges),
            count_set(&sobel_edges),
            count_set(&adaptive),
            count_set(&mask)
        ),
    );
    Ok(mask)
}

/// Sobel gradient magnitude scaled to 0-255 and binarised at `threshold`
pub fn sobel_mask(gray: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = gray.dimensions();
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    let magnitude: Vec<f32> = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(x, y)| {
            let (x, y) = (x[0] as f32, y[0] as f32);
            (x * x + y * y).sqrt()
        })
        .collect();

    let max = magnitude.iter().copied().fold(0.0f32, f32::max);
    let mut mask = GrayImage::new(width, height);
    if max <= 0.0 {
        return mask;
    }

    let cutoff = threshold.max(1) as f32;
    for (pixel, m) in mask.pixels_mut().zip(magnitude) {
        if m * 255.0 / max >= cutoff {
            *pixel = Luma([255]);
        }
    }
    mask
}

/// Marks pixels darker than the mean of their `window × window` neighbourhood by more than `offset`
pub fn adaptive_mask(gray: &GrayImage, window: u32, offset: f32) -> GrayImage {
    let radius = window / 2;
    let mean = box_filter(gray, radius, radius);

    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let local = mean.get_pixel(x, y)[0] as f32;
        if local - pixel[0] as f32 > offset {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let mut out = a.clone();
    for (pixel, other) in out.pixels_mut().zip(b.pixels()) {
        pixel[0] = pixel[0].max(other[0]);
    }
    out
}

/// 2×2 window covering the anchor pixel and the cells right of and below it
/// when `anchor` is 0, or left of and above it when `anchor` is 1.
fn window_2x2(anchor: u8) -> Mask {
    Mask::from_image(&GrayImage::from_pixel(2, 2, Luma([255])), anchor, anchor)
}

/// Morphological closing: bridges one-pixel gaps without growing shapes.
///
/// Erosion uses the reflected window so the two passes cancel on solid regions.
pub fn close_2x2(img: &GrayImage) -> GrayImage {
    grayscale_erode(&grayscale_dilate(img, &window_2x2(1)), &window_2x2(0))
}

/// Grows shapes one pixel right and down
pub fn dilate_2x2(img: &GrayImage) -> GrayImage {
    grayscale_dilate(img, &window_2x2(1))
}

pub fn clear_border(mask: &mut GrayImage, border: u32) {
    let (width, height) = mask.dimensions();
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        if x < border || y < border || x >= width.saturating_sub(border) || y >= height.saturating_sub(border) {
            *pixel = Luma([0]);
        }
    }
}

fn count_set(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}
