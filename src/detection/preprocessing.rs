use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::bilateral_filter;
use crate::config::PreprocessConfig;
use crate::error::{DetectionError, Result};
use crate::pipeline::{PipelineContext, Stage};

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Grayscale, bilateral smoothing, then CLAHE.
///
/// The input image is left untouched.
pub fn preprocess(
    img: &DynamicImage,
    config: &PreprocessConfig,
    context: &mut PipelineContext,
) -> Result<GrayImage> {
    if img.width() == 0 || img.height() == 0 {
        return Err(DetectionError::Preprocess(format!(
            "image has no pixels ({}x{})",
            img.width(),
            img.height()
        )));
    }

    let gray = to_grayscale(img);
    let smoothed = if config.bilateral_window > 1 && config.sigma_color > 0.0 && config.sigma_space > 0.0 {
        bilateral_filter(&gray, config.bilateral_window, config.sigma_color, config.sigma_space)
    } else {
        gray
    };
    let enhanced = apply_clahe(&smoothed, config.clahe_clip_limit, config.clahe_tiles);

    context.record(
        Stage::Preprocess,
        format!(
            "{}x{} grayscale, bilateral window {}, CLAHE {}x{} tiles clip {:.1}",
            enhanced.width(),
            enhanced.height(),
            config.bilateral_window,
            config.clahe_tiles,
            config.clahe_tiles,
            config.clahe_clip_limit
        ),
    );
    Ok(enhanced)
}

/// Contrast-limited adaptive histogram equalisation over a `tiles × tiles` grid.
///
/// Tile histograms are clipped at `clip_limit × tile_area / 256`, the excess
/// is spread over all bins, and each pixel is mapped by bilinear
/// interpolation between the four nearest tile lookup tables.
pub fn apply_clahe(img: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tiles_x = tiles.clamp(1, width);
    let tiles_y = tiles.clamp(1, height);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);
    // Recount so that no tile is empty
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts[(ty * tiles_x + tx) as usize] = clipped_lut(&mut hist, area, clip_limit);
        }
    }

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let ty0 = fy.floor();
        let ay = fy - ty0;
        let ty1 = (ty0 as i64 + 1).clamp(0, tiles_y as i64 - 1) as u32;
        let ty0 = (ty0 as i64).clamp(0, tiles_y as i64 - 1) as u32;

        for x in 0..width {
            let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let tx0 = fx.floor();
            let ax = fx - tx0;
            let tx1 = (tx0 as i64 + 1).clamp(0, tiles_x as i64 - 1) as u32;
            let tx0 = (tx0 as i64).clamp(0, tiles_x as i64 - 1) as u32;

            let v = img.get_pixel(x, y)[0] as usize;
            let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;

            let top = lut(tx0, ty0) * (1.0 - ax) + lut(tx1, ty0) * ax;
            let bottom = lut(tx0, ty1) * (1.0 - ax) + lut(tx1, ty1) * ax;
            let value = top * (1.0 - ay) + bottom * ay;
            output.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    output
}

fn clipped_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let batch = excess / 256;
        let mut residual = excess % 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1) as usize;
            for bin in hist.iter_mut().step_by(step) {
                if residual == 0 {
                    break;
                }
                *bin += 1;
                residual -= 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut cdf = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cdf += *bin;
        lut[i] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
