use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use crate::models::Contour;
use crate::pipeline::{PipelineContext, Stage};

/// Find outermost boundaries in a binary edge mask.
///
/// Hole borders and everything nested inside them are skipped, so markings
/// inside a closed outline never become separate contours. Order follows the
/// raster scan that discovers each border, which keeps ids stable.
pub fn find_external_contours(edges: &GrayImage, context: &mut PipelineContext) -> Vec<Contour> {
    let all = find_contours::<i32>(edges);
    let total = all.len();

    let external: Vec<Contour> = all
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| Contour::new(c.points))
        .collect();

    context.record(
        Stage::ContourExtraction,
        format!("{} borders traced, {} external", total, external.len()),
    );
    external
}
