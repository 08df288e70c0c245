use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;
use std::fmt;
use crate::config::DetectorConfig;
use crate::models::{circularity, BoundingBox, Contour};
use crate::pipeline::{PipelineContext, Stage};

/// Why a contour was dropped. Rejections are expected and never errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    AreaOutOfRange { area: f64 },
    AspectOutOfRange { aspect: f64 },
    DegeneratePerimeter,
    LowCircularity { circularity: f64 },
    VertexCount { vertices: usize },
    LowConfidence { confidence: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::AreaOutOfRange { area } => write!(f, "area {:.0} out of range", area),
            Rejection::AspectOutOfRange { aspect } => write!(f, "aspect ratio {:.2} out of range", aspect),
            Rejection::DegeneratePerimeter => write!(f, "zero perimeter"),
            Rejection::LowCircularity { circularity } => write!(f, "circularity {:.3} too low", circularity),
            Rejection::VertexCount { vertices } => write!(f, "{} polygon vertices", vertices),
            Rejection::LowConfidence { confidence } => write!(f, "confidence {:.2} too low", confidence),
        }
    }
}

/// Geometry of a contour that passed the shape filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeMetrics {
    pub area: f64,
    pub perimeter: f64,
    pub circularity: f64,
    pub aspect_ratio: f64,
    pub vertices: usize,
    pub bbox: BoundingBox,
}

/// An egg-like contour and its measurements
#[derive(Debug, Clone)]
pub struct Candidate {
    pub contour: Contour,
    pub metrics: ShapeMetrics,
}

/// Area / aspect / circularity / polygon-complexity gate
#[derive(Debug, Clone, Copy)]
pub struct ShapeFilter {
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_circularity: f64,
    pub min_vertices: usize,
    pub max_vertices: usize,
    pub poly_epsilon_ratio: f64,
}

impl ShapeFilter {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            min_area: config.min_area,
            max_area: config.max_area,
            min_aspect: config.min_aspect,
            max_aspect: config.max_aspect,
            min_circularity: config.min_circularity,
            min_vertices: config.min_vertices,
            max_vertices: config.max_vertices,
            poly_epsilon_ratio: config.poly_epsilon_ratio,
        }
    }

    /// Check one contour, cheapest tests first
    pub fn evaluate(&self, contour: &Contour) -> Result<ShapeMetrics, Rejection> {
        let area = contour.area();
        if area < self.min_area || area > self.max_area {
            return Err(Rejection::AreaOutOfRange { area });
        }

        let bbox = contour.bounding_box();
        let aspect_ratio = bbox.aspect_ratio();
        if aspect_ratio < self.min_aspect || aspect_ratio > self.max_aspect {
            return Err(Rejection::AspectOutOfRange { aspect: aspect_ratio });
        }

        let perimeter = contour.perimeter();
        if perimeter <= 0.0 {
            return Err(Rejection::DegeneratePerimeter);
        }
        let circularity = circularity(area, perimeter);
        if circularity < self.min_circularity {
            return Err(Rejection::LowCircularity { circularity });
        }

        let vertices = polygon_vertices(&contour.points, self.poly_epsilon_ratio * perimeter);
        if vertices < self.min_vertices || vertices > self.max_vertices {
            return Err(Rejection::VertexCount { vertices });
        }

        Ok(ShapeMetrics {
            area,
            perimeter,
            circularity,
            aspect_ratio,
            vertices,
            bbox,
        })
    }

    /// Keep the egg-like contours, in input order
    pub fn filter(&self, contours: Vec<Contour>, context: &mut PipelineContext) -> Vec<Candidate> {
        let total = contours.len();
        let mut candidates = Vec::new();

        for (i, contour) in contours.into_iter().enumerate() {
            match self.evaluate(&contour) {
                Ok(metrics) => {
                    context.record(
                        Stage::ShapeFilter,
                        format!(
                            "contour {} accepted: area={:.0}, aspect={:.2}, circ={:.3}, vertices={}",
                            i + 1,
                            metrics.area,
                            metrics.aspect_ratio,
                            metrics.circularity,
                            metrics.vertices
                        ),
                    );
                    candidates.push(Candidate { contour, metrics });
                }
                Err(reason) => {
                    context.record(Stage::ShapeFilter, format!("contour {} rejected: {}", i + 1, reason));
                }
            }
        }

        tracing::debug!(total, accepted = candidates.len(), "shape filter done");
        candidates
    }
}

/// Douglas-Peucker vertex count of a closed pixel outline.
///
/// The outline does not repeat its first point. Outlines too short to
/// simplify, or a non-positive tolerance, count every point.
pub fn polygon_vertices(points: &[Point<i32>], epsilon: f64) -> usize {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.len();
    }
    approximate_polygon_dp(points, epsilon, true).len()
}
