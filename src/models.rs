use imageproc::geometry::{arc_length, contour_area};
use imageproc::point::Point;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Ordinal size grade. `Grade0` is the largest band, `Grade5` the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "grade0")]
    Grade0,
    #[serde(rename = "grade1")]
    Grade1,
    #[serde(rename = "grade2")]
    Grade2,
    #[serde(rename = "grade3")]
    Grade3,
    #[serde(rename = "grade4")]
    Grade4,
    #[serde(rename = "grade5")]
    Grade5,
}

impl Grade {
    pub const ALL: [Grade; 6] = [
        Grade::Grade0,
        Grade::Grade1,
        Grade::Grade2,
        Grade::Grade3,
        Grade::Grade4,
        Grade::Grade5,
    ];

    pub fn index(self) -> usize {
        match self {
            Grade::Grade0 => 0,
            Grade::Grade1 => 1,
            Grade::Grade2 => 2,
            Grade::Grade3 => 3,
            Grade::Grade4 => 4,
            Grade::Grade5 => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Grade> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Grade0 => "grade0",
            Grade::Grade1 => "grade1",
            Grade::Grade2 => "grade2",
            Grade::Grade3 => "grade3",
            Grade::Grade4 => "grade4",
            Grade::Grade5 => "grade5",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned box in image coordinates, serialized as `[x, y, w, h]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq([self.x, self.y, self.width, self.height])
    }
}

/// Closed outer boundary of one connected region in an edge mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    /// Enclosed polygon area (shoelace formula)
    pub fn area(&self) -> f64 {
        contour_area(&self.points)
    }

    /// Length of the closed polyline
    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points, true)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let Some(first) = self.points.first() else {
            return BoundingBox { x: 0, y: 0, width: 0, height: 0 };
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        BoundingBox {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.bounding_box().aspect_ratio()
    }

    /// Circularity = 4π × area / perimeter² (1.0 for a perfect circle)
    pub fn circularity(&self) -> f64 {
        circularity(self.area(), self.perimeter())
    }
}

pub fn circularity(area: f64, perimeter: f64) -> f64 {
    if perimeter <= 0.0 {
        return 0.0;
    }
    4.0 * std::f64::consts::PI * area / (perimeter * perimeter)
}

/// One graded object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub id: usize,
    pub grade: Grade,
    pub confidence: f64,
    pub area: u64,
    pub bbox: BoundingBox,
}

/// Per-grade histogram; every grade is always present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeCounts {
    pub grade0_count: u32,
    pub grade1_count: u32,
    pub grade2_count: u32,
    pub grade3_count: u32,
    pub grade4_count: u32,
    pub grade5_count: u32,
}

impl GradeCounts {
    fn slot(&mut self, grade: Grade) -> &mut u32 {
        match grade {
            Grade::Grade0 => &mut self.grade0_count,
            Grade::Grade1 => &mut self.grade1_count,
            Grade::Grade2 => &mut self.grade2_count,
            Grade::Grade3 => &mut self.grade3_count,
            Grade::Grade4 => &mut self.grade4_count,
            Grade::Grade5 => &mut self.grade5_count,
        }
    }

    pub fn increment(&mut self, grade: Grade) {
        *self.slot(grade) += 1;
    }

    pub fn get(&self, grade: Grade) -> u32 {
        match grade {
            Grade::Grade0 => self.grade0_count,
            Grade::Grade1 => self.grade1_count,
            Grade::Grade2 => self.grade2_count,
            Grade::Grade3 => self.grade3_count,
            Grade::Grade4 => self.grade4_count,
            Grade::Grade5 => self.grade5_count,
        }
    }

    pub fn total(&self) -> u32 {
        Grade::ALL.iter().map(|g| self.get(*g)).sum()
    }
}

/// Outcome of one detection run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub grade_counts: GradeCounts,
    pub total_eggs: usize,
    pub success_percent: f64,
    pub processed_contours: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    /// Result returned when a stage fails: nothing detected, error populated
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            detections: Vec::new(),
            grade_counts: GradeCounts::default(),
            total_eggs: 0,
            success_percent: 0.0,
            processed_contours: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle(w: i32, h: i32) -> Contour {
        Contour::new(vec![Point::new(0, 0), Point::new(w, 0), Point::new(w, h), Point::new(0, h)])
    }

    #[test]
    fn rectangle_geometry() {
        let contour = rectangle(40, 10);
        assert_eq!(contour.area(), 400.0);
        assert_eq!(contour.perimeter(), 100.0);
        assert_eq!(contour.bounding_box(), BoundingBox { x: 0, y: 0, width: 41, height: 11 });
        assert!((contour.circularity() - 4.0 * std::f64::consts::PI * 400.0 / 10_000.0).abs() < 1e-12);
    }

    #[test]
    fn diamond_geometry() {
        let contour = Contour::new(vec![Point::new(0, 1), Point::new(1, 0), Point::new(2, 1), Point::new(1, 2)]);
        assert_eq!(contour.area(), 2.0);
        assert!((contour.perimeter() - 4.0 * std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn degenerate_contours_measure_zero() {
        let contour = Contour::new(vec![Point::new(3, 3), Point::new(9, 3)]);
        assert_eq!(contour.area(), 0.0);
        assert_eq!(Contour::new(Vec::new()).bounding_box().area(), 0);
        assert_eq!(circularity(10.0, 0.0), 0.0);
    }

    #[test]
    fn grade_counts_cover_every_grade() {
        let mut counts = GradeCounts::default();
        counts.increment(Grade::Grade5);
        counts.increment(Grade::Grade5);
        counts.increment(Grade::Grade0);
        assert_eq!(counts.get(Grade::Grade5), 2);
        assert_eq!(counts.total(), 3);

        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 6);
        assert_eq!(json["grade5_count"], 2);
    }

    #[test]
    fn detection_serializes_in_record_form() {
        let detection = Detection {
            id: 1,
            grade: Grade::Grade3,
            confidence: 0.57,
            area: 4100,
            bbox: BoundingBox { x: 5, y: 6, width: 70, height: 50 },
        };
        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["grade"], "grade3");
        assert_eq!(json["bbox"], serde_json::json!([5, 6, 70, 50]));
    }

    #[test]
    fn degraded_result_is_empty() {
        let result = DetectionResult::degraded("boom");
        assert!(result.is_degraded());
        assert_eq!(result.grade_counts.total(), 0);
        assert_eq!(serde_json::to_value(&result).unwrap()["error"], "boom");
    }
}
