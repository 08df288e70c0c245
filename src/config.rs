use crate::error::{DetectionError, Result};
use crate::models::Grade;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Minimum contour area (px²) for grade0..grade4. Grade5 has no floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeThresholds(pub [f64; 5]);

impl GradeThresholds {
    pub const STANDARD: GradeThresholds =
        GradeThresholds([18000.0, 12000.0, 7000.0, 3500.0, 1800.0]);

    pub const BOX_AREA: GradeThresholds =
        GradeThresholds([15000.0, 10000.0, 6000.0, 3000.0, 1500.0]);

    /// Floor of the band for `grade` (0 for grade5)
    pub fn threshold(&self, grade: Grade) -> f64 {
        self.0.get(grade.index()).copied().unwrap_or(0.0)
    }

    /// Largest grade whose threshold `area` meets, grade5 otherwise
    pub fn grade_for(&self, area: f64) -> Grade {
        self.0
            .iter()
            .position(|t| area >= *t)
            .and_then(Grade::from_index)
            .unwrap_or(Grade::Grade5)
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(DetectionError::Config(format!(
                "grade thresholds must be positive: {:?}",
                self.0
            )));
        }
        if self.0.windows(2).any(|w| w[0] <= w[1]) {
            return Err(DetectionError::Config(format!(
                "grade thresholds must strictly decrease from grade0 to grade4: {:?}",
                self.0
            )));
        }
        Ok(())
    }
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Bilateral filter window (pixels, odd)
    pub bilateral_window: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub clahe_clip_limit: f32,
    /// CLAHE grid is `clahe_tiles × clahe_tiles`
    pub clahe_tiles: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            bilateral_window: 9,
            sigma_color: 75.0,
            sigma_space: 75.0,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Cut-off applied to the gradient magnitude after scaling it to 0-255
    pub sobel_threshold: u8,
    pub adaptive_window: u32,
    /// A pixel is marked when it is darker than its local mean by more than this
    pub adaptive_offset: f32,
    /// Width of the strip cleared along every image edge
    pub border: u32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            canny_low: 20.0,
            canny_high: 80.0,
            sobel_threshold: 64,
            adaptive_window: 9,
            adaptive_offset: 3.0,
            border: 10,
        }
    }
}

/// Named threshold sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    #[default]
    Standard,
    Strict,
    BoxArea,
}

impl FromStr for Profile {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Profile::Standard),
            "strict" => Ok(Profile::Strict),
            "box-area" | "box_area" => Ok(Profile::BoxArea),
            other => Err(DetectionError::Config(format!("unknown profile '{}'", other))),
        }
    }
}

/// Every tunable of the detection pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_circularity: f64,
    pub min_vertices: usize,
    pub max_vertices: usize,
    /// Douglas-Peucker epsilon as a fraction of the contour perimeter
    pub poly_epsilon_ratio: f64,
    pub min_confidence: f64,
    pub grade_thresholds: GradeThresholds,
    pub preprocess: PreprocessConfig,
    pub edges: EdgeConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_area: 500.0,
            max_area: 500_000.0,
            min_aspect: 0.3,
            max_aspect: 3.0,
            min_circularity: 0.1,
            min_vertices: 6,
            max_vertices: 30,
            poly_epsilon_ratio: 0.02,
            min_confidence: 0.1,
            grade_thresholds: GradeThresholds::STANDARD,
            preprocess: PreprocessConfig::default(),
            edges: EdgeConfig::default(),
        }
    }
}

impl DetectorConfig {
    pub fn from_profile(profile: Profile) -> Self {
        match profile {
            Profile::Standard => Self::default(),
            Profile::Strict => Self {
                min_area: 800.0,
                max_area: 300_000.0,
                min_aspect: 0.4,
                max_aspect: 2.5,
                min_circularity: 0.15,
                min_confidence: 0.15,
                ..Self::default()
            },
            Profile::BoxArea => Self {
                grade_thresholds: GradeThresholds::BOX_AREA,
                ..Self::default()
            },
        }
    }

    /// Load from a JSON file; absent fields keep the standard defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: DetectorConfig = serde_json::from_str(data)
            .map_err(|e| DetectionError::Config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.grade_thresholds.validate()?;

        let finite_non_negative = [
            ("min_area", self.min_area),
            ("max_area", self.max_area),
            ("min_aspect", self.min_aspect),
            ("max_aspect", self.max_aspect),
            ("min_circularity", self.min_circularity),
            ("poly_epsilon_ratio", self.poly_epsilon_ratio),
        ];
        for (name, value) in finite_non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(DetectionError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.min_area > self.max_area {
            return Err(DetectionError::Config(format!(
                "min_area ({}) exceeds max_area ({})",
                self.min_area, self.max_area
            )));
        }
        if self.min_aspect > self.max_aspect {
            return Err(DetectionError::Config(format!(
                "min_aspect ({}) exceeds max_aspect ({})",
                self.min_aspect, self.max_aspect
            )));
        }
        if self.min_vertices > self.max_vertices {
            return Err(DetectionError::Config(format!(
                "min_vertices ({}) exceeds max_vertices ({})",
                self.min_vertices, self.max_vertices
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(DetectionError::Config(format!(
                "min_confidence must lie in [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.edges.canny_low > self.edges.canny_high {
            return Err(DetectionError::Config(format!(
                "canny_low ({}) exceeds canny_high ({})",
                self.edges.canny_low, self.edges.canny_high
            )));
        }
        if self.preprocess.clahe_tiles == 0 {
            return Err(DetectionError::Config("clahe_tiles must be at least 1".to_string()));
        }
        Ok(())
    }
}
