use anyhow::{Context, Result};
use clap::Parser;
use image::ImageReader;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use eggsize::batch::map_blocking;
use eggsize::debug::DebugDump;
use eggsize::{decode_image, logger, BoxGrader, DetectionPipeline, DetectionResult, DetectorConfig, ExternalBox, Profile};

#[derive(Parser)]
#[command(name = "eggsize")]
#[command(about = "Detect eggs in images and grade them by size")]
struct Cli {
    /// Input image files
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Threshold preset: standard, strict or box-area
    #[arg(long, default_value = "standard", conflicts_with = "config")]
    profile: Profile,

    /// JSON detector configuration, used instead of a preset
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    min_area: Option<f64>,

    #[arg(long)]
    max_area: Option<f64>,

    #[arg(long)]
    min_aspect: Option<f64>,

    #[arg(long)]
    max_aspect: Option<f64>,

    #[arg(long)]
    min_circularity: Option<f64>,

    #[arg(long)]
    min_confidence: Option<f64>,

    /// Grade boxes from an external detector (JSON array) instead of
    /// running contour detection. Needs exactly one image.
    #[arg(long, value_name = "FILE")]
    boxes: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output record for one image
#[derive(Serialize)]
struct SessionRecord {
    session_id: Uuid,
    image_path: String,
    day: String,
    created_at: String,
    result: DetectionResult,
}

impl SessionRecord {
    fn new(image_path: &Path, result: DetectionResult) -> Result<Self> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Ok(Self {
            session_id: Uuid::new_v4(),
            image_path: image_path.display().to_string(),
            day: now.date().to_string(),
            created_at: now.format(&Rfc3339)?,
            result,
        })
    }
}

fn build_config(args: &Cli) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DetectorConfig::from_profile(args.profile),
    };

    let overrides = [
        (args.min_area, &mut config.min_area),
        (args.max_area, &mut config.max_area),
        (args.min_aspect, &mut config.min_aspect),
        (args.max_aspect, &mut config.max_aspect),
        (args.min_circularity, &mut config.min_circularity),
        (args.min_confidence, &mut config.min_confidence),
    ];
    for (value, field) in overrides {
        if let Some(value) = value {
            *field = value;
        }
    }

    config.validate()?;
    Ok(config)
}

fn print_record(record: &SessionRecord, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(record)?
    } else {
        serde_json::to_string(record)?
    };
    println!("{}", json);
    Ok(())
}

fn grade_boxes(args: &Cli, config: &DetectorConfig, boxes_path: &Path) -> Result<()> {
    let [image_path] = args.images.as_slice() else {
        anyhow::bail!("--boxes needs exactly one image, got {}", args.images.len());
    };

    let data = std::fs::read_to_string(boxes_path)
        .with_context(|| format!("Failed to read boxes {}", boxes_path.display()))?;
    let boxes: Vec<ExternalBox> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse boxes {}", boxes_path.display()))?;

    let (width, height) = ImageReader::open(image_path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| anyhow::anyhow!("Failed to read image dimensions: {}", e))?;
    tracing::info!(boxes = boxes.len(), width, height, "grading external boxes");

    let result = BoxGrader::new(config.min_confidence).grade_boxes(&boxes, width, height);
    print_record(&SessionRecord::new(image_path, result)?, args.pretty)
}

fn process_image(
    pipeline: &DetectionPipeline,
    debug: Option<&DebugDump>,
    index: usize,
    path: &Path,
) -> Result<SessionRecord> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let img = decode_image(&bytes).with_context(|| format!("Failed to decode {}", path.display()))?;
    tracing::debug!(path = %path.display(), width = img.width(), height = img.height(), "image loaded");

    let result = pipeline.detect(&img);

    if let Some(dump) = debug {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        match pipeline.stage_images(&img) {
            Ok(stages) => {
                let dir = dump.save(&format!("{:02}_{}", index + 1, stem), &img, &stages, &result)?;
                tracing::debug!(dir = %dir.display(), "debug images written");
            }
            Err(e) => tracing::warn!(error = %e, "no stage images to save"),
        }
    }

    SessionRecord::new(path, result)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    logger::init(args.verbose);

    let config = build_config(&args)?;

    if let Some(boxes_path) = &args.boxes {
        return grade_boxes(&args, &config, boxes_path);
    }

    let debug = args.debug_out.clone().map(DebugDump::new).transpose()?;
    let pipeline = Arc::new(DetectionPipeline::new(config)?);
    tracing::info!(images = args.images.len(), "running detection");

    let jobs: Vec<(usize, PathBuf)> = args.images.iter().cloned().enumerate().collect();
    let outcomes = map_blocking(jobs, move |(index, path)| {
        let outcome = process_image(&pipeline, debug.as_ref(), index, &path);
        (path, outcome)
    })
    .await?;

    let mut failures = 0;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(record) => print_record(&record, args.pretty)?,
            Err(e) => {
                failures += 1;
                tracing::error!(path = %path.display(), "{:#}", e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images failed", failures, args.images.len());
    }
    Ok(())
}
