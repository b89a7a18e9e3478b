//! plumbline: batch wall misalignment detection.
//!
//! Reads every `.jpg`, `.jpeg` and `.png` file in an input directory,
//! runs the detection pipeline on each, logs the per-image verdict, and
//! writes an annotated `<stem>.jpg` overlay to the output directory.
//! Images that cannot be read or analyzed are reported and skipped.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin plumbline -- [OPTIONS] [INPUT_DIR]
//! ```

#![allow(clippy::print_stdout)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use plumbline_pipeline::{
    BatchInput, Foreground, ImageAnalysis, ImageReport, ItemOutcome, LumaThresholdSegmenter,
    PipelineConfig, process_batch,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// File extensions picked up from the input directory (case-insensitive).
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Detect horizontally offset wall sections in a directory of photos.
///
/// Each image is cut into tiles, segmented, stitched back into a wall
/// mask, split into one mask per wall, and checked strip by strip for
/// jumps in horizontal position.
#[derive(Parser)]
#[command(name = "plumbline", version)]
struct Cli {
    /// Directory holding the input photos.
    #[arg(default_value = "input")]
    input_dir: PathBuf,

    /// Directory the annotated overlays are written to.
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_TILE_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    tile_size: u32,

    /// Number of walls expected in each photo.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WALL_COUNT, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    wall_count: usize,

    /// Largest allowed change in mean x between consecutive strips, in
    /// pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_JUMP_THRESHOLD)]
    jump_threshold: f64,

    /// Strip height in rows.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STRIP_HEIGHT, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    strip_height: u32,

    /// Minimum foreground pixels for a strip to be sampled.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_STRIP_POINTS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    min_strip_points: usize,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Luma threshold separating wall pixels from background.
    #[arg(long, default_value_t = LumaThresholdSegmenter::DEFAULT_THRESHOLD)]
    luma_threshold: u8,

    /// Treat pixels darker than the threshold as wall.
    #[arg(long)]
    dark_foreground: bool,

    /// Print a JSON report per image to stdout.
    #[arg(long)]
    json: bool,

    /// Skip writing overlay images.
    #[arg(long)]
    no_overlay: bool,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Either way the result is
/// validated.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = match cli.config_json {
        Some(ref json) => serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?,
        None => PipelineConfig {
            tile_size: cli.tile_size,
            wall_count: cli.wall_count,
            jump_threshold: cli.jump_threshold,
            strip_height: cli.strip_height,
            min_strip_points: cli.min_strip_points,
        },
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn segmenter_from_cli(cli: &Cli) -> LumaThresholdSegmenter {
    let foreground = if cli.dark_foreground {
        Foreground::Dark
    } else {
        Foreground::Bright
    };
    LumaThresholdSegmenter::new(cli.luma_threshold, foreground)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Image files directly inside `dir`, sorted by name.
fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path()));
    Ok(select_images(dir, entries)
        .into_iter()
        .filter(|path| path.is_file())
        .collect())
}

/// Keep paths with an image extension, sorted. Entries that could not be
/// read are reported and dropped.
fn select_images(
    dir: &Path,
    entries: impl IntoIterator<Item = std::io::Result<PathBuf>>,
) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = entries
        .into_iter()
        .filter_map(|entry| {
            entry
                .inspect_err(|e| warn!("Skipped unreadable entry in {}: {e}", dir.display()))
                .ok()
        })
        .filter(|path| has_image_extension(path))
        .collect();
    paths.sort();
    paths
}

fn read_input(path: &Path) -> BatchInput {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    match std::fs::read(path) {
        Ok(bytes) => BatchInput::bytes(name, bytes),
        Err(e) => BatchInput::unreadable(name, e.to_string()),
    }
}

/// Output path for an input file name: `<stem>.jpg` in `output_dir`.
fn overlay_path(output_dir: &Path, name: &str) -> PathBuf {
    let stem = Path::new(name)
        .file_stem()
        .map_or_else(|| name.to_owned(), |s| s.to_string_lossy().into_owned());
    output_dir.join(format!("{stem}.jpg"))
}

fn write_overlay(path: &Path, analysis: &ImageAnalysis) -> Result<(), String> {
    let overlay = plumbline_overlay::render_overlay(analysis);
    let bytes = plumbline_overlay::encode_jpeg(&overlay).map_err(|e| e.to_string())?;
    std::fs::write(path, bytes).map_err(|e| format!("Error writing {}: {e}", path.display()))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let paths = match list_images(&cli.input_dir) {
        Ok(paths) => paths,
        Err(e) => {
            error!("Error reading {}: {e}", cli.input_dir.display());
            return ExitCode::FAILURE;
        }
    };

    if !cli.no_overlay
        && let Err(e) = std::fs::create_dir_all(&cli.output_dir)
    {
        error!("Error creating {}: {e}", cli.output_dir.display());
        return ExitCode::FAILURE;
    }

    info!(
        input = %cli.input_dir.display(),
        images = paths.len(),
        ?config,
        "starting batch",
    );

    let mut segmenter = segmenter_from_cli(&cli);
    let inputs = paths.iter().map(|path| read_input(path));
    let (mut analyzed, mut skipped) = (0_usize, 0_usize);

    for item in process_batch(inputs, &mut segmenter, &config) {
        let analysis = match item.outcome {
            ItemOutcome::Analyzed(analysis) => analysis,
            ItemOutcome::Skipped(reason) => {
                warn!("Skipped: {} ({reason})", item.name);
                skipped += 1;
                continue;
            }
        };
        analyzed += 1;
        info!("{}: {}", item.name, analysis.summary);

        if cli.json {
            match serde_json::to_string(&ImageReport::new(&item.name, &analysis)) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!("Error serializing report for {}: {e}", item.name),
            }
        }

        if !cli.no_overlay {
            let path = overlay_path(&cli.output_dir, &item.name);
            match write_overlay(&path, &analysis) {
                Ok(()) => info!("Saved: {}", path.display()),
                Err(e) => warn!("Overlay for {} not written: {e}", item.name),
            }
        }
    }

    info!(analyzed, skipped, "batch finished");
    ExitCode::SUCCESS
}
