//! bubbleset-bench: CLI tool for overlay parameter experimentation and diagnostics.
//!
//! Loads one frame of survey records from a JSON file, projects them onto
//! log-scaled chart axes, builds the bubble set overlay of every group,
//! and prints per-group diagnostics. Useful for:
//!
//! - Comparing contour extractors (open vs closed at the chart boundary)
//! - Tuning point/edge radii, grid resolution and threshold
//! - Measuring per-stage durations (MST, field, contour) per group
//! - Inspecting energy fields as grayscale heatmaps
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin bubbleset-bench -- [OPTIONS] <FRAME_JSON>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use bubbleset_core::diagnostics::{Clock, OverlayDiagnostics, build_with_diagnostics};
use bubbleset_core::{
    ContourExtractorKind, Dimensions, GroupOverlay, LogScale, OverlayConfig, OverlayFrame,
    OverlayManager, Point, Projector, sanitize_key,
};
use bubbleset_export::{SvgMetadata, SvgSurface};
use clap::{ArgAction, Parser, ValueEnum};
use serde::Deserialize;

/// Lower bound of both log axes; also the clamp floor for zero values.
const MIN_VALUE: f64 = 1e-3;
/// Headroom added above the largest value on each axis.
const MAX_D: f64 = 0.1;

/// Chart margins in pixels.
const MARGIN_TOP: f64 = 20.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 30.0;
const MARGIN_LEFT: f64 = 40.0;

/// Marker radius range, scaled by the square root of salary.
const MARKER_RADIUS: (f64, f64) = (5.0, 40.0);
const MARKER_OPACITY: f64 = 0.7;

/// Overlay parameter experimentation and diagnostics for bubble set charts.
///
/// Builds the group-contour overlay for one year of survey records and
/// prints detailed per-group timing and count diagnostics.
#[derive(Parser)]
#[command(name = "bubbleset-bench", version)]
struct Cli {
    /// Path to a JSON array of survey records.
    frame_path: PathBuf,

    /// Year to render. Defaults to the latest year in the file.
    #[arg(long)]
    year: Option<u32>,

    /// Chart width in pixels.
    #[arg(long, default_value_t = 800, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    width: u32,

    /// Chart height in pixels.
    #[arg(long, default_value_t = 600, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    height: u32,

    /// Pixels per energy grid cell.
    #[arg(long, default_value_t = OverlayConfig::DEFAULT_GRID_RESOLUTION)]
    grid_resolution: f64,

    /// Falloff radius around each point, in pixels.
    #[arg(long, default_value_t = OverlayConfig::DEFAULT_POINT_RADIUS)]
    point_radius: f64,

    /// Falloff radius along spanning-tree edges. Defaults to half the
    /// point radius.
    #[arg(long)]
    edge_radius: Option<f64>,

    /// Isoline threshold.
    #[arg(long, default_value_t = OverlayConfig::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Fill opacity of overlay paths (0.0-1.0).
    #[arg(long, default_value_t = OverlayConfig::DEFAULT_FILL_OPACITY)]
    fill_opacity: f64,

    /// Stroke width of overlay paths.
    #[arg(long, default_value_t = OverlayConfig::DEFAULT_STROKE_WIDTH)]
    stroke_width: f64,

    /// Upper bound on energy grid cells per group.
    #[arg(long, default_value_t = OverlayConfig::DEFAULT_MAX_GRID_CELLS)]
    max_grid_cells: usize,

    /// Contour extraction strategy.
    #[arg(long, value_enum, default_value_t = Extractor::Closed)]
    extractor: Extractor,

    /// Full overlay config as a JSON string.
    ///
    /// When provided, all other overlay parameter flags are ignored.
    /// The JSON must be a valid `OverlayConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Write the rendered chart as SVG to this file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write each group's energy field as a grayscale PNG into this
    /// directory.
    #[arg(long)]
    heatmap_dir: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Contour extractor selection.
#[derive(Clone, Copy, ValueEnum)]
enum Extractor {
    /// Isolines stop where a region meets the chart edge.
    Open,
    /// Every ring closes, along the chart edge if needed.
    Closed,
}

/// One survey record.
#[derive(Debug, Clone, Deserialize)]
struct Record {
    language: String,
    year: u32,
    used: f64,
    interested: f64,
    execution_model: String,
    memory_management: String,
    #[serde(default)]
    avg_salary: Option<f64>,
}

impl Record {
    fn values(&self) -> (f64, f64) {
        (self.used, self.interested)
    }

    fn group_key(&self) -> String {
        format!("{}-{}", self.execution_model, self.memory_management)
    }
}

/// Build an [`OverlayConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags. Either way the result is
/// validated.
fn config_from_cli(cli: &Cli) -> Result<OverlayConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        OverlayConfig {
            grid_resolution: cli.grid_resolution,
            point_radius: cli.point_radius,
            edge_radius: cli.edge_radius.unwrap_or(cli.point_radius / 2.0),
            threshold: cli.threshold,
            fill_opacity: cli.fill_opacity,
            stroke_width: cli.stroke_width,
            contour_extractor: match cli.extractor {
                Extractor::Open => ContourExtractorKind::MarchingSquares,
                Extractor::Closed => ContourExtractorKind::ClosedMarchingSquares,
            },
            max_grid_cells: cli.max_grid_cells,
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn load_records(path: &Path) -> Result<Vec<Record>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

/// Log scales spanning every record in the file, so axes stay fixed
/// from year to year.
fn chart_scales(records: &[Record], dimensions: Dimensions) -> (LogScale, LogScale) {
    let max_used = records.iter().map(|r| r.used).fold(MIN_VALUE, f64::max);
    let max_interested = records.iter().map(|r| r.interested).fold(MIN_VALUE, f64::max);
    let x = LogScale {
        domain: (MIN_VALUE, max_used + MAX_D),
        range: (MARGIN_LEFT, f64::from(dimensions.width) - MARGIN_RIGHT),
    };
    let y = LogScale {
        domain: (MIN_VALUE, max_interested + MAX_D),
        range: (f64::from(dimensions.height) - MARGIN_BOTTOM, MARGIN_TOP),
    };
    (x, y)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let records = match load_records(&cli.frame_path) {
        Ok(r) => r,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let Some(year) = cli.year.or_else(|| records.iter().map(|r| r.year).max()) else {
        eprintln!("No records in {}", cli.frame_path.display());
        return ExitCode::FAILURE;
    };
    let frame_records: Vec<Record> = records.iter().filter(|r| r.year == year).cloned().collect();
    if frame_records.is_empty() {
        eprintln!("No records for year {year}");
        return ExitCode::FAILURE;
    }

    let dimensions = Dimensions {
        width: cli.width,
        height: cli.height,
    };
    let (x, y) = chart_scales(&records, dimensions);
    let projector = Projector::new(&x, &y);
    let values = Record::values;
    let group_key = Record::group_key;
    let frame = OverlayFrame::new(&frame_records, &values, projector, dimensions)
        .with_group_key(&group_key);

    let manager = match OverlayManager::new(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Frame: {} (year {year}, {} records)",
        cli.frame_path.display(),
        frame_records.len(),
    );
    eprintln!("Chart: {}x{}", dimensions.width, dimensions.height);
    eprintln!("Config: {:#?}", manager.config());
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match build_with_diagnostics(&manager, &frame, &StdClock) {
            Ok((overlays, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write artifacts on the first run only.
                if run == 0 {
                    if let Some(ref dir) = cli.heatmap_dir {
                        write_heatmaps(dir, &overlays);
                    }
                    if let Some(ref svg_path) = cli.svg
                        && let Err(msg) = write_svg(
                            svg_path,
                            &manager,
                            dimensions,
                            overlays,
                            &frame_records,
                            year,
                        )
                    {
                        eprintln!("{msg}");
                        return ExitCode::FAILURE;
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Overlay error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Draw the year label, one marker per record, then the already built
/// `overlays`, and write the document to `path`.
fn write_svg(
    path: &Path,
    manager: &OverlayManager,
    dimensions: Dimensions,
    overlays: Vec<GroupOverlay>,
    records: &[Record],
    year: u32,
) -> Result<(), String> {
    let mut surface = SvgSurface::new(dimensions);

    surface.add_label(
        &["year-label"],
        Point::new(
            f64::from(dimensions.width) / 2.0,
            f64::from(dimensions.height) / 2.0 + 50.0,
        ),
        &year.to_string(),
        180.0,
        "#f0f0f0",
    );

    let max_salary = records
        .iter()
        .filter_map(|r| r.avg_salary)
        .fold(0.0, f64::max);
    for overlay in &overlays {
        for (record, point) in records
            .iter()
            .filter(|r| r.group_key() == overlay.key)
            .zip(&overlay.points)
        {
            surface.add_marker(
                &["bubble", &sanitize_key(&record.language)],
                *point,
                marker_radius(record.avg_salary.unwrap_or(0.0), max_salary),
                &overlay.color,
                MARKER_OPACITY,
            );
        }
    }

    let disposal = manager.draw(&mut surface, overlays);
    tracing::info!(groups = disposal.tags().len(), "overlay drawn for export");

    let title = format!("bubbleset-{year}");
    let config_json = serde_json::to_string(manager.config())
        .map_err(|e| format!("Error serializing config: {e}"))?;
    let desc = format!("Bubble set overlay of {} records", records.len());
    let metadata = SvgMetadata {
        title: Some(&title),
        description: Some(&desc),
        config_json: Some(&config_json),
    };
    let svg = surface.to_document(&metadata);
    std::fs::write(path, &svg).map_err(|e| format!("Error writing SVG to {}: {e}", path.display()))?;
    eprintln!("SVG written to {} ({} bytes)", path.display(), svg.len());
    Ok(())
}

/// Square-root scale from `[0, max_salary]` onto [`MARKER_RADIUS`].
fn marker_radius(salary: f64, max_salary: f64) -> f64 {
    let (lo, hi) = MARKER_RADIUS;
    if max_salary <= 0.0 {
        return lo;
    }
    (salary / max_salary).clamp(0.0, 1.0).sqrt().mul_add(hi - lo, lo)
}

/// Write one grayscale PNG per group. Failures are reported and skipped.
fn write_heatmaps(dir: &Path, overlays: &[GroupOverlay]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Error creating {}: {e}", dir.display());
        return;
    }
    for overlay in overlays {
        let path = dir.join(format!("{}.png", sanitize_key(&overlay.key)));
        match overlay.contours.grid.to_gray_image().save(&path) {
            Ok(()) => eprintln!("Heatmap written to {}", path.display()),
            Err(e) => eprintln!("Error writing heatmap {}: {e}", path.display()),
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting one stage duration of a group.
type StageExtractor = fn(&bubbleset_core::diagnostics::GroupDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[OverlayDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means, summed over groups.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Spanning Tree", |g| g.mst_duration),
        ("Energy Field", |g| g.field_duration),
        ("Contour", |g| g.contour_duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| {
                d.groups
                    .iter()
                    .map(|g| extractor(g).as_secs_f64() * 1000.0)
                    .sum::<f64>()
            })
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
