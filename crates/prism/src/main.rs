//! prism: apply the filter pipeline to an image file from the command line.
//!
//! Each filter flag enables that stage at the given strength; stages run
//! in the fixed pipeline order regardless of flag order.
//!
//! # Usage
//!
//! ```text
//! prism photo.jpg --hue-rotation 90 --blur 20 -o out.png
//! prism photo.jpg --stages-json '[{"id":"sepiaTone","enabled":true,"strength":80}]'
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default: warnings only).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use prism_pipeline::{FilterKind, PipelineError, RawStageConfig, Scheduler, Stages};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Apply emboss, hue, saturation, posterize, blur, and sepia filters to
/// an image.
#[derive(Parser)]
#[command(name = "prism", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, WebP, GIF).
    input: PathBuf,

    /// Output PNG path. Defaults to `<stem>-edited.png` next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emboss strength (0-100).
    #[arg(long, value_name = "S")]
    emboss: Option<f64>,

    /// Hue rotation in degrees (0-360).
    #[arg(long, value_name = "DEG")]
    hue_rotation: Option<f64>,

    /// Saturation (0-100, 50 leaves colors unchanged).
    #[arg(long, value_name = "S")]
    saturation: Option<f64>,

    /// Posterize strength (0-100).
    #[arg(long, value_name = "S")]
    posterize: Option<f64>,

    /// Gaussian blur strength (0-100).
    #[arg(long, value_name = "S")]
    blur: Option<f64>,

    /// Sepia tone strength (0-100).
    #[arg(long, value_name = "S")]
    sepia_tone: Option<f64>,

    /// Full stage list as JSON: `[{"id": ..., "enabled": ..., "strength": ...}]`.
    ///
    /// When provided, the individual filter flags are ignored. Unknown
    /// ids are skipped with a warning.
    #[arg(long)]
    stages_json: Option<String>,

    /// Print run diagnostics as JSON.
    #[arg(long)]
    json: bool,

    /// Print a human-readable run report.
    #[arg(long)]
    report: bool,
}

impl Cli {
    /// Flag value for each filter, in pipeline order.
    const fn filter_flags(&self) -> [(FilterKind, Option<f64>); 6] {
        [
            (FilterKind::Emboss, self.emboss),
            (FilterKind::HueRotation, self.hue_rotation),
            (FilterKind::Saturation, self.saturation),
            (FilterKind::Posterize, self.posterize),
            (FilterKind::Blur, self.blur),
            (FilterKind::SepiaTone, self.sepia_tone),
        ]
    }
}

/// Build the stage list from `--stages-json` or the individual flags.
fn stages_from_cli(cli: &Cli) -> Result<Stages, String> {
    if let Some(ref json) = cli.stages_json {
        let raw: Vec<RawStageConfig> = serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --stages-json: {e}"))?;
        let (stages, skipped) =
            Stages::from_raw(&raw).map_err(|e| format!("Invalid --stages-json: {e}"))?;
        for warning in &skipped {
            eprintln!("Warning: {warning}");
        }
        return Ok(stages);
    }

    cli.filter_flags()
        .into_iter()
        .filter_map(|(kind, strength)| strength.map(|s| (kind, s)))
        .try_fold(Stages::default(), |stages, (kind, strength)| {
            stages.with(kind, strength)
        })
        .map_err(|e: PipelineError| format!("Invalid filter flag: {e}"))
}

fn default_output(input: &Path) -> PathBuf {
    let name = prism_io::export_filename(input.file_name().and_then(|n| n.to_str()));
    input.with_file_name(name)
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prism=warn,prism_pipeline=warn,prism_io=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();

    let stages = match stages_from_cli(&cli) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match prism_io::load_path(&cli.input) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error loading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        width = image.width(),
        height = image.height(),
        enabled = stages.enabled_count(),
        "loaded input"
    );

    let mut scheduler = Scheduler::new();
    let requester = scheduler.requester();
    requester.set_source(image);
    requester.set_stages(stages);

    let report = match scheduler.run_pending() {
        Ok(Some(report)) => report,
        Ok(None) => {
            eprintln!("Pipeline produced no output");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };
    for fault in &report.faults {
        eprintln!("Warning: {fault}");
    }

    let Some(output) = scheduler.current_output() else {
        eprintln!("Pipeline produced no output");
        return ExitCode::FAILURE;
    };

    let png = match prism_io::encode_png(&output) {
        Ok(png) => png,
        Err(e) => {
            eprintln!("Error encoding PNG: {e}");
            return ExitCode::FAILURE;
        }
    };

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input));
    if let Err(e) = std::fs::write(&output_path, &png) {
        eprintln!("Error writing {}: {e}", output_path.display());
        return ExitCode::FAILURE;
    }
    eprintln!("Wrote {} ({} bytes)", output_path.display(), png.len());

    if cli.json {
        match serde_json::to_string_pretty(&report.diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    if cli.report {
        println!("{}", report.diagnostics.report());
    }

    ExitCode::SUCCESS
}
