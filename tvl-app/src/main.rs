//! TVL - time-varying binaural loudness of a recording
//!
//! Decodes a mono or stereo recording, runs the loudness model and prints
//! the maximum short-term and long-term loudness in sone and phon.

mod report;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tvl_analysis::{AnalysisProgress, FieldType, LoudnessAnalyzer};
use tvl_library::{Config, RecordingLoader};

use report::{write_csv, Summary};

#[derive(Debug, Parser)]
#[command(name = "tvl")]
#[command(about = "Time-varying binaural loudness (ISO 532-3)", long_about = None)]
struct Args {
    /// Recording to analyse (mono or stereo)
    input: PathBuf,

    /// dB SPL of a full-scale sinusoid; overrides the stored value
    #[arg(short, long)]
    calibration: Option<f32>,

    /// Sound field: free or diffuse; overrides the stored value
    #[arg(short, long)]
    field: Option<FieldType>,

    /// Write every per-frame sequence to a CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store the given calibration and field type for later runs
    #[arg(long, default_value_t = false)]
    save_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let (stored, config_path) = load_config(args.config.as_deref())?;
    let overrides = Config {
        calibration_level: args.calibration,
        field_type: args.field,
    };
    let config = stored.merged(&overrides);

    if args.save_config {
        config
            .save_to(&config_path)
            .with_context(|| format!("save config to {}", config_path.display()))?;
        info!(path = %config_path.display(), "saved config");
    }

    let calibration_db = config.calibration_level.with_context(|| {
        format!(
            "no calibration level: pass --calibration or set calibration_level in {}",
            config_path.display()
        )
    })?;
    let field_type = config.field_type.unwrap_or_default();

    let loaded = RecordingLoader::new()
        .load(&args.input)
        .with_context(|| format!("load {}", args.input.display()))?;
    info!(
        title = %loaded.info.title,
        channels = loaded.info.channels,
        sample_rate = loaded.info.source_sample_rate,
        duration_secs = loaded.info.duration_secs,
        "loaded recording"
    );

    let analyzer =
        LoudnessAnalyzer::new(field_type, calibration_db).context("create loudness analyser")?;
    let started = Instant::now();
    let loudness = analyzer
        .analyze_with_progress(&loaded.signal, |progress| match progress {
            AnalysisProgress::Started { samples, channels } => {
                debug!(samples, channels, "analysis started")
            }
            AnalysisProgress::Stage(stage) => info!(%stage, "running"),
            AnalysisProgress::Complete { frames, loudness } => {
                debug!(frames, loudness, "analysis complete")
            }
        })
        .context("analyse recording")?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "done");

    let summary = Summary::new(&loudness, calibration_db, field_type)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    summary.write_to(&mut out)?;
    out.flush()?;

    if let Some(path) = args.csv {
        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        write_csv(&loudness, &mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), frames = loudness.frame_count(), "wrote CSV");
    }

    Ok(())
}

/// Read the stored config and return it with the path it lives at
///
/// A file named on the command line must be readable; the default file is
/// optional.
fn load_config(explicit: Option<&Path>) -> Result<(Config, PathBuf)> {
    match explicit {
        Some(path) => {
            let config = Config::load_from(path)
                .with_context(|| format!("read config {}", path.display()))?;
            Ok((config, path.to_path_buf()))
        }
        None => {
            let path = Config::config_path();
            Ok((Config::load_from(&path).unwrap_or_default(), path))
        }
    }
}
