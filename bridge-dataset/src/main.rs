//! Bridge dataset generator entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use bridge_dataset::config::SimulatorBackend;
use bridge_dataset::manifest::RecordFlag;
use bridge_dataset::sampler::BridgeFamily;
use bridge_dataset::{BridgePipeline, PipelineConfig};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bridge-dataset", version, about = "Generate labelled synthetic bridge point clouds")]
struct Cli {
    /// Number of bridges to generate.
    count: Option<usize>,

    /// Restrict sampling to one bridge family (box_girder | beam_slab).
    #[arg(long)]
    family: Option<BridgeFamily>,

    /// Batch seed; every bridge derives its own seed from it.
    #[arg(long)]
    seed: Option<u64>,

    /// Dataset root directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Export per-component meshes.
    #[arg(long)]
    export_components: Option<bool>,

    /// Run the scan simulator.
    #[arg(long)]
    simulate: Option<bool>,

    /// Label the simulated points.
    #[arg(long)]
    segment: Option<bool>,

    /// Write the fixed-size feature array.
    #[arg(long)]
    convert: Option<bool>,

    /// Scan simulator backend.
    #[arg(long, value_enum)]
    simulator: Option<SimulatorBackend>,

    /// Path to the HELIOS++ executable.
    #[arg(long)]
    helios_exe: Option<PathBuf>,

    /// Distance beyond the half-width for the side legs, in metres.
    #[arg(long)]
    lateral_offset: Option<f64>,

    /// Distance beyond the half-length for the front and back legs, in metres.
    #[arg(long)]
    longitudinal_offset: Option<f64>,

    /// Exit non-zero if any bridge fails.
    #[arg(long)]
    strict: bool,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        let output = &mut config.output;
        if let Some(count) = self.count {
            output.bridge_count = count;
        }
        if let Some(seed) = self.seed {
            output.seed = seed;
        }
        if let Some(dir) = &self.output {
            output.output_dir = dir.clone();
        }
        if let Some(v) = self.export_components {
            output.export_components = v;
        }
        if let Some(v) = self.simulate {
            output.simulate = v;
        }
        if let Some(v) = self.segment {
            output.segment = v;
        }
        if let Some(v) = self.convert {
            output.convert = v;
        }
        if let Some(family) = self.family {
            config.sampler.overrides.family = Some(family);
        }
        if let Some(backend) = self.simulator {
            config.simulator.backend = backend;
        }
        if let Some(exe) = &self.helios_exe {
            config.simulator.helios_executable = exe.clone();
        }
        if let Some(offset) = self.lateral_offset {
            config.planner.lateral_offset_m = offset;
        }
        if let Some(offset) = self.longitudinal_offset {
            config.planner.longitudinal_offset_m = offset;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = cli.resolve()?;
    let simulator = config.simulator.build();
    let pipeline = BridgePipeline::new(&config, simulator.as_ref())?;

    // Ctrl+C stops every bridge at its next stage boundary
    let cancel = pipeline.cancel_flag();
    ctrlc::set_handler(move || {
        warn!("interrupt received, cancelling remaining bridges");
        cancel.store(true, Ordering::SeqCst);
    })
    .ok();

    let summary = pipeline.run().context("writing dataset summary")?;

    let missing = summary.flagged(RecordFlag::is_missing_leg_scan);
    let undersampled = summary.flagged(RecordFlag::is_undersampled);
    info!(
        completed = summary.completed,
        failed = summary.failed,
        missing_leg_scan = missing.len(),
        undersampled = undersampled.len(),
        "dataset written to {}",
        config.output.output_dir.display()
    );

    if summary.completed == 0 {
        warn!("no bridge completed");
        return Ok(ExitCode::FAILURE);
    }
    if cli.strict && summary.failed > 0 {
        warn!(failed = summary.failed, "strict mode: bridge failures are fatal");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(&cli)
}
