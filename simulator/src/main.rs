use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::{gui_bind_address, GuiBridge};
use rsscore::ServiceKind;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{DeliveryMode, WorkflowConfig};
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Radar service workflow driver on a synthetic sensor")]
struct Args {
    /// Load a workflow config from YAML; the flags below override it
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// envelope, iq, power_bins or sparse
    #[arg(long)]
    service: Option<ServiceKind>,
    #[arg(long)]
    start: Option<f32>,
    #[arg(long)]
    length: Option<f32>,
    #[arg(long)]
    sweep_rate: Option<f32>,
    #[arg(long)]
    sweeps_per_frame: Option<u8>,
    #[arg(long)]
    cycles: Option<usize>,
    #[arg(long, value_enum)]
    mode: Option<DeliveryMode>,
    /// Seed for the synthetic scene noise
    #[arg(long)]
    seed: Option<u64>,
    /// Keep the HTTP bridge alive after the run
    #[arg(long, default_value_t = false)]
    serve: bool,
}

impl Args {
    fn workflow_config(&self) -> anyhow::Result<WorkflowConfig> {
        let mut config = match &self.workflow {
            Some(path) => WorkflowConfig::load(path)?,
            None => WorkflowConfig::from_service(self.service.unwrap_or(ServiceKind::Envelope)),
        };
        if let Some(service) = self.service {
            config.service = service;
        }
        let overrides = &mut config.overrides;
        overrides.start_m = self.start.or(overrides.start_m);
        overrides.length_m = self.length.or(overrides.length_m);
        overrides.sweep_rate_hz = self.sweep_rate.or(overrides.sweep_rate_hz);
        overrides.sweeps_per_frame = self.sweeps_per_frame.or(overrides.sweeps_per_frame);
        if let Some(cycles) = self.cycles {
            config.cycles = cycles;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(seed) = self.seed {
            config.scene.seed = seed;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let workflow_config = args.workflow_config()?;

    let gui_bridge = GuiBridge::new();
    if args.serve {
        gui_bridge.serve(gui_bind_address());
    }

    let runner = Runner::new(workflow_config);
    let result = runner
        .execute(|metadata, summary| {
            gui_bridge.publish_metadata(metadata);
            gui_bridge.publish_measurement(summary);
        })
        .with_context(|| format!("running {} workflow", runner.config().service))?;
    gui_bridge.publish_stats(result.metrics);

    println!(
        "{} run -> {} results, {} values each, {:.3}..{:.3} m, stitch count {}, retries {}",
        runner.config().service,
        result.summaries.len(),
        result.metadata.data_length,
        result.metadata.actual_start_m,
        result.metadata.actual_end_m(),
        result.metadata.stitch_count,
        result.metrics.retries
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&result.summaries).context("encoding summaries")?
    );

    if args.serve {
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
