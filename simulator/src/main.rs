use anyhow::Context;
use clap::Parser;
use fmcwcore::processing::ReportPublisher;
use generator::profile::Reflector;
use gui_bridge::bridge::{default_bind_address, GuiBridge};
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{Overrides, WorkflowConfig};
use workflow::runner::{Runner, WorkflowResult};

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthetic FMCW radar scene driver")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Process frames on the calling thread without acquisition or pacing
    #[arg(long, default_value_t = false)]
    offline: bool,
    #[arg(long)]
    frames: Option<u64>,
    #[arg(long)]
    samples: Option<usize>,
    #[arg(long)]
    chirps: Option<usize>,
    /// Receive antenna mask, decimal or 0b/0x prefixed
    #[arg(long, value_parser = parse_mask)]
    rx_mask: Option<u32>,
    /// Scene reflector as range_m,angle_deg[,velocity_mps]; repeatable
    #[arg(long = "reflector", value_parser = Reflector::parse)]
    reflectors: Vec<Reflector>,
    /// Probability of a transient acquisition failure per attempt
    #[arg(long)]
    failure_rate: Option<f32>,
    #[arg(long)]
    seed: Option<u64>,
    /// Append the first antenna matrix of each processed frame to this file
    #[arg(long)]
    dump: Option<PathBuf>,
    /// Serve the latest report over HTTP and keep running until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn parse_mask(value: &str) -> Result<u32, String> {
    let parsed = if let Some(bits) = value.strip_prefix("0b") {
        u32::from_str_radix(bits, 2)
    } else if let Some(hex) = value.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        value.parse()
    };
    parsed.map_err(|err| format!("invalid rx mask '{}': {}", value, err))
}

fn summarize(result: &WorkflowResult) {
    println!(
        "frames {}, presence in {}, max targets {}, acquired {}, unavailable {}, cooldowns {}",
        result.reports.len(),
        result.presence_frames(),
        result.max_targets(),
        result.metrics.frames_acquired,
        result.metrics.frames_unavailable,
        result.metrics.cooldowns
    );
    if let Some(last) = result.reports.last() {
        for target in &last.targets {
            println!(
                "  target at {:.2} m, {:.1} deg, {:.2} m/s ({} cells)",
                target.range_m, target.angle_deg, target.velocity_mps, target.members
            );
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let base = match &args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    let config = base.apply(Overrides {
        frames: args.frames,
        samples: args.samples,
        chirps: args.chirps,
        rx_mask: args.rx_mask,
        reflectors: args.reflectors,
        failure_rate: args.failure_rate,
        seed: args.seed,
        dump: args.dump,
    });
    config
        .pipeline
        .validate()
        .context("validating pipeline configuration")?;

    let publisher = ReportPublisher::new();
    let bridge = if args.serve {
        Some(GuiBridge::spawn(publisher.clone(), default_bind_address())?)
    } else {
        None
    };

    let runner = Runner::new(config, publisher);
    let result = if args.offline {
        runner.execute_offline()?
    } else {
        runner.execute()?
    };
    summarize(&result);

    if let Some(bridge) = bridge {
        println!(
            "serving http://{}/report (Ctrl+C to stop)",
            bridge.address()
        );
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
