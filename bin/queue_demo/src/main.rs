use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use foundation_testing::{HarnessConfig, QueueHarness};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod config;
mod scenario;

use config::Overrides;
use scenario::Scenario;

/// Drives producer and consumer threads against a bounded blocking queue.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML file with scenario settings; flags below take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Which scenario to run
    #[arg(short, long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Log queue waits and cancellations
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let base = match &args.config {
        Some(path) => config::load(path)?,
        None => HarnessConfig::default(),
    };
    let config = args.overrides.apply(base);
    tracing::debug!(?config, "resolved scenario config");

    let harness = Arc::new(QueueHarness::new(&config).context("invalid queue configuration")?);

    let interrupted = Arc::clone(&harness);
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl-C, cancelling scenario threads");
        interrupted.interrupt();
    })
    .context("Error setting Ctrl-C handler")?;

    for report in scenario::run(&harness, &config, args.scenario)? {
        println!("{report}");
    }
    println!("{}", harness.status());

    Ok(())
}
