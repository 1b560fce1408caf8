//! `ldm-daemon`: scan devices, report the GPU configuration, then follow
//! hotplug events until the source runs dry or the process is interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use ldm_core::config::ConfigBuilder;
use ldm_core::logging;
use ldm_daemon::{Daemon, EnumerationSource, LoggingObserver, ReplaySource, SysfsPciSource};

#[derive(Parser)]
#[command(name = "ldm-daemon", version, about = "Linux driver management hotplug daemon")]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Replay JSON-lines device events instead of scanning sysfs
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Log filter; takes precedence over RUST_LOG and the configured level
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Print the GPU report as JSON after the initial scan and exit
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut builder = ConfigBuilder::new().with_environment_prefix("ldm");
    if let Some(path) = &args.config {
        builder = builder.with_config_file(path);
    }
    let mut config = builder.build().context("Failed to load configuration")?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    match &args.log_level {
        Some(filter) => logging::init_with_filter(filter, config.logging.with_target)?,
        None => logging::init_from_config(&config.logging)?,
    }
    ldm_daemon::init()?;

    let mut source: Box<dyn EnumerationSource> = match &args.replay {
        Some(path) => Box::new(ReplaySource::from_path(path)?),
        None => Box::new(SysfsPciSource::new(&config.daemon.sysfs_root)),
    };

    let mut daemon = Daemon::new(config.daemon.clone());
    daemon.register_observer(LoggingObserver);

    let report = daemon
        .start(source.as_mut())
        .with_context(|| format!("Failed to initialise the {} source", source.name()))?;

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (tx, rx) = mpsc::channel(config.daemon.event_queue);
    let feeder = source.subscribe(tx);
    daemon.run(rx).await?;
    feeder.await?;

    Ok(())
}
