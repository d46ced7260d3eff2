use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sensor_monitoring::{
    config::{Config, read_config_file},
    scheduler::Scheduler,
    store::TimeSeriesStore,
    util::get_config_path,
};
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (falls back to $SMT_CONFIG)
    #[arg(short)]
    file: Option<String>,

    /// Log everything down to trace level
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("sensor_monitoring", level),
        ("smt_daemon", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn load_config(file: Option<String>) -> anyhow::Result<Config> {
    match file.or_else(get_config_path) {
        Some(path) => read_config_file(&path),
        None => {
            debug!("no config file given, using defaults");
            Ok(Config::default())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = load_config(args.file)?;
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "could not create data directory {}",
            config.data_dir.display()
        )
    })?;

    let rrdtool = config.store();
    info!("storing series in {} with {}", config.data_dir.display(), rrdtool.binary().display());
    let store: Arc<dyn TimeSeriesStore> = Arc::new(rrdtool);

    let plugins = config.build_plugins();
    if plugins.is_empty() {
        warn!("no plugins configured, only checking limits");
    }

    let mut scheduler = Scheduler::new(store.clone());
    scheduler.spawn_all(plugins);
    scheduler.spawn_limit_monitor(Arc::new(config.limit_checker(store)), config.check_interval());

    info!("started {} plugins", scheduler.sources().len());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("stopping, waiting for running cycles to finish");
    scheduler.shutdown().await;

    Ok(())
}
