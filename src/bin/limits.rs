use std::sync::Arc;

use clap::Parser;
use sensor_monitoring::{
    config::{Config, read_config_file},
    error::LimitError,
    limits::Transition,
    store::TimeSeriesStore,
    util::get_config_path,
};
use tracing::{debug, error, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (falls back to $SMT_CONFIG)
    #[arg(short)]
    file: Option<String>,

    /// Check every datasource and report only the changed ones
    #[arg(long, conflicts_with = "datasources")]
    all: bool,

    /// Datasources to check, e.g. `loadavg.5min`
    datasources: Vec<String>,

    /// Log everything down to trace level
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("sensor_monitoring", level),
        ("smt_limits", level),
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

fn print_transition(name: &str, transition: &Transition) {
    if transition.is_change() {
        println!(
            "{name}: {} -> {} ({})",
            transition.previous, transition.current, transition.value
        );
    } else {
        println!("{name}: {} ({})", transition.current, transition.value);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = load_config(args.file)?;
    let store: Arc<dyn TimeSeriesStore> = Arc::new(config.store());
    let checker = config.limit_checker(store);

    if args.all || args.datasources.is_empty() {
        for (name, transition) in checker.check_all().await {
            print_transition(&name, &transition);
        }
        return Ok(());
    }

    let mut failed = 0;
    for name in &args.datasources {
        match checker.check(name).await {
            Ok(transition) => print_transition(name, &transition),
            Err(LimitError::NoLimitsConfigured(_)) => println!("{name}: no limits configured"),
            Err(e) => {
                error!("{e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} checks failed", args.datasources.len());
    }
    Ok(())
}
