use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use perfshot_orchestrator::{Orchestrator, PerfshotConfig, RunReport, RunState};
use perfshot_process::CommandLine;

/// Profile a service under deterministic HTTP load and render a flame graph
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target service command line, e.g. "./game_server --port 8080"
    #[arg(value_name = "TARGET")]
    target: String,

    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Number of requests to fire (overrides config)
    #[arg(long)]
    shots: Option<u32>,

    /// PRNG seed for endpoint selection (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for the trace and the flame graph
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Write a JSON run report to FILE
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Print the planned request sequence and exit without launching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug)?;

    let config = load_config(&args)?;
    let target = CommandLine::parse(&args.target).context("Invalid target command")?;

    if args.dry_run {
        return print_plan(&target, &config);
    }

    info!("Target: {}", target);
    info!(
        "Trace: {}, graph: {}",
        config.profiler.output.display(),
        config.render.output.display()
    );

    let orchestrator = Orchestrator::from_config(target, &config)?;

    // Dropping the run future signals every child it still owns.
    let report = tokio::select! {
        report = orchestrator.run() => report,
        _ = shutdown_signal() => {
            warn!("Run interrupted, children have been signalled");
            return Err(anyhow::anyhow!("Run interrupted"));
        }
    };

    if let Some(load) = &report.load {
        println!("Shooting complete");
        info!(
            "{} requests attempted, {} succeeded, {} failed",
            load.attempted, load.succeeded, load.failed
        );
    }

    for failure in &report.failures {
        error!("Failed during {}: {}", failure.state, failure.error);
    }

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    if report.final_state == RunState::Done {
        if let Some(graph) = &report.graph {
            info!("Flame graph: {}", graph.path.display());
        }
        println!("Job done");
    }

    let code = report.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    Ok(())
}

fn load_config(args: &Args) -> Result<PerfshotConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Config file: {}", path.display());
            PerfshotConfig::load_from_file(path)?
        }
        None => PerfshotConfig::default(),
    };

    if let Some(shots) = args.shots {
        config.load.shot_count = shots;
    }
    if let Some(seed) = args.seed {
        config.load.seed = seed;
    }
    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        config = config.with_output_dir(dir);
    }

    config.validate()?;
    Ok(config)
}

fn print_plan(target: &CommandLine, config: &PerfshotConfig) -> Result<()> {
    let orchestrator = Orchestrator::from_config(target.clone(), config)?;
    let plan = orchestrator.plan()?;
    let endpoints = orchestrator.load_config().ammunition.endpoints();

    println!("Target: {}", target);
    println!(
        "Seed {} | {} shots | cooldown {:?}",
        config.load.seed, config.load.shot_count, config.load.cooldown
    );
    for (shot, index) in plan.iter().enumerate() {
        println!("shot {:>4}: [{}] {}", shot, index, endpoints[*index]);
    }
    for (index, endpoint) in endpoints.iter().enumerate() {
        let hits = plan.iter().filter(|i| **i == index).count();
        println!("total [{}] {}: {}", index, endpoint, hits);
    }
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report: {}", path.display()))?;
    info!("Run report written to {}", path.display());
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let handlers = signal::unix::signal(signal::unix::SignalKind::terminate()).and_then(|term| {
            signal::unix::signal(signal::unix::SignalKind::interrupt()).map(|int| (term, int))
        });
        let (mut sigterm, mut sigint) = match handlers {
            Ok(handlers) => handlers,
            Err(e) => {
                warn!("Signal handlers unavailable: {}", e);
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if signal::ctrl_c().await.is_err() {
            return std::future::pending().await;
        }
        info!("Received Ctrl+C signal");
    }
}
