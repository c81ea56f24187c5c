use anyhow::{Context, Result};
use boshdash::agent::Agent;
use boshdash::config::Config;
use boshdash::hub::{self, MetricsStore};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Health telemetry for BOSH deployments
#[derive(Parser, Debug)]
#[command(name = "boshdash", version = boshdash::VERSION, about, long_about = None)]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Append logs to this file instead of stdout
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample this VM and report to the hub periodically
    Agent,
    /// Serve the telemetry hub
    Hub,
    /// Resolve Cloud Foundry metadata for a deployment once and print it
    Resolve {
        /// Deployment name (defaults to spec.deployment from the config)
        deployment: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("boshdash {} started with log level: {:?}", boshdash::VERSION, level);

    Ok(Some(guard))
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn run_hub(config: Config) -> Result<()> {
    let db_path = config.db_path();
    let store = Arc::new(MetricsStore::open(&db_path)?);

    let listener = tokio::net::TcpListener::bind(&config.hub_addr)
        .await
        .with_context(|| format!("Failed to bind hub on {}", config.hub_addr))?;

    hub::serve(listener, store, shutdown_signal())
        .await
        .context("Hub server failed")
}

async fn run_resolve(config: Config, deployment: Option<String>) -> Result<()> {
    let cf = config
        .cf
        .as_ref()
        .context("No cf section in config; nothing to resolve against")?;
    let resolver = cf.build_resolver()?;
    let deployment = deployment.unwrap_or_else(|| config.spec.deployment.clone());

    let info = resolver.resolve(&deployment).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;

    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Agent => {
            let agent = Agent::new(config)?;
            agent.run(shutdown_signal()).await;
            Ok(())
        }
        Command::Hub => run_hub(config).await,
        Command::Resolve { deployment } => run_resolve(config, deployment).await,
    }
}
