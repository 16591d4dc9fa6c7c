// # cfddnsd - Cloudflare DDNS updater
//
// Thin integration layer: all reconciliation logic lives in cfddns-core.
//
// cfddnsd is responsible for:
// 1. Parsing the command line
// 2. Loading `config.json`
// 3. Initializing logging and the runtime
// 4. Wiring the Cloudflare provider and the trace IP source into the engine
// 5. Running one pass, or repeating passes until SIGTERM/SIGINT
//
// ## Configuration
//
// `config.json` is read from the directory given by `--config-dir`, else
// `DDNS_CONFIG_PATH`, else the current directory:
//
// ```json
// {
//   "api_token": "...",
//   "zone_id": "...",
//   "subdomains": [{ "name": "", "proxied": false }, { "name": "www", "proxied": true }],
//   "purgeUnknownRecords": false,
//   "ttl": 300
// }
// ```
//
// ### Environment
// - `DDNS_CONFIG_PATH`: Directory holding `config.json`
// - `DDNS_MODE`: `dry-run` to log writes instead of sending them
// - `RUST_LOG`: Log filter (takes precedence)
// - `DDNS_LOG_LEVEL`: Log level when `RUST_LOG` is unset (default: info)
//
// ## Example
//
// ```bash
// DDNS_CONFIG_PATH=/etc/cfddns cfddnsd --repeat
// ```

use anyhow::{Context, Result};
use cfddns_core::{DdnsConfig, DdnsEngine, EngineEvent};
use cfddns_ip_trace::TraceIpSource;
use cfddns_provider_cloudflare::CloudflareProvider;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown or successful pass
/// - 1: Configuration or startup error
/// - 2: Runtime error (aborted pass or failed writes in one-shot mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Command line
#[derive(Debug, Parser)]
#[command(name = "cfddnsd", version, about = "Keep Cloudflare A-records on the host's public IPv4")]
struct Cli {
    /// Repeat passes every TTL seconds until SIGTERM/SIGINT
    #[arg(long)]
    repeat: bool,

    /// Directory holding config.json
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(DdnsConfig::dir_from_env);

    let config = match DdnsConfig::load_from_dir(&config_dir) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!(
        "Configuration loaded from {}: {} subdomain(s), ttl={}",
        config_dir.display(),
        config.subdomains.len(),
        config.ttl
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config, cli.repeat)).into()
}

/// Install the global subscriber
///
/// `RUST_LOG` wins; otherwise `DDNS_LOG_LEVEL` (default: info).
fn init_tracing() -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = std::env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            EnvFilter::try_new(level.to_lowercase())
                .with_context(|| format!("DDNS_LOG_LEVEL '{}' is not valid", level))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Build the engine and run it in the requested mode
async fn run_daemon(config: DdnsConfig, repeat: bool) -> DdnsExitCode {
    let (engine, events) = match build_engine(config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    let event_logger = tokio::spawn(log_events(events));

    let code = if repeat {
        run_repeating(engine).await
    } else {
        run_single(engine).await
    };

    // Engine dropped: the event channel closes and the logger drains
    if let Err(e) = event_logger.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    code
}

fn build_engine(config: DdnsConfig) -> Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    let provider = CloudflareProvider::from_config(&config)
        .context("Failed to create Cloudflare provider")?;
    let ip_source =
        TraceIpSource::from_config(&config).context("Failed to create trace IP source")?;

    let engine = DdnsEngine::new(
        Box::new(ip_source),
        Box::new(provider.clone()),
        Box::new(provider),
        config,
    )
    .context("Failed to create DDNS engine")?;

    Ok(engine)
}

async fn run_single(engine: DdnsEngine) -> DdnsExitCode {
    match engine.run_once().await {
        Ok(report) if report.has_failures() => {
            error!("Pass finished with {} failed write(s)", report.failed);
            DdnsExitCode::RuntimeError
        }
        Ok(_) => DdnsExitCode::CleanShutdown,
        Err(e) => {
            error!("Pass aborted: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

async fn run_repeating(engine: DdnsEngine) -> DdnsExitCode {
    let shutdown = match shutdown_signal() {
        Ok(rx) => rx,
        Err(e) => {
            error!("Startup error: {}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    match engine.run(shutdown).await {
        Ok(()) => {
            info!("Shutting down");
            DdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Engine error: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Trace engine events until the channel closes
///
/// The engine logs outcomes itself; this only keeps the channel drained.
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

/// Arm SIGTERM/SIGINT handlers and return a receiver that fires on either
///
/// Handlers are installed before returning.
#[cfg(unix)]
fn shutdown_signal() -> Result<oneshot::Receiver<()>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
        let _ = tx.send(());
    });

    Ok(rx)
}

/// Fallback for non-Unix platforms (CTRL-C only)
#[cfg(not(unix))]
fn shutdown_signal() -> Result<oneshot::Receiver<()>> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal: CTRL-C");
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                // Dropping tx would stop the loop
                std::future::pending::<()>().await;
            }
        }
    });

    Ok(rx)
}
