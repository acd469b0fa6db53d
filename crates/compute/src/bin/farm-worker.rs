//! farm-worker: computes the rows a coordinator assigns until told to stop.
//!
//! The grid settings must match the coordinator's; both read the same
//! `MANDELFARM_*` variables.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use mandelfarm_compute::{EscapeTimeKernel, WorkerLoop};
use mandelfarm_core::config::load_dotenv;
use mandelfarm_core::Config;
use mandelfarm_relay::{RelayConfig, RelayError, Transport, ZmqWorkerLink};

/// Worker of a Mandelbrot row farm.
#[derive(Parser, Debug)]
#[command(name = "farm-worker", version, about)]
struct Cli {
    /// Path to relay.toml.
    #[arg(long, env = "RELAY_CONFIG", default_value = "config/relay.toml")]
    config: String,

    /// Coordinator endpoint (overrides relay.toml).
    #[arg(long)]
    endpoint: Option<String>,

    /// Name reported in the join message.
    #[arg(long, env = "FARM_WORKER_NAME")]
    name: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    max_iter: Option<u32>,

    /// Connection attempts before giving up.
    #[arg(long, default_value_t = 20)]
    connect_attempts: u32,

    /// Delay between connection attempts in milliseconds.
    #[arg(long, default_value_t = 250)]
    connect_backoff_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(w) = cli.width {
        config.render.width = w;
    }
    if let Some(h) = cli.height {
        config.render.height = h;
    }
    if let Some(k) = cli.max_iter {
        config.render.max_iter = k;
    }
    let geometry = config.render.geometry()?;

    let mut relay = match RelayConfig::from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, path = %cli.config, "failed to load relay config, using local defaults");
            let mut cfg = RelayConfig::local();
            cfg.apply_env_overrides();
            cfg
        }
    };
    if let Some(endpoint) = cli.endpoint {
        relay.coordinator.endpoint = endpoint;
    }
    let transport = relay.coordinator_transport()?;

    let name = cli
        .name
        .unwrap_or_else(|| format!("worker-{}", std::process::id()));
    let link = connect(
        &transport,
        cli.connect_attempts.max(1),
        Duration::from_millis(cli.connect_backoff_ms),
    )
    .await?;

    info!(worker = %name, %geometry, coordinator = %transport, "farm-worker starting");
    let kernel = Arc::new(EscapeTimeKernel::new(geometry));
    let report = WorkerLoop::new(link, kernel, name).run().await?;

    info!(worker = %report.name, rows = report.rows.len(), "farm-worker exited cleanly");
    Ok(())
}

/// The coordinator may still be starting; retry a few times.
async fn connect(
    transport: &Transport,
    attempts: u32,
    backoff: Duration,
) -> Result<ZmqWorkerLink, RelayError> {
    let mut attempt = 1;
    loop {
        match ZmqWorkerLink::connect(transport).await {
            Ok(link) => return Ok(link),
            Err(e) if attempt < attempts => {
                warn!(error = %e, attempt, "coordinator not reachable yet");
                attempt += 1;
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
