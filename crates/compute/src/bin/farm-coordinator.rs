//! farm-coordinator: hands out rows, collects results, writes the image.
//!
//! Three ways to run:
//! - `--local-workers N`: N workers as tasks in this process
//! - remote workers (`--workers N` or `cluster.workers` in `relay.toml`):
//!   binds a ROUTER socket and waits for N `farm-worker` processes to join
//! - neither: the coordinator computes every row itself
//!
//! Render settings come from `MANDELFARM_*` variables (a `.env` file is
//! honoured) and can be overridden with flags.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use mandelfarm_compute::image::save_ppm;
use mandelfarm_compute::{run_local, run_single, EscapeTimeKernel, Roster, RunOutput, Scheduler};
use mandelfarm_core::config::load_dotenv;
use mandelfarm_core::{Config, Orientation};
use mandelfarm_relay::{RelayConfig, ZmqCoordinatorLink};

/// Coordinator of a Mandelbrot row farm.
#[derive(Parser, Debug)]
#[command(name = "farm-coordinator", version, about)]
struct Cli {
    /// Path to relay.toml.
    #[arg(long, env = "RELAY_CONFIG", default_value = "config/relay.toml")]
    config: String,

    /// Image width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Iteration budget per pixel.
    #[arg(long)]
    max_iter: Option<u32>,

    /// Output PPM path.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// `bottom_up` or `top_down`.
    #[arg(long)]
    orientation: Option<Orientation>,

    /// Remote workers to wait for (overrides relay.toml).
    #[arg(long)]
    workers: Option<u32>,

    /// Run this many workers in-process instead of remote ones.
    #[arg(long, conflicts_with = "workers")]
    local_workers: Option<usize>,

    /// ROUTER endpoint (overrides relay.toml).
    #[arg(long)]
    endpoint: Option<String>,

    /// Seconds to wait for remote workers to join; 0 waits forever.
    #[arg(long)]
    join_timeout: Option<u64>,

    /// Threads for single-participant rendering; 0 = one per core.
    #[arg(long)]
    threads: Option<usize>,

    /// Write scheduler metrics as JSON to this path.
    #[arg(long)]
    metrics_json: Option<PathBuf>,
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
    apply_render_overrides(&mut config, &cli);
    config.log_summary();

    // Reject a bad grid before any worker is contacted.
    let geometry = config.render.geometry()?;
    let kernel = Arc::new(EscapeTimeKernel::new(geometry));
    let orientation = config.render.orientation;

    let mut relay = match RelayConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded relay config");
            cfg
        }
        Err(e) => {
            warn!(error = %e, path = %cli.config, "failed to load relay config, using local defaults");
            let mut cfg = RelayConfig::local();
            cfg.apply_env_overrides();
            cfg
        }
    };
    if let Some(endpoint) = &cli.endpoint {
        relay.coordinator.endpoint = endpoint.clone();
    }
    if let Some(workers) = cli.workers {
        relay.cluster.workers = workers;
    }
    if let Some(secs) = cli.join_timeout {
        relay.coordinator.join_timeout_secs = secs;
    }
    relay.validate()?;

    let output = match cli.local_workers {
        Some(workers) if workers > 0 => {
            info!(workers, "running in-process workers");
            let run = run_local(kernel, workers, orientation).await?;
            for report in &run.workers {
                info!(worker = %report.name, rows = report.rows.len(), "worker finished");
            }
            run.output
        }
        _ if relay.cluster.workers > 0 => run_remote(&relay, kernel, orientation).await?,
        _ => run_single(kernel, orientation, config.local.threads).await?,
    };

    report(&output);
    save_ppm(
        &config.render.output,
        output.width,
        output.rows,
        &output.cells,
        output.max_value,
    )?;

    if let Some(path) = &cli.metrics_json {
        let mut doc = serde_json::to_value(&output.metrics)?;
        doc["config"] = config.summary();
        std::fs::write(path, serde_json::to_string_pretty(&doc)?)?;
        info!(path = %path.display(), "metrics written");
    }

    info!("farm-coordinator exited cleanly");
    Ok(())
}

async fn run_remote(
    relay: &RelayConfig,
    kernel: Arc<EscapeTimeKernel>,
    orientation: Orientation,
) -> anyhow::Result<RunOutput> {
    let transport = relay.coordinator_transport()?;
    let link = ZmqCoordinatorLink::bind(&transport).await?;
    let expected = relay.cluster.workers as usize;

    let roster = Roster::gather(&link, expected, relay.join_timeout()).await?;
    let output = Scheduler::new(link, kernel, roster, orientation)?
        .run()
        .await?;
    Ok(output)
}

fn apply_render_overrides(config: &mut Config, cli: &Cli) {
    let render = &mut config.render;
    if let Some(w) = cli.width {
        render.width = w;
    }
    if let Some(h) = cli.height {
        render.height = h;
    }
    if let Some(k) = cli.max_iter {
        render.max_iter = k;
    }
    if let Some(path) = &cli.output {
        render.output = path.clone();
    }
    if let Some(o) = cli.orientation {
        render.orientation = o;
    }
    if let Some(t) = cli.threads {
        config.local.threads = t;
    }
}

fn report(output: &RunOutput) {
    let m = &output.metrics;
    let elapsed = m.elapsed.map(|d| d.as_secs_f64()).unwrap_or_default();
    info!(
        mode = ?m.mode,
        workers = m.workers,
        rows = m.rows_completed,
        elapsed_secs = elapsed,
        rows_per_sec = m.throughput().unwrap_or_default(),
        "mandelbrot set computed"
    );
    for (worker, rows) in &m.results_per_worker {
        info!(worker = %worker, rows, "rows per worker");
    }
}
