//! farm-launcher: starts a coordinator and N workers on this machine.
//!
//! Reads `relay.toml`, spawns the coordinator, waits until its endpoint
//! accepts connections, then spawns the workers with coloured log prefixes.
//! Exits with the coordinator's status once the run is over.
//!
//! ```bash
//! farm-launcher --workers 4
//! farm-launcher --config path/to/relay.toml
//! ```

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use mandelfarm_relay::{RelayConfig, Transport};

/// Spawns a whole farm for local runs.
#[derive(Parser, Debug)]
#[command(name = "farm-launcher", version, about)]
struct Cli {
    /// Path to relay.toml.
    #[arg(long, env = "RELAY_CONFIG", default_value = "config/relay.toml")]
    config: String,

    /// Worker processes to start (overrides cluster.workers).
    #[arg(long)]
    workers: Option<u32>,

    /// Seconds to wait for the coordinator to start listening.
    #[arg(long, default_value_t = 30)]
    ready_timeout: u64,

    /// Seconds to wait for workers to exit after the coordinator finished.
    #[arg(long, default_value_t = 10)]
    shutdown_timeout: u64,
}

const COLORS: &[&str] = &[
    "\x1b[36m", // cyan
    "\x1b[33m", // yellow
    "\x1b[32m", // green
    "\x1b[35m", // magenta
    "\x1b[34m", // blue
    "\x1b[91m", // bright red
];
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

struct ManagedChild {
    name: String,
    child: Child,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = RelayConfig::from_file(&cli.config)?;
    if let Some(workers) = cli.workers {
        config.cluster.workers = workers;
    }
    config.validate()?;
    if config.cluster.workers == 0 {
        anyhow::bail!("nothing to launch: cluster.workers is 0 (use farm-coordinator directly)");
    }

    let transport = config.coordinator_transport()?;
    let workers = config.cluster.workers;
    let max_name_len = format!("worker-{}", workers - 1).len().max("coordinator".len());
    let endpoint = transport.endpoint();
    let worker_count = workers.to_string();

    // ── Coordinator ──────────────────────────────────────────────────
    tracing::info!(endpoint = %endpoint, workers, "starting coordinator");
    let coordinator_color = format!("{BOLD}\x1b[96m");
    let mut coordinator = ManagedChild {
        name: "coordinator".to_string(),
        child: spawn_process(
            &config.launcher.coordinator_binary,
            config.launcher.use_cargo,
            &[
                "--config",
                &cli.config,
                "--workers",
                &worker_count,
                "--endpoint",
                &endpoint,
            ],
            &config.launcher.env,
            "coordinator",
            &coordinator_color,
            max_name_len,
        )?,
    };

    if !wait_until_listening(&transport, Duration::from_secs(cli.ready_timeout)).await {
        tracing::error!("coordinator did not start listening within {}s", cli.ready_timeout);
        let _ = coordinator.child.kill().await;
        anyhow::bail!("coordinator failed to start within {}s", cli.ready_timeout);
    }
    tracing::info!("coordinator is listening");

    // ── Workers ──────────────────────────────────────────────────────
    let mut workers_running = Vec::with_capacity(workers as usize);
    for i in 0..workers {
        let name = format!("worker-{i}");
        let child = spawn_process(
            &config.launcher.worker_binary,
            config.launcher.use_cargo,
            &["--config", &cli.config, "--endpoint", &endpoint, "--name", &name],
            &config.launcher.env,
            &name,
            COLORS[i as usize % COLORS.len()],
            max_name_len,
        )?;
        workers_running.push(ManagedChild { name, child });
    }
    tracing::info!(total = workers_running.len() + 1, "all processes started");

    // ── Wait ─────────────────────────────────────────────────────────
    let exit_code = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping all processes");
            let _ = coordinator.child.kill().await;
            kill_all(&mut workers_running).await;
            130
        }
        status = coordinator.child.wait() => {
            let code = status?.code().unwrap_or(1);
            if code == 0 {
                tracing::info!("coordinator finished");
            } else {
                tracing::error!(code, "coordinator failed");
            }
            let timeout = Duration::from_secs(cli.shutdown_timeout);
            if tokio::time::timeout(timeout, wait_all(&mut workers_running)).await.is_err() {
                tracing::warn!("workers still running after {}s", cli.shutdown_timeout);
                kill_all(&mut workers_running).await;
            }
            code
        }
    };

    tracing::info!("farm-launcher exited");
    std::process::exit(exit_code);
}

// ── Process management ───────────────────────────────────────────────

/// Spawn a farm binary, piping its output through prefixed lines.
fn spawn_process(
    binary: &str,
    use_cargo: bool,
    args: &[&str],
    env: &HashMap<String, String>,
    name: &str,
    color: &str,
    max_name_len: usize,
) -> anyhow::Result<Child> {
    let mut cmd = if use_cargo {
        let mut cmd = Command::new("cargo");
        cmd.args(["run", "--quiet", "--package", "mandelfarm-compute", "--bin", binary, "--"]);
        cmd
    } else {
        Command::new(binary)
    };
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (k, v) in env {
        cmd.env(k, v);
    }

    let mut child = cmd.spawn()?;
    let prefix = format!("{color}{name:>max_name_len$}{RESET} │ ");

    if let Some(stdout) = child.stdout.take() {
        let prefix = prefix.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                println!("{prefix}{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                eprintln!("{prefix}{line}");
            }
        });
    }

    Ok(child)
}

async fn wait_all(children: &mut [ManagedChild]) {
    for managed in children.iter_mut() {
        match managed.child.wait().await {
            Ok(status) => tracing::info!(worker = %managed.name, code = ?status.code(), "exited"),
            Err(e) => tracing::warn!(worker = %managed.name, error = %e, "wait failed"),
        }
    }
}

async fn kill_all(children: &mut [ManagedChild]) {
    for managed in children.iter_mut() {
        if managed.child.try_wait().ok().flatten().is_none() {
            let _ = managed.child.kill().await;
            tracing::warn!(worker = %managed.name, "killed");
        }
    }
}

/// Poll the coordinator endpoint until it accepts a connection.
async fn wait_until_listening(transport: &Transport, timeout: Duration) -> bool {
    let start = tokio::time::Instant::now();
    let interval = Duration::from_millis(200);

    while start.elapsed() < timeout {
        let reachable = match transport {
            Transport::Tcp { host, port } => {
                tokio::net::TcpStream::connect((host.as_str(), *port)).await.is_ok()
            }
            Transport::Ipc(_) => match transport.socket_path() {
                Some(path) => path.exists() && connect_unix(&path).await,
                None => false,
            },
        };
        if reachable {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

#[cfg(unix)]
async fn connect_unix(path: &std::path::Path) -> bool {
    tokio::net::UnixStream::connect(path).await.is_ok()
}

#[cfg(not(unix))]
async fn connect_unix(_path: &std::path::Path) -> bool {
    false
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
