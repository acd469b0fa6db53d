use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Top-level config ────────────────────────────────────────────────

/// Network topology of one farm.
///
/// Parsed from `relay.toml` with `RELAY_*` environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Process layout used by `farm-launcher`.
    #[serde(default)]
    pub launcher: LauncherConfig,
}

// ── Section configs ─────────────────────────────────────────────────

/// Where the coordinator binds its ROUTER socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// `ipc://...` or `tcp://host:port`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Seconds to wait for every worker to join. 0 waits forever.
    #[serde(default)]
    pub join_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "ipc:///tmp/mandelfarm/coordinator.sock".into()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            join_timeout_secs: 0,
        }
    }
}

/// Participants besides the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterConfig {
    /// Number of remote workers the coordinator waits for. 0 renders locally.
    #[serde(default)]
    pub workers: u32,
}

/// Binaries spawned by `farm-launcher`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_coordinator_binary")]
    pub coordinator_binary: String,

    #[serde(default = "default_worker_binary")]
    pub worker_binary: String,

    /// Run binaries through `cargo run` instead of looking them up on `PATH`.
    #[serde(default = "default_use_cargo")]
    pub use_cargo: bool,

    /// Extra environment for every spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_coordinator_binary() -> String {
    "farm-coordinator".into()
}

fn default_worker_binary() -> String {
    "farm-worker".into()
}

fn default_use_cargo() -> bool {
    true
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            coordinator_binary: default_coordinator_binary(),
            worker_binary: default_worker_binary(),
            use_cargo: default_use_cargo(),
            env: HashMap::new(),
        }
    }
}
