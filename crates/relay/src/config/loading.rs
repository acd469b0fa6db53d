use std::path::Path;
use std::time::Duration;

use crate::error::RelayError;
use crate::transport::Transport;

use super::types::{ClusterConfig, CoordinatorConfig, LauncherConfig, RelayConfig};

impl RelayConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RelayError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Single-host defaults: IPC socket, no remote workers.
    pub fn local() -> Self {
        Self::default()
    }

    /// Coordinator listening on TCP for `workers` remote workers.
    pub fn distributed(host: &str, port: u16, workers: u32) -> Self {
        Self {
            coordinator: CoordinatorConfig {
                endpoint: format!("tcp://{host}:{port}"),
                join_timeout_secs: 0,
            },
            cluster: ClusterConfig { workers },
            launcher: LauncherConfig::default(),
        }
    }

    /// Resolve the coordinator endpoint.
    pub fn coordinator_transport(&self) -> Result<Transport, RelayError> {
        Transport::parse(&self.coordinator.endpoint)
    }

    /// Join deadline, `None` when unbounded.
    pub fn join_timeout(&self) -> Option<Duration> {
        match self.coordinator.join_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `RELAY_SECTION_KEY` overrides `section.key`:
    /// - `RELAY_COORDINATOR_ENDPOINT` -> `coordinator.endpoint`
    /// - `RELAY_COORDINATOR_JOIN_TIMEOUT_SECS` -> `coordinator.join_timeout_secs`
    /// - `RELAY_CLUSTER_WORKERS` -> `cluster.workers`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(v) = lookup("RELAY_COORDINATOR_ENDPOINT") {
            self.coordinator.endpoint = v;
        }
        if let Some(v) = lookup("RELAY_COORDINATOR_JOIN_TIMEOUT_SECS") {
            match v.parse() {
                Ok(secs) => self.coordinator.join_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid RELAY_COORDINATOR_JOIN_TIMEOUT_SECS"),
            }
        }
        if let Some(v) = lookup("RELAY_CLUSTER_WORKERS") {
            match v.parse() {
                Ok(workers) => self.cluster.workers = workers,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid RELAY_CLUSTER_WORKERS"),
            }
        }
    }
}
