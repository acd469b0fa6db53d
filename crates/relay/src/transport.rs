use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Directory holding IPC socket files.
pub const IPC_DIR: &str = "/tmp/mandelfarm";

/// Where a ZeroMQ socket binds or connects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "address")]
pub enum Transport {
    /// Unix domain socket named `<IPC_DIR>/<name>.sock`, for single-host runs.
    Ipc(String),

    /// TCP, for workers on other hosts.
    Tcp { host: String, port: u16 },
}

impl Transport {
    pub fn ipc(name: &str) -> Self {
        Self::Ipc(name.to_string())
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Parse `ipc:///tmp/mandelfarm/<name>.sock` or `tcp://host:port`.
    pub fn parse(endpoint: &str) -> Result<Self, RelayError> {
        if let Some(path) = endpoint.strip_prefix("ipc://") {
            let name = Path::new(path)
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| RelayError::Config(format!("ipc endpoint has no socket name: {endpoint}")))?;
            return Ok(Self::ipc(name));
        }
        if let Some(addr) = endpoint.strip_prefix("tcp://") {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| RelayError::Config(format!("tcp endpoint has no port: {endpoint}")))?;
            let port = port
                .parse()
                .map_err(|_| RelayError::Config(format!("invalid tcp port in {endpoint}")))?;
            if host.is_empty() {
                return Err(RelayError::Config(format!("tcp endpoint has no host: {endpoint}")));
            }
            return Ok(Self::tcp(host, port));
        }
        Err(RelayError::Config(format!(
            "unsupported endpoint '{endpoint}', expected ipc:// or tcp://"
        )))
    }

    /// The ZeroMQ endpoint address string.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Ipc(name) => format!("ipc://{IPC_DIR}/{name}.sock"),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }

    /// Filesystem path of an IPC socket; `None` for TCP.
    pub fn socket_path(&self) -> Option<PathBuf> {
        match self {
            Self::Ipc(name) => Some(Path::new(IPC_DIR).join(format!("{name}.sock"))),
            Self::Tcp { .. } => None,
        }
    }

    /// Make an IPC endpoint bindable: create its directory and remove a
    /// socket file left behind by a previous run. No-op for TCP.
    pub fn prepare_bind(&self) -> Result<(), RelayError> {
        let Some(path) = self.socket_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RelayError::Transport(format!("creating {}: {e}", parent.display())))?;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed stale IPC socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RelayError::Transport(format!(
                    "removing stale socket {}: {e}",
                    path.display()
                )))
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}
