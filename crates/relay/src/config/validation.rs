use super::types::RelayConfig;
use crate::error::RelayError;

/// More workers than this is a typo, not a cluster.
const MAX_WORKERS: u32 = 4096;

impl RelayConfig {
    /// Validate the config: endpoint syntax, worker count, launcher binaries.
    pub fn validate(&self) -> Result<(), RelayError> {
        self.coordinator_transport()?;
        self.validate_worker_count()?;
        self.validate_launcher()?;
        Ok(())
    }

    fn validate_worker_count(&self) -> Result<(), RelayError> {
        if self.cluster.workers > MAX_WORKERS {
            return Err(RelayError::Config(format!(
                "cluster.workers = {} exceeds the limit of {MAX_WORKERS}",
                self.cluster.workers
            )));
        }
        Ok(())
    }

    fn validate_launcher(&self) -> Result<(), RelayError> {
        for (field, value) in [
            ("coordinator_binary", &self.launcher.coordinator_binary),
            ("worker_binary", &self.launcher.worker_binary),
        ] {
            if value.trim().is_empty() {
                return Err(RelayError::Config(format!("launcher.{field} must not be empty")));
            }
        }
        Ok(())
    }
}
