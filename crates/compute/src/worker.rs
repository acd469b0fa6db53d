//! Worker side of the protocol.

use std::sync::Arc;

use mandelfarm_relay::{topics, AssignRow, Assignment, Join, Message, RowResult, WorkerLink};
use tracing::{debug, info};

use crate::error::ClusterError;
use crate::kernel::RowKernel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitingAssignment,
    Computing(u32),
    Reporting(u32),
    Done,
}

/// What a worker did before it was told to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub name: String,
    /// Rows computed, in the order they were assigned.
    pub rows: Vec<u32>,
}

/// Receive a row, compute it, send it back; repeat until the sentinel.
///
/// The worker never asks for work. After announcing itself with a
/// [`Join`] it only reacts to assignments.
pub struct WorkerLoop<L, K> {
    link: L,
    kernel: Arc<K>,
    name: String,
    state: WorkerState,
}

impl<L: WorkerLink, K: RowKernel> WorkerLoop<L, K> {
    pub fn new(link: L, kernel: Arc<K>, name: impl Into<String>) -> Self {
        Self {
            link,
            kernel,
            name: name.into(),
            state: WorkerState::AwaitingAssignment,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join, then serve assignments until terminated.
    pub async fn run(&mut self) -> Result<WorkerReport, ClusterError> {
        let join = Join {
            worker: self.name.clone(),
        };
        self.link.send(Message::new(topics::WORKER_JOIN, &join)?).await?;
        info!(worker = %self.name, "joined, waiting for rows");

        let mut rows = Vec::new();
        loop {
            self.state = WorkerState::AwaitingAssignment;
            let assignment = self.link.recv().await?;
            let row = match assignment.decode_as::<AssignRow>(topics::ROW_ASSIGN)?.assignment() {
                Assignment::Row(row) => row,
                Assignment::Terminate => break,
            };
            if row >= self.kernel.rows() {
                return Err(ClusterError::RowOutOfRange {
                    row,
                    rows: self.kernel.rows(),
                });
            }

            self.state = WorkerState::Computing(row);
            let kernel = Arc::clone(&self.kernel);
            let counts = tokio::task::spawn_blocking(move || kernel.compute_row(row))
                .await
                .map_err(|e| ClusterError::Kernel(e.to_string()))?;

            self.state = WorkerState::Reporting(row);
            let reply = assignment.reply(topics::ROW_RESULT, &RowResult { row, counts })?;
            self.link.send(reply).await?;
            rows.push(row);
            debug!(worker = %self.name, row, "row reported");
        }

        self.state = WorkerState::Done;
        info!(worker = %self.name, rows = rows.len(), "terminated");
        Ok(WorkerReport {
            name: self.name.clone(),
            rows,
        })
    }
}
