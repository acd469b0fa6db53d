use std::sync::Arc;
use std::time::Instant;

use mandelfarm_core::Orientation;
use mandelfarm_relay::{
    topics, AssignRow, CoordinatorLink, Message, PeerId, RowResult, MAX_ROWS,
};
use tracing::{debug, info};

use crate::assembler::ResultAssembler;
use crate::error::ClusterError;
use crate::kernel::{compute_all, RowKernel};

use super::metrics::{RunMode, SchedulerMetrics};
use super::progress::{CompletionSet, RowCursor};
use super::roster::Roster;
use super::slots::{AssignmentTable, SlotState};

/// Product of a finished run.
#[derive(Debug)]
pub struct RunOutput {
    /// Escape counts in raster order, orientation applied.
    pub cells: Vec<u32>,
    pub width: u32,
    pub rows: u32,
    pub max_value: u32,
    pub metrics: SchedulerMetrics,
}

/// Coordinator state for one run.
///
/// Hands out row 0, 1, 2, ... to the workers in roster order, then gives
/// each worker that reports a result the next row. Once every row is handed
/// out it waits for the outstanding results and finally sends the sentinel
/// to every worker. With an empty roster the coordinator computes every row
/// itself.
pub struct Scheduler<L, K> {
    link: L,
    kernel: Arc<K>,
    roster: Roster,
    table: AssignmentTable,
    cursor: RowCursor,
    completed: CompletionSet,
    assembler: ResultAssembler,
    metrics: SchedulerMetrics,
    local_threads: usize,
}

impl<L: CoordinatorLink, K: RowKernel> Scheduler<L, K> {
    pub fn new(
        link: L,
        kernel: Arc<K>,
        roster: Roster,
        orientation: Orientation,
    ) -> Result<Self, ClusterError> {
        let rows = kernel.rows();
        if rows >= MAX_ROWS {
            return Err(ClusterError::TooManyRows(rows));
        }
        let mode = if roster.is_empty() {
            RunMode::SingleParticipant
        } else {
            RunMode::Distributed
        };
        let assembler = ResultAssembler::new(kernel.width(), rows, orientation);
        Ok(Self {
            link,
            kernel,
            table: AssignmentTable::new(roster.peers().cloned()),
            cursor: RowCursor::new(rows),
            completed: CompletionSet::new(rows),
            assembler,
            metrics: SchedulerMetrics::new(mode, roster.len(), rows),
            roster,
            local_threads: 0,
        })
    }

    /// Thread count for the single-participant path; 0 means one per core.
    pub fn with_local_threads(mut self, threads: usize) -> Self {
        self.local_threads = threads;
        self
    }

    pub async fn run(mut self) -> Result<RunOutput, ClusterError> {
        let started = Instant::now();
        info!(
            workers = self.table.len(),
            rows = self.kernel.rows(),
            width = self.kernel.width(),
            "run started"
        );

        if self.table.is_empty() {
            self.compute_locally().await?;
        } else {
            self.assign_initial().await?;
            while !self.cursor.is_exhausted() {
                let peer = self.receive_result("scheduling").await?;
                self.assign_next(&peer).await?;
            }
            self.drain().await?;
            self.terminate_all().await?;
        }

        let elapsed = started.elapsed();
        self.metrics.finish(elapsed);
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            rows = self.metrics.rows_completed,
            "computation finished"
        );

        Ok(RunOutput {
            width: self.assembler.width(),
            rows: self.assembler.rows(),
            max_value: self.kernel.max_value(),
            cells: self.assembler.finish()?,
            metrics: self.metrics,
        })
    }

    /// One row per worker; workers beyond the row count are terminated
    /// straight away.
    async fn assign_initial(&mut self) -> Result<(), ClusterError> {
        let peers = self.table.peers().to_vec();
        for peer in &peers {
            if !self.assign_next(peer).await? {
                self.terminate(peer).await?;
            }
        }
        debug!(outstanding = self.table.outstanding(), "initial rows assigned");
        Ok(())
    }

    /// Give `peer` the next row if one is left. Returns whether it got one.
    async fn assign_next(&mut self, peer: &PeerId) -> Result<bool, ClusterError> {
        let Some(row) = self.cursor.advance() else {
            return Ok(false);
        };
        self.table.assign(peer, row)?;
        let message = Message::new(topics::ROW_ASSIGN, &AssignRow::row(row))?;
        self.link.send_to(peer, message).await?;
        self.metrics.record_assignment(row);
        debug!(peer = %peer, row, "row assigned");
        Ok(true)
    }

    /// Accept one result from any worker and file it under the row it names.
    async fn receive_result(&mut self, phase: &'static str) -> Result<PeerId, ClusterError> {
        let (peer, message) = self.link.recv_any().await?;
        if self.table.state(&peer).is_none() {
            return Err(ClusterError::UnknownPeer(peer));
        }
        if message.topic != topics::ROW_RESULT {
            return Err(ClusterError::UnexpectedMessage {
                peer,
                topic: message.topic,
                phase,
            });
        }
        let result: RowResult = message.decode()?;
        self.validate(&peer, &result)?;

        self.table.complete(&peer, result.row)?;
        self.completed.insert(result.row);
        self.assembler.write_row(result.row, &result.counts)?;

        let name = self.worker_name(&peer);
        self.metrics.record_result(&name);
        debug!(peer = %peer, row = result.row, "row received");
        Ok(peer)
    }

    fn validate(&self, peer: &PeerId, result: &RowResult) -> Result<(), ClusterError> {
        let row = result.row;
        if row >= self.kernel.rows() {
            return Err(ClusterError::RowOutOfRange {
                row,
                rows: self.kernel.rows(),
            });
        }
        if self.completed.contains(row) {
            return Err(ClusterError::DuplicateRow {
                row,
                peer: peer.clone(),
            });
        }
        if self.table.state(peer) != Some(SlotState::Assigned(row)) {
            return Err(ClusterError::UnassignedRow {
                row,
                peer: peer.clone(),
            });
        }
        if result.counts.len() != self.kernel.width() as usize {
            return Err(ClusterError::MalformedRow {
                row,
                reason: format!(
                    "expected {} values, got {}",
                    self.kernel.width(),
                    result.counts.len()
                ),
            });
        }
        let max = self.kernel.max_value();
        if let Some(bad) = result.counts.iter().find(|&&v| v > max) {
            return Err(ClusterError::MalformedRow {
                row,
                reason: format!("value {bad} exceeds the budget of {max}"),
            });
        }
        Ok(())
    }

    /// Collect every outstanding result. Nothing new is assigned.
    async fn drain(&mut self) -> Result<(), ClusterError> {
        debug!(outstanding = self.table.outstanding(), "draining");
        while !self.completed.is_full() {
            if self.table.outstanding() == 0 {
                return Err(ClusterError::Incomplete {
                    completed: self.completed.len(),
                    rows: self.kernel.rows(),
                });
            }
            self.receive_result("drain").await?;
        }
        Ok(())
    }

    async fn terminate_all(&mut self) -> Result<(), ClusterError> {
        let peers = self.table.peers().to_vec();
        for peer in &peers {
            self.terminate(peer).await?;
        }
        Ok(())
    }

    async fn terminate(&mut self, peer: &PeerId) -> Result<(), ClusterError> {
        if !self.table.terminate(peer)? {
            return Ok(());
        }
        let message = Message::new(topics::ROW_ASSIGN, &AssignRow::terminate())?;
        self.link.send_to(peer, message).await?;
        let name = self.worker_name(peer);
        self.metrics.record_termination(&name);
        debug!(peer = %peer, "termination sent");
        Ok(())
    }

    async fn compute_locally(&mut self) -> Result<(), ClusterError> {
        info!("no workers, computing every row on the coordinator");
        let kernel = Arc::clone(&self.kernel);
        let threads = self.local_threads;
        let cells = tokio::task::spawn_blocking(move || compute_all(kernel.as_ref(), threads))
            .await
            .map_err(|e| ClusterError::Kernel(e.to_string()))??;
        let width = self.kernel.width() as usize;
        if width == 0 {
            return Ok(());
        }
        for (row, values) in (0u32..).zip(cells.chunks(width)) {
            self.cursor.advance();
            self.metrics.record_assignment(row);
            self.completed.insert(row);
            self.assembler.write_row(row, values)?;
            self.metrics.record_result("coordinator");
        }
        Ok(())
    }

    fn worker_name(&self, peer: &PeerId) -> String {
        self.roster
            .name_of(peer)
            .map(str::to_string)
            .unwrap_or_else(|| peer.to_string())
    }
}
