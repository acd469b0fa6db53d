//! Whole runs assembled from the parts: workers as tokio tasks over
//! in-process links, or the coordinator on its own.

use std::sync::Arc;

use mandelfarm_core::Orientation;
use mandelfarm_relay::{local_cluster, LocalCoordinatorLink};
use tracing::{info, warn};

use crate::error::ClusterError;
use crate::kernel::RowKernel;
use crate::scheduler::{Roster, RunOutput, Scheduler};
use crate::worker::{WorkerLoop, WorkerReport};

/// Result of an in-process run.
#[derive(Debug)]
pub struct LocalRun {
    pub output: RunOutput,
    pub workers: Vec<WorkerReport>,
}

/// Run the coordinator alone: every row is computed on this process.
pub async fn run_single<K: RowKernel>(
    kernel: Arc<K>,
    orientation: Orientation,
    threads: usize,
) -> Result<RunOutput, ClusterError> {
    let (link, _) = local_cluster(0);
    Scheduler::<LocalCoordinatorLink, K>::new(link, kernel, Roster::default(), orientation)?
        .with_local_threads(threads)
        .run()
        .await
}

/// Run `workers` workers as tasks talking to the scheduler over channels.
pub async fn run_local<K: RowKernel>(
    kernel: Arc<K>,
    workers: usize,
    orientation: Orientation,
) -> Result<LocalRun, ClusterError> {
    let (coordinator, links) = local_cluster(workers);

    let handles: Vec<_> = links
        .into_iter()
        .enumerate()
        .map(|(i, link)| {
            let mut worker = WorkerLoop::new(link, Arc::clone(&kernel), format!("worker-{i}"));
            tokio::spawn(async move { worker.run().await })
        })
        .collect();

    let roster = Roster::gather(&coordinator, workers, None).await?;
    let output = Scheduler::new(coordinator, kernel, roster, orientation)?
        .run()
        .await;

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(e)) => warn!(error = %e, "worker failed"),
            Err(e) => return Err(ClusterError::Kernel(format!("worker task panicked: {e}"))),
        }
    }
    let output = output?;
    info!(workers = reports.len(), "local farm finished");
    Ok(LocalRun {
        output,
        workers: reports,
    })
}
