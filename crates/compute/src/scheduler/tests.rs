use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mandelfarm_core::{Geometry, Orientation};
use mandelfarm_relay::{
    local_cluster, topics, AssignRow, Assignment, CoordinatorLink, Join, LocalCoordinatorLink,
    LocalWorkerLink, Message, PeerId, RelayError, RowResult, WorkerLink,
};

use super::*;
use crate::error::ClusterError;
use crate::kernel::{EscapeTimeKernel, RowKernel};
use crate::worker::WorkerLoop;

/// Row `r` is `width` copies of `r`.
struct StubKernel {
    rows: u32,
    width: u32,
}

impl RowKernel for StubKernel {
    fn rows(&self) -> u32 {
        self.rows
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn max_value(&self) -> u32 {
        self.rows
    }

    fn compute_row(&self, row: u32) -> Vec<u32> {
        vec![row; self.width as usize]
    }
}

type SentLog = Arc<Mutex<Vec<(PeerId, Assignment)>>>;

/// Passes traffic through and keeps every assignment the scheduler sends.
struct RecordingLink {
    inner: LocalCoordinatorLink,
    sent: SentLog,
}

#[async_trait]
impl CoordinatorLink for RecordingLink {
    async fn recv_any(&self) -> Result<(PeerId, Message), RelayError> {
        self.inner.recv_any().await
    }

    async fn send_to(&self, peer: &PeerId, message: Message) -> Result<(), RelayError> {
        let assign: AssignRow = message.decode_as(topics::ROW_ASSIGN)?;
        self.sent
            .lock()
            .unwrap()
            .push((peer.clone(), assign.assignment()));
        self.inner.send_to(peer, message).await
    }
}

/// Fails the test if the scheduler touches it.
struct SilentLink;

#[async_trait]
impl CoordinatorLink for SilentLink {
    async fn recv_any(&self) -> Result<(PeerId, Message), RelayError> {
        panic!("single-participant run received a message");
    }

    async fn send_to(&self, _peer: &PeerId, _message: Message) -> Result<(), RelayError> {
        panic!("single-participant run sent a message");
    }
}

fn join_message(name: &str) -> Message {
    Message::new(
        topics::WORKER_JOIN,
        &Join {
            worker: name.to_string(),
        },
    )
    .unwrap()
}

/// Spawn real workers over a recording link and run the scheduler.
async fn run_recorded<K: RowKernel>(
    kernel: Arc<K>,
    workers: usize,
) -> (Result<RunOutput, ClusterError>, Vec<(PeerId, Assignment)>) {
    let (coordinator, links) = local_cluster(workers);
    let handles: Vec<_> = links
        .into_iter()
        .enumerate()
        .map(|(i, link)| {
            let mut w = WorkerLoop::new(link, Arc::clone(&kernel), format!("w{i}"));
            tokio::spawn(async move { w.run().await })
        })
        .collect();

    let roster = Roster::gather(&coordinator, workers, None).await.unwrap();
    let sent = SentLog::default();
    let link = RecordingLink {
        inner: coordinator,
        sent: Arc::clone(&sent),
    };
    let output = Scheduler::new(link, kernel, roster, Orientation::TopDown)
        .unwrap()
        .run()
        .await;
    for h in handles {
        let _ = h.await.unwrap();
    }
    let log = sent.lock().unwrap().clone();
    (output, log)
}

/// Start a scheduler over `links.len()` hand-driven workers that have
/// already joined.
async fn spawn_with_rogues<K: RowKernel>(
    kernel: Arc<K>,
    workers: usize,
) -> (
    tokio::task::JoinHandle<Result<RunOutput, ClusterError>>,
    Vec<LocalWorkerLink>,
) {
    let (coordinator, links) = local_cluster(workers);
    for (i, link) in links.iter().enumerate() {
        link.send(join_message(&format!("rogue-{i}"))).await.unwrap();
    }
    let roster = Roster::gather(&coordinator, workers, None).await.unwrap();
    let handle = tokio::spawn(async move {
        Scheduler::new(coordinator, kernel, roster, Orientation::TopDown)?
            .run()
            .await
    });
    (handle, links)
}

async fn next_assignment(link: &LocalWorkerLink) -> (Message, Assignment) {
    let msg = link.recv().await.unwrap();
    let assignment = msg
        .decode_as::<AssignRow>(topics::ROW_ASSIGN)
        .unwrap()
        .assignment();
    (msg, assignment)
}

fn result_message(row: u32, counts: Vec<u32>) -> Message {
    Message::new(topics::ROW_RESULT, &RowResult { row, counts }).unwrap()
}

#[tokio::test]
async fn single_worker_small_grid() {
    let kernel = Arc::new(EscapeTimeKernel::new(Geometry::new(4, 3, 50).unwrap()));
    let (output, sent) = run_recorded(Arc::clone(&kernel), 1).await;
    let output = output.unwrap();

    let order: Vec<_> = sent.iter().map(|(_, a)| *a).collect();
    assert_eq!(
        order,
        vec![
            Assignment::Row(0),
            Assignment::Row(1),
            Assignment::Row(2),
            Assignment::Terminate
        ]
    );
    assert_eq!(output.cells.len(), 12);
    assert!(output.cells.iter().all(|&v| v <= 50));
    assert_eq!(output.metrics.assignment_order, vec![0, 1, 2]);
    assert_eq!(output.metrics.results_per_worker["w0"], 3);
}

#[tokio::test]
async fn one_row_grid_gets_one_assignment() {
    let kernel = Arc::new(StubKernel { rows: 1, width: 5 });
    let (output, sent) = run_recorded(kernel, 1).await;
    let output = output.unwrap();

    let order: Vec<_> = sent.iter().map(|(_, a)| *a).collect();
    assert_eq!(order, vec![Assignment::Row(0), Assignment::Terminate]);
    assert_eq!(output.cells, vec![0; 5]);
}

#[tokio::test]
async fn surplus_workers_are_terminated_at_once() {
    let kernel = Arc::new(StubKernel { rows: 2, width: 3 });
    let (output, sent) = run_recorded(kernel, 5).await;
    let output = output.unwrap();

    // Three workers get the sentinel before any result comes back.
    let initial: Vec<_> = sent.iter().take(5).map(|(_, a)| *a).collect();
    assert_eq!(
        initial.iter().filter(|a| **a == Assignment::Terminate).count(),
        3
    );
    assert_eq!(output.cells, vec![0, 0, 0, 1, 1, 1]);
    assert_eq!(output.metrics.terminated.len(), 5);
}

#[tokio::test]
async fn every_row_once_and_nothing_after_the_sentinel() {
    let kernel = Arc::new(StubKernel { rows: 40, width: 2 });
    let (output, sent) = run_recorded(kernel, 4).await;
    let output = output.unwrap();

    let rows: Vec<u32> = sent
        .iter()
        .filter_map(|(_, a)| match a {
            Assignment::Row(r) => Some(*r),
            Assignment::Terminate => None,
        })
        .collect();
    assert_eq!(rows, (0..40).collect::<Vec<_>>());

    for peer in sent.iter().map(|(p, _)| p) {
        let mine: Vec<_> = sent.iter().filter(|(p, _)| p == peer).map(|(_, a)| *a).collect();
        assert_eq!(mine.last(), Some(&Assignment::Terminate));
        assert_eq!(
            mine.iter().filter(|a| **a == Assignment::Terminate).count(),
            1,
            "{peer} terminated more than once"
        );
    }
    assert_eq!(output.metrics.rows_completed, 40);
    assert_eq!(output.metrics.results_per_worker.values().sum::<u64>(), 40);
}

#[tokio::test]
async fn single_participant_sends_nothing() {
    let kernel = Arc::new(EscapeTimeKernel::new(Geometry::new(16, 12, 64).unwrap()));
    let output = Scheduler::new(SilentLink, Arc::clone(&kernel), Roster::default(), Orientation::TopDown)
        .unwrap()
        .with_local_threads(2)
        .run()
        .await
        .unwrap();

    assert_eq!(output.metrics.mode, RunMode::SingleParticipant);
    for (row, chunk) in output.cells.chunks(16).enumerate() {
        assert_eq!(chunk, kernel.compute_row(row as u32).as_slice());
    }
}

#[tokio::test]
async fn duplicate_result_aborts() {
    let kernel = Arc::new(StubKernel { rows: 3, width: 2 });
    let (handle, links) = spawn_with_rogues(kernel, 1).await;

    let (_, first) = next_assignment(&links[0]).await;
    assert_eq!(first, Assignment::Row(0));
    links[0].send(result_message(0, vec![0, 0])).await.unwrap();
    let (_, second) = next_assignment(&links[0]).await;
    assert_eq!(second, Assignment::Row(1));
    links[0].send(result_message(0, vec![0, 0])).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(ClusterError::DuplicateRow { row: 0, .. })
    ));
}

#[tokio::test]
async fn result_for_another_workers_row_aborts() {
    let kernel = Arc::new(StubKernel { rows: 4, width: 1 });
    let (handle, links) = spawn_with_rogues(kernel, 2).await;

    next_assignment(&links[0]).await;
    let (_, other) = next_assignment(&links[1]).await;
    assert_eq!(other, Assignment::Row(1));
    // rogue-0 holds row 0 but reports row 1.
    links[0].send(result_message(1, vec![1])).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(ClusterError::UnassignedRow { row: 1, .. })
    ));
}

#[tokio::test]
async fn row_beyond_the_grid_aborts() {
    let kernel = Arc::new(StubKernel { rows: 2, width: 1 });
    let (handle, links) = spawn_with_rogues(kernel, 1).await;

    next_assignment(&links[0]).await;
    links[0].send(result_message(9, vec![0])).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(ClusterError::RowOutOfRange { row: 9, rows: 2 })
    ));
}

#[tokio::test]
async fn short_row_aborts() {
    let kernel = Arc::new(StubKernel { rows: 2, width: 3 });
    let (handle, links) = spawn_with_rogues(kernel, 1).await;

    next_assignment(&links[0]).await;
    links[0].send(result_message(0, vec![0, 0])).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(ClusterError::MalformedRow { row: 0, .. })
    ));
}

#[tokio::test]
async fn value_over_budget_aborts() {
    let kernel = Arc::new(StubKernel { rows: 2, width: 1 });
    let (handle, links) = spawn_with_rogues(kernel, 1).await;

    next_assignment(&links[0]).await;
    links[0].send(result_message(0, vec![3])).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(ClusterError::MalformedRow { row: 0, .. })
    ));
}

#[tokio::test]
async fn stranger_aborts() {
    let kernel = Arc::new(StubKernel { rows: 2, width: 1 });
    let (coordinator, links) = local_cluster(2);
    links[0].send(join_message("member")).await.unwrap();
    let roster = Roster::gather(&coordinator, 1, None).await.unwrap();
    let handle = tokio::spawn(async move {
        Scheduler::new(coordinator, kernel, roster, Orientation::TopDown)?
            .run()
            .await
    });

    next_assignment(&links[0]).await;
    links[1].send(result_message(1, vec![1])).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(ClusterError::UnknownPeer(_))
    ));
}

#[tokio::test]
async fn late_join_is_a_violation() {
    let kernel = Arc::new(StubKernel { rows: 2, width: 1 });
    let (handle, links) = spawn_with_rogues(kernel, 1).await;

    next_assignment(&links[0]).await;
    links[0].send(join_message("again")).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(ClusterError::UnexpectedMessage {
            phase: "scheduling",
            ..
        })
    ));
}

#[tokio::test]
async fn drain_accepts_results_out_of_order() {
    let kernel = Arc::new(StubKernel { rows: 2, width: 1 });
    let (handle, links) = spawn_with_rogues(kernel, 2).await;

    let (_, a) = next_assignment(&links[0]).await;
    let (_, b) = next_assignment(&links[1]).await;
    assert_eq!((a, b), (Assignment::Row(0), Assignment::Row(1)));

    // Later row first; the cursor is already exhausted.
    links[1].send(result_message(1, vec![1])).await.unwrap();
    links[0].send(result_message(0, vec![0])).await.unwrap();

    for link in &links {
        assert_eq!(next_assignment(link).await.1, Assignment::Terminate);
    }
    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.cells, vec![0, 1]);
}

#[test]
fn oversized_grid_is_rejected_up_front() {
    let kernel = Arc::new(StubKernel {
        rows: mandelfarm_relay::MAX_ROWS,
        width: 0,
    });
    let result = Scheduler::new(SilentLink, kernel, Roster::default(), Orientation::TopDown);
    assert!(matches!(result, Err(ClusterError::TooManyRows(_))));
}
