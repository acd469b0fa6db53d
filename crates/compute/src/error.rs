use mandelfarm_relay::{PeerId, RelayError};

/// Error type for a farm run.
///
/// Every protocol violation aborts the run; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("row {row} was already completed (result from {peer})")]
    DuplicateRow { row: u32, peer: PeerId },

    #[error("row {row} is not assigned to {peer}")]
    UnassignedRow { row: u32, peer: PeerId },

    #[error("message from unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("malformed result for row {row}: {reason}")]
    MalformedRow { row: u32, reason: String },

    #[error("{peer} already holds row {current}, cannot assign row {row}")]
    AlreadyAssigned { peer: PeerId, current: u32, row: u32 },

    #[error("{peer} was terminated, cannot assign row {row}")]
    AssignAfterTerminate { peer: PeerId, row: u32 },

    #[error("refusing to terminate {peer} while row {row} is outstanding")]
    TerminateWhileAssigned { peer: PeerId, row: u32 },

    #[error("peer {0} joined twice")]
    DuplicateJoin(PeerId),

    #[error("unexpected '{topic}' from {peer} during {phase}")]
    UnexpectedMessage {
        peer: PeerId,
        topic: String,
        phase: &'static str,
    },

    #[error("only {joined} of {expected} workers joined before the timeout")]
    JoinTimeout { joined: usize, expected: usize },

    #[error("row {row} is outside the grid of {rows} rows")]
    RowOutOfRange { row: u32, rows: u32 },

    #[error("{0} rows cannot be addressed by an assignment")]
    TooManyRows(u32),

    #[error("run ended with {completed} of {rows} rows completed")]
    Incomplete { completed: u32, rows: u32 },

    #[error("kernel task failed: {0}")]
    Kernel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
