//! Point-to-point messaging between one coordinator and its workers.
//!
//! The protocol layer only sees [`CoordinatorLink`] and [`WorkerLink`];
//! behind them sit either ZeroMQ sockets (ROUTER on the coordinator,
//! DEALER on each worker) or in-process channels.

pub mod config;
pub mod dealer;
pub mod error;
pub mod local;
pub mod message;
pub mod messages;
pub mod router;
pub mod traits;
pub mod transport;

pub use config::{ClusterConfig, CoordinatorConfig, LauncherConfig, RelayConfig};
pub use dealer::ZmqWorkerLink;
pub use error::RelayError;
pub use local::{local_cluster, LocalCoordinatorLink, LocalWorkerLink};
pub use message::Message;
pub use messages::topics;
pub use messages::{AssignRow, Assignment, Join, RowResult, MAX_ROWS, TERMINATE_SENTINEL};
pub use router::ZmqCoordinatorLink;
pub use traits::{CoordinatorLink, PeerId, WorkerLink};
pub use transport::Transport;
