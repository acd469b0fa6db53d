use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::message::Message;

/// Transport-level identity of a worker as seen by the coordinator.
///
/// For ZeroMQ this is the ROUTER routing identity; for in-process links it
/// is a generated name. It is only used to address the next message to a
/// peer, never to infer what a message is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(Vec<u8>);

impl PeerId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if s.chars().all(|c| c.is_ascii_graphic()) => f.write_str(s),
            _ => {
                for b in &self.0 {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Coordinator side of a point-to-point link with many workers.
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
    /// Receive the next message from any worker. Blocks until one arrives.
    async fn recv_any(&self) -> Result<(PeerId, Message), RelayError>;

    /// Send a message to one worker.
    async fn send_to(&self, peer: &PeerId, message: Message) -> Result<(), RelayError>;
}

#[async_trait]
impl<T: CoordinatorLink + ?Sized> CoordinatorLink for Arc<T> {
    async fn recv_any(&self) -> Result<(PeerId, Message), RelayError> {
        (**self).recv_any().await
    }

    async fn send_to(&self, peer: &PeerId, message: Message) -> Result<(), RelayError> {
        (**self).send_to(peer, message).await
    }
}

/// Worker side of the link: talks to the coordinator only.
#[async_trait]
pub trait WorkerLink: Send + Sync {
    /// Send a message to the coordinator.
    async fn send(&self, message: Message) -> Result<(), RelayError>;

    /// Receive the next message from the coordinator. Blocks until one arrives.
    async fn recv(&self) -> Result<Message, RelayError>;
}

#[async_trait]
impl<T: WorkerLink + ?Sized> WorkerLink for Arc<T> {
    async fn send(&self, message: Message) -> Result<(), RelayError> {
        (**self).send(message).await
    }

    async fn recv(&self) -> Result<Message, RelayError> {
        (**self).recv().await
    }
}
