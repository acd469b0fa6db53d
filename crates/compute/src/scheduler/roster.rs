//! Join handshake: the coordinator learns who its workers are.

use std::time::Duration;

use mandelfarm_relay::{topics, CoordinatorLink, Join, PeerId};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ClusterError;

/// A worker that completed the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub peer: PeerId,
    pub name: String,
}

/// The fixed participant list for one run, in join order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    /// Wait for `expected` distinct workers to send [`Join`].
    ///
    /// Anything other than a join during this phase, or a second join from
    /// the same peer, aborts. With `timeout` set, fails if the roster is not
    /// full by then; otherwise waits indefinitely.
    pub async fn gather<L: CoordinatorLink + ?Sized>(
        link: &L,
        expected: usize,
        timeout: Option<Duration>,
    ) -> Result<Self, ClusterError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut roster = Self::default();
        info!(expected, ?timeout, "waiting for workers to join");

        while roster.members.len() < expected {
            let received = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, link.recv_any())
                    .await
                    .map_err(|_| ClusterError::JoinTimeout {
                        joined: roster.members.len(),
                        expected,
                    })?,
                None => link.recv_any().await,
            };
            let (peer, message) = received?;

            if message.topic != topics::WORKER_JOIN {
                return Err(ClusterError::UnexpectedMessage {
                    peer,
                    topic: message.topic,
                    phase: "join",
                });
            }
            let join: Join = message.decode()?;
            roster.admit(peer, join.worker)?;
            debug!(joined = roster.members.len(), expected, "join accepted");
        }

        info!(workers = roster.members.len(), "roster complete");
        Ok(roster)
    }

    /// Add a member directly.
    pub fn admit(&mut self, peer: PeerId, name: String) -> Result<(), ClusterError> {
        if self.members.iter().any(|m| m.peer == peer) {
            return Err(ClusterError::DuplicateJoin(peer));
        }
        info!(peer = %peer, worker = %name, "worker joined");
        self.members.push(Member { peer, name });
        Ok(())
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.members.iter().map(|m| &m.peer)
    }

    pub fn name_of(&self, peer: &PeerId) -> Option<&str> {
        self.members
            .iter()
            .find(|m| &m.peer == peer)
            .map(|m| m.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
