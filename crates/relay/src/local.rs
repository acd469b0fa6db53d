//! In-process links over tokio channels.
//!
//! Same contract as the ZeroMQ endpoints, without sockets: used to run
//! workers as tasks inside the coordinator process and throughout the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::RelayError;
use crate::message::Message;
use crate::traits::{CoordinatorLink, PeerId, WorkerLink};

/// Per-direction channel capacity. The protocol keeps at most one message
/// in flight per worker and direction, so this never fills up in practice.
const LOCAL_CHANNEL_CAPACITY: usize = 64;

pub struct LocalCoordinatorLink {
    inbound: Mutex<mpsc::Receiver<(PeerId, Message)>>,
    outbound: HashMap<PeerId, mpsc::Sender<Message>>,
}

pub struct LocalWorkerLink {
    peer: PeerId,
    to_coordinator: mpsc::Sender<(PeerId, Message)>,
    inbound: Mutex<mpsc::Receiver<Message>>,
}

impl LocalWorkerLink {
    /// The identity the coordinator sees for this worker.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }
}

/// Build a coordinator link and `workers` worker links wired to it.
///
/// Worker `i` is known to the coordinator as `local-<i>`.
pub fn local_cluster(workers: usize) -> (LocalCoordinatorLink, Vec<LocalWorkerLink>) {
    let (to_coordinator, inbound) = mpsc::channel(LOCAL_CHANNEL_CAPACITY);
    let mut outbound = HashMap::with_capacity(workers);
    let mut links = Vec::with_capacity(workers);

    for i in 0..workers {
        let peer = PeerId::new(format!("local-{i}"));
        let (tx, rx) = mpsc::channel(LOCAL_CHANNEL_CAPACITY);
        outbound.insert(peer.clone(), tx);
        links.push(LocalWorkerLink {
            peer,
            to_coordinator: to_coordinator.clone(),
            inbound: Mutex::new(rx),
        });
    }

    let coordinator = LocalCoordinatorLink {
        inbound: Mutex::new(inbound),
        outbound,
    };
    (coordinator, links)
}

#[async_trait]
impl CoordinatorLink for LocalCoordinatorLink {
    async fn recv_any(&self) -> Result<(PeerId, Message), RelayError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| RelayError::Closed("every worker link was dropped".into()))
    }

    async fn send_to(&self, peer: &PeerId, message: Message) -> Result<(), RelayError> {
        let tx = self
            .outbound
            .get(peer)
            .ok_or_else(|| RelayError::Transport(format!("no local worker named {peer}")))?;
        tx.send(message)
            .await
            .map_err(|_| RelayError::Closed(format!("worker {peer} hung up")))
    }
}

#[async_trait]
impl WorkerLink for LocalWorkerLink {
    async fn send(&self, message: Message) -> Result<(), RelayError> {
        self.to_coordinator
            .send((self.peer.clone(), message))
            .await
            .map_err(|_| RelayError::Closed("coordinator hung up".into()))
    }

    async fn recv(&self) -> Result<Message, RelayError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| RelayError::Closed("coordinator hung up".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_flow_both_ways() {
        let (coordinator, workers) = local_cluster(2);

        workers[1]
            .send(Message::new("farm.worker.join", &"second".to_string()).unwrap())
            .await
            .unwrap();
        let (peer, msg) = coordinator.recv_any().await.unwrap();
        assert_eq!(peer, *workers[1].peer());
        assert_eq!(msg.decode::<String>().unwrap(), "second");

        coordinator
            .send_to(&peer, Message::new("farm.row.assign", &4i32).unwrap())
            .await
            .unwrap();
        assert_eq!(workers[1].recv().await.unwrap().decode::<i32>().unwrap(), 4);
    }

    #[tokio::test]
    async fn unknown_peer_is_an_error() {
        let (coordinator, _workers) = local_cluster(1);
        let msg = Message::new("farm.row.assign", &0i32).unwrap();
        assert!(coordinator.send_to(&PeerId::new("nobody"), msg).await.is_err());
    }

    #[tokio::test]
    async fn dropping_all_workers_closes_the_coordinator() {
        let (coordinator, workers) = local_cluster(3);
        drop(workers);
        assert!(matches!(
            coordinator.recv_any().await,
            Err(RelayError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn dropping_the_coordinator_closes_workers() {
        let (coordinator, workers) = local_cluster(1);
        drop(coordinator);
        assert!(matches!(workers[0].recv().await, Err(RelayError::Closed(_))));
    }
}
