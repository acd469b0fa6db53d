//! Worker endpoint over a ZeroMQ DEALER socket.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{DealerSocket, ZmqMessage};

use crate::error::RelayError;
use crate::message::Message;
use crate::router::decode_frames;
use crate::traits::WorkerLink;
use crate::transport::Transport;

/// Connects a DEALER socket to the coordinator's ROUTER.
///
/// A worker strictly alternates one receive and one send, so a single
/// mutex around the socket is enough.
pub struct ZmqWorkerLink {
    socket: Mutex<DealerSocket>,
}

impl ZmqWorkerLink {
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, RelayError> {
        let mut socket = DealerSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting DEALER socket");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl WorkerLink for ZmqWorkerLink {
    async fn send(&self, message: Message) -> Result<(), RelayError> {
        let envelope = message.to_bytes()?;
        let mut zmq_msg = ZmqMessage::from(message.topic.as_str());
        zmq_msg.push_back(envelope.into());

        let mut socket = self.socket.lock().await;
        socket.send(zmq_msg).await?;
        debug!(topic = %message.topic, "sent to coordinator");
        Ok(())
    }

    async fn recv(&self) -> Result<Message, RelayError> {
        let zmq_msg = {
            let mut socket = self.socket.lock().await;
            socket.recv().await?
        };
        let frames: Vec<&[u8]> = zmq_msg.iter().map(|f| f.as_ref()).collect();
        let message = decode_frames(frames)?;
        debug!(topic = %message.topic, "received from coordinator");
        Ok(message)
    }
}
