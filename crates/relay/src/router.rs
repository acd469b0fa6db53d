//! Coordinator endpoint over a ZeroMQ ROUTER socket.
//!
//! ## Framing (zeromq-rs 0.4)
//!
//! zeromq-rs ROUTER pushes the peer identity as the first frame on recv and
//! pops it on send. DEALER sends and receives raw application frames, so:
//! - DEALER sends: `[topic, envelope]`
//! - ROUTER receives: `[identity, topic, envelope]`
//! - ROUTER sends: `[identity, topic, envelope]`
//! - DEALER receives: `[topic, envelope]`

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{RouterSocket, ZmqMessage};

use crate::error::RelayError;
use crate::message::Message;
use crate::traits::{CoordinatorLink, PeerId};
use crate::transport::Transport;

/// Split `[topic, envelope]` (possibly preceded by empty delimiter frames)
/// and decode the envelope.
pub(crate) fn decode_frames<'a, I>(frames: I) -> Result<Message, RelayError>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let data: Vec<&[u8]> = frames.into_iter().skip_while(|f| f.is_empty()).collect();
    if data.len() < 2 {
        return Err(RelayError::Transport(format!(
            "expected [topic, envelope], got {} data frames",
            data.len()
        )));
    }
    let message = Message::from_bytes(data[1])?;
    if message.topic.as_bytes() != data[0] {
        return Err(RelayError::Transport(format!(
            "topic frame does not match envelope topic '{}'",
            message.topic
        )));
    }
    Ok(message)
}

/// Binds a ROUTER socket that every worker's DEALER connects to.
///
/// The socket sits behind a mutex; the scheduler drives it from a single
/// task, alternating receives and sends, so the lock is never contended.
pub struct ZmqCoordinatorLink {
    socket: Mutex<RouterSocket>,
}

impl ZmqCoordinatorLink {
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, RelayError> {
        transport.prepare_bind()?;
        let mut socket = RouterSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding ROUTER socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl CoordinatorLink for ZmqCoordinatorLink {
    async fn recv_any(&self) -> Result<(PeerId, Message), RelayError> {
        let zmq_msg = {
            let mut socket = self.socket.lock().await;
            socket.recv().await?
        };

        let frames: Vec<&[u8]> = zmq_msg.iter().map(|f| f.as_ref()).collect();
        let Some((identity, rest)) = frames.split_first() else {
            return Err(RelayError::Transport("empty ROUTER message".into()));
        };
        let peer = PeerId::new(identity.to_vec());
        let message = decode_frames(rest.iter().copied())?;

        debug!(peer = %peer, topic = %message.topic, "received");
        Ok((peer, message))
    }

    async fn send_to(&self, peer: &PeerId, message: Message) -> Result<(), RelayError> {
        let envelope = message.to_bytes()?;
        let mut zmq_msg = ZmqMessage::from(peer.as_bytes().to_vec());
        zmq_msg.push_back(message.topic.as_bytes().to_vec().into());
        zmq_msg.push_back(envelope.into());

        let mut socket = self.socket.lock().await;
        socket.send(zmq_msg).await?;
        debug!(peer = %peer, topic = %message.topic, "sent");
        Ok(())
    }
}
