use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RelayError;

/// Envelope version written by this build.
pub const ENVELOPE_VERSION: u16 = 1;

/// Wire-format envelope for every message exchanged between participants.
///
/// The envelope and its payload are both MessagePack encoded. `topic` names
/// the payload type so a receiver can reject traffic it does not expect,
/// and `correlation_id` ties a reply to the message that caused it. Neither
/// replaces the identifiers a payload carries itself: a row result always
/// names its row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Payload type, one of the constants in [`crate::topics`].
    pub topic: String,

    /// MessagePack-encoded payload bytes.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,

    /// When this message was created by its sender.
    pub sent_at: DateTime<Utc>,

    /// Shared by a message and every reply to it.
    pub correlation_id: Uuid,

    #[serde(default = "default_version")]
    pub version: u16,
}

fn default_version() -> u16 {
    ENVELOPE_VERSION
}

impl Message {
    /// Create a new message with a fresh correlation id.
    pub fn new<T: Serialize>(topic: impl Into<String>, payload: &T) -> Result<Self, RelayError> {
        Self::with_correlation(topic, payload, Uuid::new_v4())
    }

    /// Create a message with an explicit correlation id.
    pub fn with_correlation<T: Serialize>(
        topic: impl Into<String>,
        payload: &T,
        correlation_id: Uuid,
    ) -> Result<Self, RelayError> {
        Ok(Self {
            topic: topic.into(),
            payload: rmp_serde::to_vec(payload)?,
            sent_at: Utc::now(),
            correlation_id,
            version: ENVELOPE_VERSION,
        })
    }

    /// Build a reply that shares this message's correlation id.
    pub fn reply<T: Serialize>(&self, topic: impl Into<String>, payload: &T) -> Result<Self, RelayError> {
        Self::with_correlation(topic, payload, self.correlation_id)
    }

    /// Deserialize the payload into the expected type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, RelayError> {
        Ok(rmp_serde::from_slice(&self.payload)?)
    }

    /// Check the topic, then deserialize the payload.
    pub fn decode_as<T: for<'de> Deserialize<'de>>(&self, topic: &str) -> Result<T, RelayError> {
        if self.topic != topic {
            return Err(RelayError::UnexpectedTopic {
                expected: topic.to_string(),
                actual: self.topic.clone(),
            });
        }
        self.decode()
    }

    /// Serialize this entire envelope to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RelayError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    /// Deserialize an envelope from MessagePack bytes, rejecting newer versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RelayError> {
        let message: Self = rmp_serde::from_slice(bytes)?;
        if message.version > ENVELOPE_VERSION {
            return Err(RelayError::UnsupportedVersion(message.version));
        }
        Ok(message)
    }
}

/// Helper module for serde to handle `Vec<u8>` as raw bytes in MessagePack.
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_survives_bytes() {
        let msg = Message::new("farm.row.assign", &7i32).unwrap();
        let decoded = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded.topic, "farm.row.assign");
        assert_eq!(decoded.correlation_id, msg.correlation_id);
        assert_eq!(decoded.decode::<i32>().unwrap(), 7);
    }

    #[test]
    fn reply_keeps_correlation_id() {
        let request = Message::new("farm.row.assign", &3i32).unwrap();
        let reply = request.reply("farm.row.result", &vec![1u32, 2, 3]).unwrap();
        assert_eq!(reply.correlation_id, request.correlation_id);
        assert_eq!(reply.topic, "farm.row.result");
    }

    #[test]
    fn decode_as_rejects_wrong_topic() {
        let msg = Message::new("farm.worker.join", &"w1".to_string()).unwrap();
        match msg.decode_as::<String>("farm.row.result") {
            Err(RelayError::UnexpectedTopic { expected, actual }) => {
                assert_eq!(expected, "farm.row.result");
                assert_eq!(actual, "farm.worker.join");
            }
            other => panic!("expected UnexpectedTopic, got {other:?}"),
        }
    }

    #[test]
    fn newer_envelope_versions_are_rejected() {
        let mut msg = Message::new("farm.row.assign", &0i32).unwrap();
        msg.version = ENVELOPE_VERSION + 1;
        let bytes = msg.to_bytes().unwrap();
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(RelayError::UnsupportedVersion(v)) if v == ENVELOPE_VERSION + 1
        ));
    }
}
