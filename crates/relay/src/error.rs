use thiserror::Error;

/// Errors that can occur in the relay messaging layer.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("link closed: {0}")]
    Closed(String),

    #[error("unexpected topic: expected '{expected}', got '{actual}'")]
    UnexpectedTopic { expected: String, actual: String },

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u16),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
