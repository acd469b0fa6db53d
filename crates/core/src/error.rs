use thiserror::Error;

/// Startup errors: a grid or setting that cannot be used.
#[derive(Error, Debug)]
pub enum FarmError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("config error: {0}")]
    Config(String),
}
