//! Shared vocabulary for the mandelfarm workspace.
//!
//! - **`geometry`**: the immutable `{W, H, K}` grid description and the
//!   pixel -> complex-plane mapping every participant agrees on.
//! - **`config`**: render settings read from the environment (`.env` aware,
//!   profile prefixed).
//! - **`error`**: the error type for startup validation.

pub mod config;
pub mod error;
pub mod geometry;

pub use config::Config;
pub use error::*;
pub use geometry::{Geometry, Orientation};
