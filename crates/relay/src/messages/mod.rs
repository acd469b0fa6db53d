//! Payload types for the row-farming protocol.
//!
//! - **`farm`**: the `Join`, `AssignRow` and `RowResult` payloads
//! - **`topics`**: canonical topic strings naming each payload on the wire

pub mod farm;
pub mod topics;

pub use farm::*;
