//! `relay.toml`: where the coordinator listens and how many workers join it.

mod loading;
mod types;
mod validation;


pub use types::*;
