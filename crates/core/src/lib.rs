#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared models and pure coordination logic for the desktop bridge.

pub mod api;
pub mod auth;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod loop_guard;
pub mod model;
pub mod payload;
pub mod supervisor;

mod util;

pub use error::BridgeError;
pub use util::{now_ms, unix_secs};
