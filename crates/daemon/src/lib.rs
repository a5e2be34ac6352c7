#![forbid(unsafe_code)]

//! Desktop bridge worker: inbound dispatch, output watcher and the HTTP front end.

pub mod adapters;
pub mod bridge;
pub mod commands;
pub mod dispatcher;
pub mod http;
pub mod inbound;
pub mod relay;
pub mod store;
pub mod watcher;

pub use bridge::{Adapters, Bridge, Stats};
pub use watcher::{spawn_watcher, stop_watcher_on, CycleOutcome};
