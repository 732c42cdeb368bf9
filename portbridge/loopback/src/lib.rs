//! An in-process foreign runtime that proxies talk to through a message queue.
//!
//! The runtime owns its implementations on a dedicated thread running its own
//! event loop. Blocking calls are posted and awaited; calls that may enter the
//! runtime directly run on the caller's thread.

mod implementation;
mod runtime;

pub use implementation::{ForeignCall, ForeignImplementation};
pub use runtime::LoopbackRuntime;

/// Errors specific to the loopback runtime
#[derive(Debug, thiserror::Error)]
pub enum LoopbackError {
    #[error("Failed to start loopback runtime: {0}")]
    Start(#[from] std::io::Error),
}
