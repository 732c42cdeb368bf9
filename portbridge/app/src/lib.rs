//! Demo host wiring composite proxies to a loopback foreign runtime.

pub mod config;
pub mod demo;

pub use config::{load_config, BridgeConfig};
