//! Command implementations for the CLI
//!
//! - start: run the HTTP server
//! - monitor: run one uptime probe cycle
//! - config: configuration display and validation

pub mod config;
pub mod monitor;
pub mod start;
