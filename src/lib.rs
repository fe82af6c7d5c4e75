pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod logging;
pub mod monitor;
pub mod retrieval;
pub mod server;
pub mod signals;
pub mod store;
