//! Tracing setup and log-safe credential display

use std::fmt;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

use crate::config::ServerConfig;

const LOG_FILE_PREFIX: &str = "api-analytics.log";

/// Credential shown as its first 8 characters followed by `***`
///
/// ```
/// use api_analytics::logging::RedactedKey;
///
/// let key = "1b4e28ba-2fa1-11d2-883f-0016d3cca427";
/// assert_eq!(RedactedKey(key).to_string(), "1b4e28ba***");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct RedactedKey<'a>(pub &'a str);

impl fmt::Display for RedactedKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => write!(f, "{}***", &self.0[..end]),
            // Too short to reveal any prefix
            None => write!(f, "***"),
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides `server.log_level`. When `server.log_dir` is set a
/// daily-rolling JSON file is written as well; keep the returned guard alive
/// until shutdown so buffered lines are flushed.
pub fn init_tracing(config: &ServerConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let console = if config.log_format == "json" {
        tracing_fmt::layer().json().with_target(true).boxed()
    } else {
        tracing_fmt::layer().with_target(true).boxed()
    };

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}
