//! HTTP probe for a single monitor target

use reqwest::{Client, Method};
use std::time::{Duration, Instant};

use crate::config::MonitorConfig;
use crate::store::MonitorTarget;

/// Result of probing one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reached { status: u16, elapsed_ms: i64 },
    Failed,
}

impl ProbeOutcome {
    /// Stored `(status, response_time)`; a failure records `(0, 0)`
    pub fn as_ping_values(self) -> (i64, i64) {
        match self {
            Self::Reached { status, elapsed_ms } => (i64::from(status), elapsed_ms),
            Self::Failed => (0, 0),
        }
    }
}

/// Full URL for a target: scheme from the secure flag
pub fn target_url(target: &MonitorTarget) -> String {
    let scheme = if target.secure { "https" } else { "http" };
    format!("{}://{}", scheme, target.url)
}

/// HEAD for ping-mode targets, GET otherwise
pub fn target_method(target: &MonitorTarget) -> Method {
    if target.ping {
        Method::HEAD
    } else {
        Method::GET
    }
}

#[derive(Clone, Debug)]
pub struct Prober {
    client: Client,
}

impl Prober {
    pub fn new(config: &MonitorConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("api-analytics-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Probe once; never errors, failures become `ProbeOutcome::Failed`
    pub async fn probe(&self, target: &MonitorTarget) -> ProbeOutcome {
        let url = target_url(target);
        let start = Instant::now();

        match self.client.request(target_method(target), &url).send().await {
            Ok(response) => ProbeOutcome::Reached {
                status: response.status().as_u16(),
                elapsed_ms: start.elapsed().as_millis() as i64,
            },
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Probe failed");
                ProbeOutcome::Failed
            }
        }
    }
}
