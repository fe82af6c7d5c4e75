//! Request ingestion
//!
//! Framework adapters post batches of captured requests. Each batch is
//! validated into store records and queued for the background writer; the
//! caller never waits on the store.

pub mod codes;
pub mod writer;

pub use writer::IngestSink;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::net::IpAddr;

use crate::store::RequestRecord;

/// Body of `POST /log-request`
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPayload {
    pub api_key: String,
    #[serde(default)]
    pub requests: Vec<IncomingRequest>,
    pub framework: String,
}

/// One request as captured by a framework adapter
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingRequest {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    pub path: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub method: String,
    pub status: i64,
    pub response_time: f64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Capture time; insertion time is used when absent
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("unknown framework")]
    UnknownFramework,
}

impl RequestPayload {
    /// Convert to store records, dropping entries that cannot be stored
    pub fn into_records(self, now: i64) -> Result<Vec<RequestRecord>, PayloadError> {
        if self.api_key.trim().is_empty() {
            return Err(PayloadError::MissingApiKey);
        }
        let framework = codes::framework_code(&self.framework).ok_or(PayloadError::UnknownFramework)?;

        let api_key = self.api_key;
        Ok(self
            .requests
            .into_iter()
            .filter_map(|request| request.into_record(&api_key, framework, now))
            .collect())
    }
}

impl IncomingRequest {
    fn into_record(self, api_key: &str, framework: i16, now: i64) -> Option<RequestRecord> {
        let method = codes::method_code(&self.method)?;
        if !(100..=599).contains(&self.status) {
            return None;
        }

        let ip_address = self
            .ip_address
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
            .map(|ip| ip.to_string());

        let response_time = if self.response_time.is_finite() {
            self.response_time.round().clamp(0.0, f64::from(i16::MAX)) as i16
        } else {
            0
        };

        Some(RequestRecord {
            api_key: api_key.to_string(),
            path: self.path,
            hostname: non_empty(self.hostname),
            ip_address,
            user_agent: non_empty(self.user_agent),
            method,
            status: self.status as i16,
            response_time,
            framework,
            location: non_empty(self.location),
            user_id: non_empty(self.user_id),
            created_at: self.created_at.map(|ts| ts.timestamp_millis()).unwrap_or(now),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(requests: serde_json::Value) -> RequestPayload {
        serde_json::from_value(json!({
            "api_key": "key-1",
            "requests": requests,
            "framework": "Gin",
        }))
        .unwrap()
    }

    #[test]
    fn test_payload_converts_records() {
        let records = payload(json!([{
            "hostname": "api.example.com",
            "ip_address": "::ffff:203.0.113.7",
            "path": "/v1/users",
            "user_agent": "curl/8.0",
            "method": "POST",
            "status": 201,
            "response_time": 12.6,
            "created_at": "2024-03-01T10:00:00Z"
        }]))
        .into_records(1)
        .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.api_key, "key-1");
        assert_eq!(record.method, 1);
        assert_eq!(record.framework, 2);
        assert_eq!(record.response_time, 13);
        assert_eq!(record.ip_address.as_deref(), Some("::ffff:203.0.113.7"));
        assert_eq!(record.created_at, 1_709_287_200_000);
        assert_eq!(record.location, None);
    }

    #[test]
    fn test_unknown_method_and_bad_status_are_dropped() {
        let records = payload(json!([
            {"path": "/a", "method": "PROPFIND", "status": 200, "response_time": 1},
            {"path": "/b", "method": "GET", "status": 42, "response_time": 1},
            {"path": "/c", "method": "GET", "status": 200, "response_time": 1},
        ]))
        .into_records(5_000)
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/c");
        assert_eq!(records[0].created_at, 5_000);
    }

    #[test]
    fn test_invalid_ip_is_cleared() {
        let records = payload(json!([
            {"path": "/", "ip_address": "not-an-ip", "method": "GET", "status": 200, "response_time": 70000},
        ]))
        .into_records(0)
        .unwrap();

        assert_eq!(records[0].ip_address, None);
        assert_eq!(records[0].response_time, i16::MAX);
    }

    #[test]
    fn test_payload_rejections() {
        let mut missing_key = payload(json!([]));
        missing_key.api_key = "  ".to_string();
        assert_eq!(missing_key.into_records(0).unwrap_err(), PayloadError::MissingApiKey);

        let mut unknown = payload(json!([]));
        unknown.framework = "Cobol on Cogs".to_string();
        assert_eq!(unknown.into_records(0).unwrap_err(), PayloadError::UnknownFramework);
    }
}
