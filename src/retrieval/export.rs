//! Export encoder
//!
//! Serializes rows as verbose objects or as a compact header-plus-arrays
//! table, gzip-compressing while serializing when the body is sent gzipped.

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::ser::{SerializeSeq, SerializeTuple};
use serde::{Deserialize, Serialize, Serializer};
use std::io::Write;

use crate::store::pings::millis_to_datetime;
use crate::store::RequestRow;

/// Compact header, also the positional order of every compact row
pub const COLUMNS: [&str; 10] = [
    "ip_address",
    "path",
    "hostname",
    "user_agent",
    "method",
    "response_time",
    "status",
    "location",
    "user_id",
    "created_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Verbose,
    Compact,
}

impl ExportFormat {
    pub fn from_compact_flag(compact: bool) -> Self {
        if compact {
            Self::Compact
        } else {
            Self::Verbose
        }
    }
}

/// Transfer encoding of an export body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    #[default]
    Gzip,
    Identity,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to serialize export: {0}")]
    Serialize(serde_json::Error),

    #[error("failed to compress export: {0}")]
    Compression(std::io::Error),
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Compression(err.into())
        } else {
            Self::Serialize(err)
        }
    }
}

/// Public shape of one request; absent text fields become ""
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestView {
    pub ip_address: String,
    pub path: String,
    pub hostname: String,
    pub user_agent: String,
    pub method: i16,
    pub response_time: i16,
    pub status: i16,
    pub location: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<RequestRow> for RequestView {
    fn from(row: RequestRow) -> Self {
        Self {
            ip_address: row.ip_address.unwrap_or_default(),
            path: row.path,
            hostname: row.hostname.unwrap_or_default(),
            user_agent: row.user_agent.unwrap_or_default(),
            method: row.method,
            response_time: row.response_time,
            status: row.status,
            location: row.location.unwrap_or_default(),
            user_id: row.user_id.unwrap_or_default(),
            created_at: millis_to_datetime(row.created_at),
        }
    }
}

/// Serializes as `[COLUMNS, [..row..], ...]` without building an intermediate tree
struct CompactTable<'a>(&'a [RequestView]);

struct CompactRow<'a>(&'a RequestView);

impl Serialize for CompactRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let view = self.0;
        let mut row = serializer.serialize_tuple(COLUMNS.len())?;
        row.serialize_element(&view.ip_address)?;
        row.serialize_element(&view.path)?;
        row.serialize_element(&view.hostname)?;
        row.serialize_element(&view.user_agent)?;
        row.serialize_element(&view.method)?;
        row.serialize_element(&view.response_time)?;
        row.serialize_element(&view.status)?;
        row.serialize_element(&view.location)?;
        row.serialize_element(&view.user_id)?;
        row.serialize_element(&view.created_at)?;
        row.end()
    }
}

impl Serialize for CompactTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len() + 1))?;
        seq.serialize_element(&COLUMNS)?;
        for view in self.0 {
            seq.serialize_element(&CompactRow(view))?;
        }
        seq.end()
    }
}

/// Write the JSON form of `views` into `writer`
pub fn write_json<W: Write>(writer: W, views: &[RequestView], format: ExportFormat) -> Result<(), ExportError> {
    match format {
        ExportFormat::Verbose => serde_json::to_writer(writer, views)?,
        ExportFormat::Compact => serde_json::to_writer(writer, &CompactTable(views))?,
    }
    Ok(())
}

/// Serialize and gzip in one pass
pub fn encode_gzip(views: &[RequestView], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    write_json(&mut encoder, views, format)?;
    encoder.finish().map_err(ExportError::Compression)
}

/// Serialize `views` into a body with the given encoding
pub fn encode(views: &[RequestView], format: ExportFormat, encoding: BodyEncoding) -> Result<Vec<u8>, ExportError> {
    match encoding {
        BodyEncoding::Gzip => encode_gzip(views, format),
        BodyEncoding::Identity => {
            let mut body = Vec::new();
            write_json(&mut body, views, format)?;
            Ok(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn views() -> Vec<RequestView> {
        vec![
            RequestView::from(RequestRow {
                id: 1,
                ip_address: Some("203.0.113.7".to_string()),
                path: "/v1/users".to_string(),
                hostname: Some("api.example.com".to_string()),
                user_agent: Some("curl/8.0".to_string()),
                method: 1,
                response_time: 25,
                status: 201,
                location: Some("GB".to_string()),
                user_id: Some("customer-1".to_string()),
                created_at: 1_700_000_000_000,
            }),
            RequestView::from(RequestRow {
                id: 2,
                ip_address: None,
                path: "/health".to_string(),
                hostname: None,
                user_agent: None,
                method: 0,
                response_time: 1,
                status: 200,
                location: None,
                user_id: None,
                created_at: 1_700_000_001_500,
            }),
        ]
    }

    fn gunzip(bytes: &[u8]) -> serde_json::Value {
        let mut decoder = GzDecoder::new(bytes);
        let mut json = String::new();
        decoder.read_to_string(&mut json).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    /// Rebuild views from the compact layout using the header positions
    fn from_compact(value: &serde_json::Value) -> Vec<RequestView> {
        let table = value.as_array().unwrap();
        let header: Vec<&str> = table[0]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_str().unwrap())
            .collect();
        table[1..]
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = header
                    .iter()
                    .zip(row.as_array().unwrap())
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect();
                serde_json::from_value(serde_json::Value::Object(object)).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_nulls_render_as_empty_strings() {
        let v = &views()[1];
        assert_eq!(v.ip_address, "");
        assert_eq!(v.hostname, "");
        assert_eq!(v.user_agent, "");
        assert_eq!(v.location, "");
        assert_eq!(v.user_id, "");
    }

    #[test]
    fn test_verbose_layout() {
        let json = gunzip(&encode_gzip(&views(), ExportFormat::Verbose).unwrap());
        let records = json.as_array().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["ip_address"], "203.0.113.7");
        assert_eq!(records[0]["status"], 201);
        assert_eq!(records[1]["hostname"], "");
        assert!(records[1]["hostname"].is_string());
    }

    #[test]
    fn test_compact_layout() {
        let json = gunzip(&encode_gzip(&views(), ExportFormat::Compact).unwrap());
        let table = json.as_array().unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table[0], serde_json::json!(COLUMNS));
        assert_eq!(table[1][0], "203.0.113.7");
        assert_eq!(table[1][1], "/v1/users");
        assert_eq!(table[1][6], 201);
        assert_eq!(table[2][2], "");
    }

    #[test]
    fn test_compact_and_verbose_decode_to_same_records() {
        let compact = gunzip(&encode_gzip(&views(), ExportFormat::Compact).unwrap());
        let verbose = gunzip(&encode_gzip(&views(), ExportFormat::Verbose).unwrap());

        let from_verbose: Vec<RequestView> = serde_json::from_value(verbose).unwrap();
        assert_eq!(from_compact(&compact), from_verbose);
        assert_eq!(from_verbose, views());
    }

    #[test]
    fn test_empty_export() {
        let compact = gunzip(&encode_gzip(&[], ExportFormat::Compact).unwrap());
        assert_eq!(compact, serde_json::json!([COLUMNS]));

        let verbose = gunzip(&encode_gzip(&[], ExportFormat::Verbose).unwrap());
        assert_eq!(verbose, serde_json::json!([]));
    }

    #[test]
    fn test_identity_body_is_plain_json() {
        let body = encode(&views(), ExportFormat::Verbose, BodyEncoding::Identity).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);

        let gzipped = encode(&views(), ExportFormat::Verbose, BodyEncoding::Gzip).unwrap();
        assert_eq!(gunzip(&gzipped), json);
    }

    #[test]
    fn test_compact_is_smaller_than_verbose() {
        let many: Vec<RequestView> = views().into_iter().cycle().take(500).collect();
        let mut compact = Vec::new();
        let mut verbose = Vec::new();
        write_json(&mut compact, &many, ExportFormat::Compact).unwrap();
        write_json(&mut verbose, &many, ExportFormat::Verbose).unwrap();

        assert!(compact.len() < verbose.len());
    }

    #[test]
    fn test_writer_failure_is_compression_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let err = write_json(Broken, &views(), ExportFormat::Verbose).unwrap_err();
        assert!(matches!(err, ExportError::Compression(_)));
    }
}
