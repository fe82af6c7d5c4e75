//! Filter compiler
//!
//! Turns the optional `/data` query parameters into one parameterized
//! predicate over `requests`. Invalid or absent filters are dropped rather
//! than rejected; no filter value is ever written into the SQL text.

use chrono::{NaiveDate, NaiveTime};
use std::fmt::Write;
use std::net::IpAddr;

use super::cursor::Cursor;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Columns selected for every export, in compact header order plus the row id
const SELECT_COLUMNS: &str =
    "id, ip_address, path, hostname, user_agent, method, response_time, status, location, user_id, created_at";

/// Raw query string as sent by the dashboard or API clients
///
/// Every field is kept as text so a malformed value degrades to "not
/// filtered" instead of failing extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuery {
    pub compact: Option<String>,
    pub date: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub hostname: Option<String>,
    pub ip: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<String>,
}

impl DataQuery {
    /// Build from decoded query pairs
    ///
    /// The first occurrence of a repeated key wins; unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "compact" => &mut query.compact,
                "date" => &mut query.date,
                "dateFrom" => &mut query.date_from,
                "dateTo" => &mut query.date_to,
                "hostname" => &mut query.hostname,
                "ip" => &mut query.ip,
                "location" => &mut query.location,
                "status" => &mut query.status,
                "userID" => &mut query.user_id,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }

    pub fn compact(&self) -> bool {
        self.compact.as_deref() == Some("true")
    }
}

/// Time constraint in Unix milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    #[default]
    Any,
    /// `[start, end)` covering one UTC day
    Day { start: i64, end: i64 },
    Range { from: Option<i64>, to: Option<i64> },
}

/// Validated filter set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub window: TimeWindow,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub status: Option<i64>,
    pub hostname: Option<String>,
    pub user_id: Option<String>,
}

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
}

/// WHERE-clause body plus its parameters, in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPredicate {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Complete SELECT for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

fn midnight_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::default()).and_utc().timestamp_millis()
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn valid_ip(value: &str) -> Option<String> {
    value.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

fn valid_status(value: &str) -> Option<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|status| (100..=599).contains(status))
}

fn valid_location(value: &str) -> bool {
    let len = value.chars().count();
    (1..=64).contains(&len)
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
}

fn valid_text(value: &str) -> bool {
    let len = value.chars().count();
    (1..=255).contains(&len) && !value.chars().any(char::is_control)
}

fn accept(value: Option<&str>, check: fn(&str) -> bool) -> Option<String> {
    value.filter(|v| check(v)).map(str::to_string)
}

impl RequestFilter {
    /// Keep only the filters that are present and valid
    ///
    /// A valid `date` wins over `dateFrom`/`dateTo`; the range is only
    /// considered when no usable exact date is given.
    pub fn from_query(query: &DataQuery) -> Self {
        let day = parse_date(query.date.as_deref()).and_then(|date| {
            let next = date.succ_opt()?;
            Some(TimeWindow::Day {
                start: midnight_millis(date),
                end: midnight_millis(next),
            })
        });

        let window = day.unwrap_or_else(|| {
            let from = parse_date(query.date_from.as_deref()).map(midnight_millis);
            let to = parse_date(query.date_to.as_deref()).map(midnight_millis);
            if from.is_none() && to.is_none() {
                TimeWindow::Any
            } else {
                TimeWindow::Range { from, to }
            }
        });

        Self {
            window,
            ip_address: query.ip.as_deref().and_then(valid_ip),
            location: accept(query.location.as_deref(), valid_location),
            status: query.status.as_deref().and_then(valid_status),
            hostname: accept(query.hostname.as_deref(), valid_text),
            user_id: accept(query.user_id.as_deref(), valid_text),
        }
    }

    /// Compile to `api_key = ? AND ...` with one bound parameter per condition
    pub fn compile(&self, api_key: &str) -> CompiledPredicate {
        let mut sql = String::from("api_key = ?");
        let mut params = vec![SqlValue::Text(api_key.to_string())];

        match self.window {
            TimeWindow::Any => {}
            TimeWindow::Day { start, end } => {
                sql.push_str(" AND created_at >= ? AND created_at < ?");
                params.push(SqlValue::Integer(start));
                params.push(SqlValue::Integer(end));
            }
            TimeWindow::Range { from, to } => {
                if let Some(from) = from {
                    sql.push_str(" AND created_at >= ?");
                    params.push(SqlValue::Integer(from));
                }
                if let Some(to) = to {
                    sql.push_str(" AND created_at <= ?");
                    params.push(SqlValue::Integer(to));
                }
            }
        }

        let text_filters = [
            ("ip_address", &self.ip_address),
            ("location", &self.location),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value {
                let _ = write!(sql, " AND {} = ?", column);
                params.push(SqlValue::Text(value.clone()));
            }
        }

        if let Some(status) = self.status {
            sql.push_str(" AND status = ?");
            params.push(SqlValue::Integer(status));
        }

        let text_filters = [("hostname", &self.hostname), ("user_id", &self.user_id)];
        for (column, value) in text_filters {
            if let Some(value) = value {
                let _ = write!(sql, " AND {} = ?", column);
                params.push(SqlValue::Text(value.clone()));
            }
        }

        CompiledPredicate { sql, params }
    }
}

impl CompiledPredicate {
    /// One page: rows strictly after `after` in `(created_at, id)` order
    pub fn page(&self, after: Option<Cursor>, limit: usize) -> CompiledQuery {
        let mut sql = format!("SELECT {} FROM requests WHERE {}", SELECT_COLUMNS, self.sql);
        let mut params = self.params.clone();

        if let Some(cursor) = after {
            sql.push_str(" AND (created_at > ? OR (created_at = ? AND id > ?))");
            params.push(SqlValue::Integer(cursor.created_at));
            params.push(SqlValue::Integer(cursor.created_at));
            params.push(SqlValue::Integer(cursor.id));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC LIMIT ?");
        params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        CompiledQuery { sql, params }
    }
}
