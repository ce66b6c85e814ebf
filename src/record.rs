use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;

const NS_PER_MS: i64 = 1_000_000;
const CORRELATION_ID_MAX_LEN: usize = 60;

pub const REQUIRED_KEYS: &[&str] = &["timestamp-ms", "timestamp-ns", "correlation-id", "dataset-id"];

/// The typed-suffix allowlist a column key must end with to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSuffix {
   Int64,
   Varchar,
   Float64,
   Bool,
   Datetime,
}

impl ColumnSuffix {
   const ALL: [(&'static str, ColumnSuffix); 5] = [
      (".int64", ColumnSuffix::Int64),
      (".varchar", ColumnSuffix::Varchar),
      (".float64", ColumnSuffix::Float64),
      (".bool", ColumnSuffix::Bool),
      (".datetime", ColumnSuffix::Datetime),
   ];

   /// Returns the matching suffix for a column key, if the key carries one
   /// of the allowed type suffixes.
   pub fn of(key: &str) -> Option<ColumnSuffix> {
      Self::ALL.iter().find(|(suffix, _)| key.ends_with(suffix)).map(|(_, kind)| *kind)
   }
}

impl fmt::Display for ColumnSuffix {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let s = match self {
         ColumnSuffix::Int64 => ".int64",
         ColumnSuffix::Varchar => ".varchar",
         ColumnSuffix::Float64 => ".float64",
         ColumnSuffix::Bool => ".bool",
         ColumnSuffix::Datetime => ".datetime",
      };
      f.write_str(s)
   }
}

/// A parsed and validated telemetry record body.
#[derive(Debug, Clone)]
pub struct Record {
   pub dataset_id: String,
   pub correlation_id: String,
   pub timestamp_ns: i64,
   pub timestamp_ms: i64,
   fields: BTreeMap<String, String>,
}

impl Record {
   /// Columns eligible for writing: not a required key, and carrying one of
   /// the allowed typed suffixes.
   pub fn columns(&self) -> impl Iterator<Item = (&str, &str, ColumnSuffix)> {
      self.fields.iter().filter_map(|(key, value)| {
         if REQUIRED_KEYS.contains(&key.as_str()) {
            return None;
         }
         ColumnSuffix::of(key).map(|suffix| (key.as_str(), value.as_str(), suffix))
      })
   }

   pub fn field_keys(&self) -> impl Iterator<Item = &str> {
      self.fields.keys().map(String::as_str)
   }

   /// The full normalized `key=value` map, including required keys and any
   /// field whose suffix isn't in the typed allowlist — the sqlite writer's
   /// `payload` column stores this whole map, not just the typed columns a
   /// column-file writer would select via [`Record::columns`].
   pub fn fields(&self) -> &BTreeMap<String, String> {
      &self.fields
   }
}

/// Parses a newline-delimited `key=value` body into a validated [`Record`].
///
/// Lines that don't split into exactly one `=` are silently dropped, matching
/// the original's `split('=')` + `len == 2` check. When both `timestamp-ns`
/// and `timestamp-ms` are present, `timestamp-ms` wins — this is a
/// deliberate precedence, not an oversight: it lets callers who only know
/// millisecond-resolution time override a stale nanosecond value.
pub fn parse_body(body: &str) -> Result<Record, Error> {
   let mut fields: BTreeMap<String, String> = BTreeMap::new();

   for line in body.split('\n') {
      let mut parts = line.splitn(2, '=');
      let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
         continue;
      };
      if line.matches('=').count() != 1 {
         continue;
      }
      fields.insert(key.to_lowercase(), value.to_string());
   }

   let dataset_id = fields
      .get("dataset-id")
      .filter(|v| !v.is_empty())
      .ok_or_else(|| Error::Body("no dataset-id specified".to_string()))?
      .clone();

   if !fields.contains_key("timestamp-ns") && !fields.contains_key("timestamp-ms") {
      return Err(Error::Body("no timestamp specified".to_string()));
   }

   let (timestamp_ns, timestamp_ms) = if let Some(raw) = fields.get("timestamp-ns") {
      let ns: i64 = raw.parse().map_err(|_| Error::Body(format!("invalid timestamp-ns: {raw}")))?;
      (ns, ns.div_euclid(NS_PER_MS))
   } else {
      (0, 0)
   };
   let (timestamp_ns, timestamp_ms) = if let Some(raw) = fields.get("timestamp-ms") {
      let ms: i64 = raw.parse().map_err(|_| Error::Body(format!("invalid timestamp-ms: {raw}")))?;
      (ms * NS_PER_MS, ms)
   } else {
      (timestamp_ns, timestamp_ms)
   };

   fields.insert("timestamp-ns".to_string(), timestamp_ns.to_string());
   fields.insert("timestamp-ms".to_string(), timestamp_ms.to_string());

   let correlation_id = fields
      .get("correlation-id")
      .filter(|v| !v.is_empty())
      .ok_or_else(|| Error::Body("no correlation-id specified".to_string()))?
      .clone();

   if correlation_id.len() > CORRELATION_ID_MAX_LEN {
      return Err(Error::Body(format!(
         "correlation-id exceeds {CORRELATION_ID_MAX_LEN} characters"
      )));
   }

   Ok(Record { dataset_id, correlation_id, timestamp_ns, timestamp_ms, fields })
}
