use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::Record;

use super::SegmentWriter;

/// Formats a single record's `(timestamp, correlation_id, value)` triple
/// into the line appended to a column file. The choice of formatter must
/// stay consistent within a single segment column file.
pub trait LineFormatter: Send + Sync {
   fn format(&self, timestamp_ns: &str, correlation_id: &str, value: &str) -> String;
}

/// Default formatter: a CSV-escaped line, matching the original's
/// `csv.writer`-based `_create_csv_string`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvFormatter;

impl LineFormatter for CsvFormatter {
   fn format(&self, timestamp_ns: &str, correlation_id: &str, value: &str) -> String {
      let mut line = String::new();
      for (i, field) in [timestamp_ns, correlation_id, value].into_iter().enumerate() {
         if i > 0 {
            line.push(',');
         }
         line.push_str(&csv_escape(field));
      }
      line
   }
}

fn csv_escape(field: &str) -> String {
   if field.contains([',', '"', '\n', '\r']) {
      format!("\"{}\"", field.replace('"', "\"\""))
   } else {
      field.to_string()
   }
}

/// Fixed-width formatter: timestamp and correlation-id each padded to 60
/// characters, recovered from the original's fixed-width column variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedWidthFormatter;

const FIELD_WIDTH: usize = 60;

impl LineFormatter for FixedWidthFormatter {
   fn format(&self, timestamp_ns: &str, correlation_id: &str, value: &str) -> String {
      format!("{:<width$}{:<width$}{value}", timestamp_ns, correlation_id, width = FIELD_WIDTH)
   }
}

/// One append-only text file per typed column key under the segment's
/// directory, matching `_append_record`/`_get_file_path_for_column`.
pub struct ColumnFileWriter<F: LineFormatter> {
   base: PathBuf,
   formatter: F,
}

impl<F: LineFormatter> ColumnFileWriter<F> {
   pub fn new(base: impl Into<PathBuf>, formatter: F) -> Self {
      Self { base: base.into(), formatter }
   }

   fn column_path(&self, dataset_id: &str, segment_id: &str, key: &str) -> PathBuf {
      self.base.join(dataset_id).join(segment_id).join(key)
   }
}

#[async_trait]
impl<F: LineFormatter> SegmentWriter for ColumnFileWriter<F> {
   async fn write(&self, dataset_id: &str, segment_id: &str, record: &Record) -> Result<()> {
      std::fs::create_dir_all(self.base.join(dataset_id).join(segment_id))?;

      for (key, value, _suffix) in record.columns() {
         let path = self.column_path(dataset_id, segment_id, key);
         let line = self.formatter.format(&record.timestamp_ns.to_string(), &record.correlation_id, value);

         let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
         writeln!(file, "{line}")?;
         file.flush()?;
      }

      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use tempfile::tempdir;

   use super::*;

   fn record(body: &str) -> Record {
      crate::record::parse_body(body).unwrap()
   }

   #[tokio::test]
   async fn writes_one_line_per_typed_column() {
      let dir = tempdir().unwrap();
      let writer = ColumnFileWriter::new(dir.path(), CsvFormatter);
      let record = record("timestamp-ns=1700000000000000000\ncorrelation-id=abc\ndataset-id=D\nk1.int64=7\nk2.varchar=hello");

      writer.write("D", "segment-1699999200000000000", &record).await.unwrap();

      let k1 = std::fs::read_to_string(dir.path().join("D/segment-1699999200000000000/k1.int64")).unwrap();
      let k2 = std::fs::read_to_string(dir.path().join("D/segment-1699999200000000000/k2.varchar")).unwrap();
      assert!(k1.trim_end().ends_with(",7"));
      assert!(k2.trim_end().ends_with(",hello"));
   }

   #[test]
   fn fixed_width_pads_to_sixty_chars() {
      let line = FixedWidthFormatter.format("123", "abc", "value");
      assert_eq!(&line[0..60], format!("{:<60}", "123").as_str());
      assert_eq!(&line[60..120], format!("{:<60}", "abc").as_str());
      assert_eq!(&line[120..], "value");
   }

   #[test]
   fn csv_escapes_values_containing_commas() {
      let line = CsvFormatter.format("1", "abc", "a,b");
      assert_eq!(line, "1,abc,\"a,b\"");
   }
}
