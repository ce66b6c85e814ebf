use tracing::{info_span, warn, Instrument};

use crate::error::Error;
use crate::lease::LeaseManager;
use crate::record::parse_body;
use crate::segment::segment_id;
use crate::writer::SegmentWriter;

/// Drives a single request through parse → derive segment → acquire lease
/// → write → release, regardless of which lease substrate or writer
/// backend is active. `L` and `W` are chosen once at construction — never
/// switched per call.
pub struct IngestHandler<L: LeaseManager, W: SegmentWriter> {
   lease_manager: L,
   writer: W,
   bucket_minutes: u32,
}

impl<L: LeaseManager, W: SegmentWriter> IngestHandler<L, W> {
   pub fn new(lease_manager: L, writer: W, bucket_minutes: u32) -> Self {
      Self { lease_manager, writer, bucket_minutes }
   }

   /// Handles one request body end to end, returning `Ok(())` only after a
   /// successful write. The lease is always released on the way out, even
   /// when the write itself failed — a release failure is logged and
   /// swallowed, never surfacing over a write that already succeeded.
   pub async fn handle(&self, body: &str) -> Result<(), Error> {
      let record = parse_body(body)?;
      let segment = segment_id(record.timestamp_ns, self.bucket_minutes);

      let span = info_span!(
         "ingest",
         dataset_id = %record.dataset_id,
         segment_id = %segment,
         correlation_id = %record.correlation_id,
         timestamp_ns = record.timestamp_ns,
      );

      async {
         self.lease_manager.initialize(&record.dataset_id, &segment).await?;
         let handle = self.lease_manager.acquire(&record.dataset_id, &segment).await?;

         let write_result = self.writer.write(&record.dataset_id, &segment, &record).await;

         if let Err(release_err) = self.lease_manager.release(&record.dataset_id, &segment, handle).await {
            warn!(segment_id = %segment, error = %release_err, "failed to release segment lease");
         }

         write_result
      }
      .instrument(span)
      .await
   }
}

/// Maps a handler failure onto the spec's HTTP-style status codes. Kept as
/// a pure function separate from `Error` so the error type stays
/// meaningful outside an HTTP context (e.g. the CLI harness).
pub fn status_for(result: &Result<(), Error>) -> u16 {
   match result {
      Ok(()) => 201,
      Err(Error::Body(_)) => 400,
      Err(Error::SegmentLock { .. }) => 500,
      Err(_) => 500,
   }
}
