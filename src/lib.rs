//! Segment-lease ingest core for a serverless telemetry store: derives a
//! segment identifier from a record's own timestamp, acquires an
//! at-most-one-writer lease over that segment via one of two substrates
//! (a shared POSIX filesystem, or an object store with conditional PUT),
//! and writes the record to one of two backing stores (append-only column
//! files, or an embedded SQLite file) before releasing the lease.

pub mod clock;
pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod lease;
pub mod record;
pub mod segment;
pub mod util;
pub mod writer;

pub use error::{Error, Result};
