use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use otel_ingest::clock::SystemClock;
use otel_ingest::config::{self, Config, LeaseBackend, WriterBackend};
use otel_ingest::error::{Error, Result};
use otel_ingest::handler::{status_for, IngestHandler};
use otel_ingest::lease::filesystem::FilesystemLeaseManager;
use otel_ingest::lease::object_store::{ObjectStoreLeaseManager, S3Backend};
use otel_ingest::lease::LeaseManager;
use otel_ingest::writer::columnfile::{ColumnFileWriter, CsvFormatter};
use otel_ingest::writer::sqlite::SqliteSegmentWriter;
use otel_ingest::{identity, util};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "otel-ingest")]
#[command(about = "Segment-lease ingest core for a serverless telemetry store")]
#[command(version)]
struct Cli {
   #[command(subcommand)]
   command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
   #[command(about = "Parse and ingest a record body (file or stdin)")]
   Ingest {
      #[arg(help = "Path to a request body; reads stdin when omitted")]
      body: Option<PathBuf>,
   },

   #[command(about = "Probe the configured storage substrate for reachability")]
   Doctor,
}

fn init_tracing() {
   let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
   tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
   init_tracing();

   let cli = Cli::parse();
   match run(cli).await {
      Ok(code) => std::process::ExitCode::from(code),
      Err(err) => {
         eprintln!("error: {err}");
         std::process::ExitCode::FAILURE
      }
   }
}

async fn run(cli: Cli) -> Result<u8> {
   let config = config::get();

   match cli.command {
      Cmd::Ingest { body } => {
         let body_text = read_body(body)?;
         let status = match config.lease_backend {
            LeaseBackend::Filesystem => {
               let clock = Arc::new(SystemClock);
               let lease_manager = FilesystemLeaseManager::new(
                  config.shared_storage_basedir.clone(),
                  identity::instance_id(),
                  clock,
                  config.filesystem_lock_timeout_minutes,
                  config.filesystem_lock_delay_secs,
               );
               run_with_lease_manager(lease_manager, config, &body_text).await
            }
            LeaseBackend::ObjectStore => {
               let bucket = config.segment_lock_bucket.clone().ok_or_else(|| {
                  Error::Config("segment_lock_bucket is required for the object-store lease backend".to_string())
               })?;
               let clock = Arc::new(SystemClock);
               let backend = S3Backend::connect(config.profile_name.as_deref(), bucket).await;
               let lease_manager = ObjectStoreLeaseManager::new(
                  Arc::new(backend),
                  identity::instance_id(),
                  clock,
                  config.object_store_lock_timeout_secs,
                  config.object_store_lock_delay_secs,
                  config.segment_lock_ttl,
               );
               run_with_lease_manager(lease_manager, config, &body_text).await
            }
         };

         println!("{status}");
         Ok(0)
      }
      Cmd::Doctor => {
         util::probe_storage_path(std::path::Path::new(&config.shared_storage_basedir))?;
         println!("storage ok: {}", config.shared_storage_basedir);
         Ok(0)
      }
   }
}

async fn run_with_lease_manager<L: LeaseManager>(lease_manager: L, config: &Config, body: &str) -> u16 {
   match config.writer_backend {
      WriterBackend::Sqlite => {
         let writer = SqliteSegmentWriter::new(config.shared_storage_basedir.clone());
         let handler = IngestHandler::new(lease_manager, writer, config.segment_bucket_size_minutes);
         status_for(&handler.handle(body).await)
      }
      WriterBackend::ColumnFiles => {
         let writer = ColumnFileWriter::new(config.shared_storage_basedir.clone(), CsvFormatter);
         let handler = IngestHandler::new(lease_manager, writer, config.segment_bucket_size_minutes);
         status_for(&handler.handle(body).await)
      }
   }
}

fn read_body(path: Option<PathBuf>) -> Result<String> {
   match path {
      Some(path) => Ok(std::fs::read_to_string(path)?),
      None => {
         let mut buf = String::new();
         std::io::stdin().read_to_string(&mut buf)?;
         Ok(buf)
      }
   }
}
