use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use crate::clock::Clock;
use crate::error::{Error, Result};

use super::{LeaseHandle, LeaseManager};

const NS_PER_SEC: i64 = 1_000_000_000;

/// The three object-store operations the lease manager needs, abstracted
/// from the concrete S3 client so unit tests can substitute an in-memory
/// fake instead of making network calls. Selected once at construction,
/// same as the lease manager itself — never switched per call.
#[async_trait]
pub trait ObjectStoreBackend: Send + Sync {
   /// Conditionally creates an object, failing if one already exists at
   /// `key`. Returns the server-assigned entity tag, unquoted.
   async fn put_if_absent(&self, key: &str, body: Vec<u8>, tag: &str, expires_at: chrono::DateTime<Utc>) -> Result<PutOutcome>;

   /// Returns `true` if the object at `key` currently carries `etag`.
   async fn head_if_match(&self, key: &str, etag: &str) -> Result<bool>;

   async fn delete(&self, key: &str) -> Result<()>;
}

pub enum PutOutcome {
   Created { etag: String },
   Conflict,
}

#[derive(Debug)]
pub struct ObjectStoreLeaseHandle {
   etag: String,
}

impl LeaseHandle for ObjectStoreLeaseHandle {}

pub struct ObjectStoreLeaseManager<B: ObjectStoreBackend> {
   backend: Arc<B>,
   instance_id: String,
   clock: Arc<dyn Clock>,
   timeout_secs: u64,
   delay_secs: u64,
   lease_ttl_secs: u64,
}

impl<B: ObjectStoreBackend> ObjectStoreLeaseManager<B> {
   pub fn new(backend: Arc<B>, instance_id: impl Into<String>, clock: Arc<dyn Clock>, timeout_secs: u64, delay_secs: u64, lease_ttl_secs: u64) -> Self {
      Self { backend, instance_id: instance_id.into(), clock, timeout_secs, delay_secs, lease_ttl_secs }
   }

   fn key(dataset_id: &str, segment_id: &str) -> String {
      format!("{dataset_id}/{segment_id}")
   }
}

#[async_trait]
impl<B: ObjectStoreBackend> LeaseManager for ObjectStoreLeaseManager<B> {
   type Handle = ObjectStoreLeaseHandle;

   /// No-op: the object-store variant has no separate initialization step —
   /// `acquire`'s conditional PUT both creates and locks in one call.
   async fn initialize(&self, _dataset_id: &str, _segment_id: &str) -> Result<()> {
      Ok(())
   }

   async fn acquire(&self, dataset_id: &str, segment_id: &str) -> Result<Self::Handle> {
      let key = Self::key(dataset_id, segment_id);
      let start = self.clock.now_nanos();
      let deadline_ns = self.timeout_secs as i64 * NS_PER_SEC;

      loop {
         let now_ns = self.clock.now_nanos();
         let body = format!("{}:{now_ns}", self.instance_id).into_bytes();
         let expires_at = Utc::now() + ChronoDuration::seconds(self.lease_ttl_secs as i64);

         match self.backend.put_if_absent(&key, body, &self.instance_id, expires_at).await? {
            PutOutcome::Created { etag } => return Ok(ObjectStoreLeaseHandle { etag }),
            PutOutcome::Conflict => {
               if self.clock.now_nanos() - start >= deadline_ns {
                  return Err(Error::SegmentLock { segment_id: segment_id.to_string(), reason: "timed out".to_string() });
               }
               tokio::time::sleep(Duration::from_secs(self.delay_secs)).await;
            }
         }
      }
   }

   async fn release(&self, dataset_id: &str, segment_id: &str, handle: Self::Handle) -> Result<()> {
      let key = Self::key(dataset_id, segment_id);

      let owned = self.backend.head_if_match(&key, &handle.etag).await?;
      if !owned {
         return Err(Error::SegmentUnlock { segment_id: segment_id.to_string(), reason: "not owner".to_string() });
      }

      self.backend.delete(&key).await.map_err(|err| Error::SegmentUnlock {
         segment_id: segment_id.to_string(),
         reason: err.to_string(),
      })
   }
}

/// Production backend against a real S3-compatible bucket.
pub struct S3Backend {
   client: aws_sdk_s3::Client,
   bucket: String,
}

impl S3Backend {
   pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
      Self { client, bucket: bucket.into() }
   }

   /// Builds a backend from the process-wide lazily-initialized S3 client,
   /// mirroring the original's lazy `boto3.Session(profile_name=...)`
   /// client: built once on first use and shared across every subsequent
   /// acquire/release call in a warm instance.
   pub async fn connect(profile_name: Option<&str>, bucket: impl Into<String>) -> Self {
      Self::new(shared_client(profile_name).await, bucket)
   }
}

static S3_CLIENT: tokio::sync::OnceCell<aws_sdk_s3::Client> = tokio::sync::OnceCell::const_new();

/// Returns the process-wide `aws_sdk_s3::Client`, building it from
/// `aws-config` (optionally scoped to a named profile) on first use. This
/// is the crate's one lazy-cloud-client initialization point, per spec §9 /
/// SPEC_FULL §6 — every caller shares the same client rather than building
/// one per request.
async fn shared_client(profile_name: Option<&str>) -> aws_sdk_s3::Client {
   S3_CLIENT
      .get_or_init(|| async {
         let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
         if let Some(profile) = profile_name {
            loader = loader.profile_name(profile);
         }
         let sdk_config = loader.load().await;
         aws_sdk_s3::Client::new(&sdk_config)
      })
      .await
      .clone()
}

#[async_trait]
impl ObjectStoreBackend for S3Backend {
   async fn put_if_absent(&self, key: &str, body: Vec<u8>, tag: &str, expires_at: chrono::DateTime<Utc>) -> Result<PutOutcome> {
      let result = self
         .client
         .put_object()
         .bucket(&self.bucket)
         .key(key)
         .body(body.into())
         .if_none_match("*")
         .tagging(format!("instance_id={tag}"))
         .expires(aws_sdk_s3::primitives::DateTime::from_secs(expires_at.timestamp()))
         .send()
         .await;

      match result {
         Ok(output) => {
            let etag = output.e_tag().unwrap_or_default().trim_matches('"').to_string();
            Ok(PutOutcome::Created { etag })
         }
         Err(err) => {
            let code = err.as_service_error().and_then(|e| e.meta().code()).map(str::to_string);
            // S3's conditional PUT (if-none-match) can refuse a concurrent
            // write with either a 412 Precondition Failed or a 409
            // ConditionalRequestConflict, per spec §4.4 step 3 — both are
            // retryable conflicts, not lease-acquisition failures.
            if matches!(code.as_deref(), Some("PreconditionFailed") | Some("ConditionalRequestConflict")) {
               Ok(PutOutcome::Conflict)
            } else {
               Err(Error::ObjectStore(err.to_string()))
            }
         }
      }
   }

   async fn head_if_match(&self, key: &str, etag: &str) -> Result<bool> {
      match self.client.head_object().bucket(&self.bucket).key(key).if_match(etag).send().await {
         Ok(_) => Ok(true),
         Err(err) => {
            let code = err.as_service_error().and_then(|e| e.meta().code()).map(str::to_string);
            if matches!(code.as_deref(), Some("PreconditionFailed") | Some("NotFound") | Some("NoSuchKey")) {
               Ok(false)
            } else {
               Err(Error::ObjectStore(err.to_string()))
            }
         }
      }
   }

   async fn delete(&self, key: &str) -> Result<()> {
      self.client.delete_object().bucket(&self.bucket).key(key).send().await.map_err(|err| Error::ObjectStore(err.to_string()))?;
      Ok(())
   }
}

#[cfg(test)]
pub mod fake {
   use std::collections::HashMap;
   use std::sync::Mutex;

   use super::{ObjectStoreBackend, PutOutcome, Result};

   #[derive(Default)]
   struct Entry {
      etag: String,
   }

   #[derive(Default)]
   pub struct InMemoryObjectStore {
      objects: Mutex<HashMap<String, Entry>>,
      next_etag: Mutex<u64>,
   }

   #[async_trait::async_trait]
   impl ObjectStoreBackend for InMemoryObjectStore {
      async fn put_if_absent(
         &self,
         key: &str,
         _body: Vec<u8>,
         _tag: &str,
         _expires_at: chrono::DateTime<chrono::Utc>,
      ) -> Result<PutOutcome> {
         let mut objects = self.objects.lock().unwrap();
         if objects.contains_key(key) {
            return Ok(PutOutcome::Conflict);
         }
         let mut next_etag = self.next_etag.lock().unwrap();
         *next_etag += 1;
         let etag = format!("etag-{next_etag}");
         objects.insert(key.to_string(), Entry { etag: etag.clone() });
         Ok(PutOutcome::Created { etag })
      }

      async fn head_if_match(&self, key: &str, etag: &str) -> Result<bool> {
         let objects = self.objects.lock().unwrap();
         Ok(objects.get(key).is_some_and(|entry| entry.etag == etag))
      }

      async fn delete(&self, key: &str) -> Result<()> {
         self.objects.lock().unwrap().remove(key);
         Ok(())
      }
   }
}
