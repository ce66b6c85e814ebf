use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time, expressed as nanoseconds since the Unix
/// epoch. Injectable so lease-timeout and staleness tests don't depend on
/// wall-clock time, mirroring the original's `UTC_NOW_NANOS` callable.
pub trait Clock: Send + Sync {
   fn now_nanos(&self) -> i64;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
   fn now_nanos(&self) -> i64 {
      SystemTime::now()
         .duration_since(UNIX_EPOCH)
         .expect("system clock before unix epoch")
         .as_nanos() as i64
   }
}

#[cfg(test)]
pub struct FixedClock(pub std::sync::atomic::AtomicI64);

#[cfg(test)]
impl FixedClock {
   pub fn new(nanos: i64) -> Self {
      Self(std::sync::atomic::AtomicI64::new(nanos))
   }

   pub fn advance(&self, delta_nanos: i64) {
      self.0.fetch_add(delta_nanos, std::sync::atomic::Ordering::SeqCst);
   }
}

#[cfg(test)]
impl Clock for FixedClock {
   fn now_nanos(&self) -> i64 {
      self.0.load(std::sync::atomic::Ordering::SeqCst)
   }
}
