const NS_PER_MIN: i64 = 60_000_000_000;

/// Derives a segment identifier from a record timestamp, bucketing on the
/// record's own timestamp rather than arrival time so late-arriving data
/// still lands in the segment it belongs to.
///
/// Pure and deterministic: same `(timestamp_ns, bucket_minutes)` always
/// produces the same identifier, regardless of call order or instance.
pub fn segment_id(timestamp_ns: i64, bucket_minutes: u32) -> String {
   let bucket_ns = i64::from(bucket_minutes) * NS_PER_MIN;
   let whole = timestamp_ns.div_euclid(bucket_ns);
   format!("segment-{}", whole * bucket_ns)
}

#[cfg(test)]
mod tests {
   use proptest::prelude::*;

   use super::*;

   #[test]
   fn buckets_by_floor_division() {
      let bucket_ns = 15 * NS_PER_MIN;
      assert_eq!(segment_id(0, 15), format!("segment-{}", 0));
      assert_eq!(segment_id(bucket_ns - 1, 15), format!("segment-{}", 0));
      assert_eq!(segment_id(bucket_ns, 15), format!("segment-{}", bucket_ns));
   }

   #[test]
   fn is_deterministic_and_pure() {
      let a = segment_id(1_700_000_123_456_789, 15);
      let b = segment_id(1_700_000_123_456_789, 15);
      assert_eq!(a, b);
   }

   #[test]
   fn late_arriving_data_buckets_on_record_timestamp() {
      // A record whose own timestamp is old still lands in the segment that
      // timestamp belongs to, not "now".
      let old_ts = 10 * NS_PER_MIN;
      assert_eq!(segment_id(old_ts, 15), segment_id(0, 15));
   }

   #[test]
   fn different_bucket_widths_partition_differently() {
      let ts = 20 * NS_PER_MIN;
      assert_ne!(segment_id(ts, 15), segment_id(ts, 30));
   }

   proptest::proptest! {
      #[test]
      fn segment_id_is_pure_for_any_timestamp(ts in 0i64..i64::MAX / 2, bucket in 1u32..120) {
         let a = segment_id(ts, bucket);
         let b = segment_id(ts, bucket);
         prop_assert_eq!(a, b);
      }
   }
}
