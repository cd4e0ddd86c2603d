//! Fixed-bucket time-series counters (C5).
//!
//! Two independent series are tracked by the facade: action counts (events
//! of type `Action`, or `Info` with description `"discoverInputs"`) and
//! action-cache counts (`ActionCheck` events). Each series is a sparse,
//! append-only map from bucket index to accumulated weight; a range
//! `[start, end)` increments every bucket it overlaps by the fraction of
//! the range that falls in that bucket, so a long event's weight spreads
//! proportionally across the buckets it spans.

use crate::domain::types::Nanos;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Bucket width for every counter series.
pub const BUCKET_DURATION_NANOS: u64 = 200_000_000; // 200ms

/// A single counter time series.
#[derive(Default)]
pub struct CounterSeries {
    buckets: Mutex<BTreeMap<u64, f64>>,
}

impl CounterSeries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments every bucket overlapping `[start, start+duration)`
    /// relative to `profile_start`, by the fraction of the event's span
    /// that falls in each bucket. An instantaneous event (`duration == 0`)
    /// contributes a full `1.0` to the single bucket containing `start`.
    pub fn record(&self, profile_start: Nanos, start: Nanos, duration: Nanos) {
        let offset = start.0.saturating_sub(profile_start.0);
        let mut buckets = self.buckets.lock().unwrap();

        if duration.0 == 0 {
            let bucket = offset / BUCKET_DURATION_NANOS;
            *buckets.entry(bucket).or_insert(0.0) += 1.0;
            return;
        }

        let end_offset = offset + duration.0;
        let first_bucket = offset / BUCKET_DURATION_NANOS;
        let last_bucket = (end_offset.saturating_sub(1)) / BUCKET_DURATION_NANOS;

        for bucket in first_bucket..=last_bucket {
            let bucket_start = bucket * BUCKET_DURATION_NANOS;
            let bucket_end = bucket_start + BUCKET_DURATION_NANOS;
            let overlap_start = offset.max(bucket_start);
            let overlap_end = end_offset.min(bucket_end);
            let overlap = overlap_end.saturating_sub(overlap_start) as f64;
            let fraction = overlap / duration.0 as f64;
            *buckets.entry(bucket).or_insert(0.0) += fraction;
        }
    }

    /// Densifies the sparse map into a dense `Vec<f64>` covering
    /// `[profile_start, profile_end)`, of length
    /// `ceil((profile_end - profile_start) / BUCKET_DURATION_NANOS)`.
    #[must_use]
    pub fn densify(&self, profile_start: Nanos, profile_end: Nanos) -> Vec<f64> {
        let span = profile_end.0.saturating_sub(profile_start.0);
        let len = span.div_ceil(BUCKET_DURATION_NANOS) as usize;
        let buckets = self.buckets.lock().unwrap();
        let mut dense = vec![0.0; len];
        for (&bucket, &value) in buckets.iter() {
            if (bucket as usize) < len {
                dense[bucket as usize] = value;
            }
        }
        dense
    }
}
