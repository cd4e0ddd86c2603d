//! Fixed-width duration histograms (C3).
//!
//! One histogram per non-VFS task type. VFS types fan out through a
//! predicate cascade: an ordered list of `(predicate, sub-recorder)` pairs,
//! where the first matching predicate routes the sample. Each row is
//! independently `Mutex`-guarded; contention is tolerable since updates are
//! rare per call site relative to the rest of the fast path.

use std::sync::Mutex;

/// Number of fixed-width buckets per histogram, keyed on
/// `floor(duration_millis)`, with the last bucket catching every overflow.
pub const BUCKET_COUNT: usize = 20;

/// A single fixed-width histogram over millisecond durations.
#[derive(Debug)]
pub struct Histogram {
    name: String,
    buckets: Mutex<[u64; BUCKET_COUNT]>,
}

/// Immutable point-in-time view of a histogram, safe to hand to callers of
/// `getTasksHistograms`.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    pub name: String,
    pub buckets: [u64; BUCKET_COUNT],
}

impl Histogram {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), buckets: Mutex::new([0; BUCKET_COUNT]) }
    }

    /// Records a sample. `duration_millis` is clamped into the last bucket
    /// if it exceeds `BUCKET_COUNT - 1`.
    pub fn add(&self, duration_millis: u64) {
        let bucket = (duration_millis as usize).min(BUCKET_COUNT - 1);
        let mut buckets = self.buckets.lock().unwrap();
        buckets[bucket] += 1;
    }

    /// Only meaningful while the owning profiler is active.
    #[must_use]
    pub fn snapshot(&self) -> HistogramSnapshot {
        let buckets = *self.buckets.lock().unwrap();
        HistogramSnapshot { name: self.name.clone(), buckets }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A predicate used by the VFS predicate cascade to route a sample to a
/// sub-recorder based on the path it names.
pub type PathPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// An ordered `(predicate, sub-recorder)` cascade for VFS task types: the
/// first predicate that matches `description` (treated as a path) receives
/// the sample. If none match, the sample is dropped from the histogram view
/// (it still contributes to the overall event stream).
pub struct PredicateCascade {
    rows: Vec<(PathPredicate, Histogram)>,
    fallback: Histogram,
}

impl PredicateCascade {
    #[must_use]
    pub fn new(fallback_name: impl Into<String>) -> Self {
        Self { rows: Vec::new(), fallback: Histogram::new(fallback_name) }
    }

    pub fn push(&mut self, name: impl Into<String>, predicate: PathPredicate) {
        self.rows.push((predicate, Histogram::new(name)));
    }

    pub fn add(&self, path: &str, duration_millis: u64) {
        for (predicate, histogram) in &self.rows {
            if predicate(path) {
                histogram.add(duration_millis);
                return;
            }
        }
        self.fallback.add(duration_millis);
    }

    pub fn snapshots(&self) -> Vec<HistogramSnapshot> {
        let mut out: Vec<_> = self.rows.iter().map(|(_, h)| h.snapshot()).collect();
        out.push(self.fallback.snapshot());
        out
    }
}
