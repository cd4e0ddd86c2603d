//! Sharded top-K slowest-task aggregators (C4).
//!
//! Per task type, a sharded max-K heap over [`SHARD_COUNT`] shards avoids a
//! single global lock on the hottest path: `add` only ever locks the shard
//! selected by `thread_id % SHARD_COUNT`. Merging at `stop` iterates every
//! shard and folds them into one aggregate top-K, which is O(shards * K).

use crate::task::SlowTask;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;

/// Number of shards per aggregator; a balance between contention and merge
/// cost. Tunable by an implementation.
pub const SHARD_COUNT: usize = 16;

/// How many of the largest durations are retained per task type.
pub const TOP_K: usize = 30;

/// A single shard: a bounded min-heap (via `Reverse`) over at most `TOP_K`
/// entries, so the smallest kept duration sits at the heap's head and can
/// be evicted in O(log K) when a larger sample arrives.
#[derive(Default)]
struct Shard {
    heap: BinaryHeap<Reverse<SlowTask>>,
}

impl Shard {
    fn add(&mut self, task: SlowTask) {
        if self.heap.len() < TOP_K {
            self.heap.push(Reverse(task));
        } else if let Some(Reverse(min)) = self.heap.peek() {
            if task.duration > min.duration {
                self.heap.pop();
                self.heap.push(Reverse(task));
            }
        }
    }
}

/// The sharded top-K aggregator for a single task type.
pub struct SlowestTasks {
    shards: Vec<Mutex<Shard>>,
}

impl SlowestTasks {
    #[must_use]
    pub fn new() -> Self {
        Self { shards: (0..SHARD_COUNT).map(|_| Mutex::new(Shard::default())).collect() }
    }

    /// Adds a candidate, sharded by `thread_id % SHARD_COUNT`. Only the
    /// selected shard's lock is taken.
    pub fn add(&self, thread_id: u64, task: SlowTask) {
        let shard = &self.shards[(thread_id as usize) % SHARD_COUNT];
        shard.lock().unwrap().add(task);
    }

    /// Merges every shard into a single top-[`TOP_K`] list, largest first.
    /// Called at `stop`; does not clear the shards (the whole aggregator is
    /// dropped along with the rest of the active session's state).
    #[must_use]
    pub fn merge(&self) -> Vec<SlowTask> {
        let mut all: Vec<SlowTask> = self
            .shards
            .iter()
            .flat_map(|shard| shard.lock().unwrap().heap.iter().map(|Reverse(t)| t.clone()).collect::<Vec<_>>())
            .collect();
        all.sort_by(|a, b| b.duration.cmp(&a.duration));
        all.truncate(TOP_K);
        all
    }
}

impl Default for SlowestTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Nanos, TaskType};

    fn task(duration_ms: u64, desc: &str) -> SlowTask {
        SlowTask { duration: Nanos(duration_ms * 1_000_000), description: desc.into(), task_type: TaskType::Action }
    }

    #[test]
    fn keeps_largest_across_shards() {
        let agg = SlowestTasks::new();
        // Spread 2000 events with random-ish durations across many "threads".
        for i in 0..2_000u64 {
            let duration = (i * 37) % 10_000; // 0..10000ms, not actually random but varied
            agg.add(i, task(duration, &format!("task-{i}")));
        }
        let top = agg.merge();
        assert_eq!(top.len(), TOP_K);
        // Must be sorted largest-first.
        for pair in top.windows(2) {
            assert!(pair[0].duration >= pair[1].duration);
        }
        // The global maximum must be present.
        let max_duration = (0..2_000u64).map(|i| (i * 37) % 10_000).max().unwrap();
        assert_eq!(top[0].duration, Nanos(max_duration * 1_000_000));
    }

    #[test]
    fn fewer_than_k_samples_returns_all() {
        let agg = SlowestTasks::new();
        agg.add(0, task(5, "only"));
        agg.add(1, task(10, "second"));
        let top = agg.merge();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].description, "second");
    }
}
