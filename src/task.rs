//! The event record produced by every completed profiled region.

use crate::domain::types::{LaneId, Nanos, TaskType};

/// A single recorded event.
///
/// Emitted at most once (see the profiler facade's recording policy):
/// events shorter than [`TaskType::min_duration`] are dropped unless
/// `recordAllDurations` is set, in which case every region still only
/// produces one `TaskData`.
#[derive(Debug, Clone)]
pub struct TaskData {
    pub lane_id: LaneId,
    pub start: Nanos,
    pub duration: Nanos,
    pub task_type: TaskType,
    /// Never empty; enforced at the call site (`profile`/`logSimpleTask`).
    pub description: String,
    pub action: Option<ActionTaskData>,
    /// The calling thread's own lane id, carried separately from `lane_id`
    /// when the two differ — i.e. for `profileAsync` tasks drawn onto a
    /// synthetic lane, so the writer can still correlate the event back to
    /// the OS thread that completed it. `None` for ordinary synchronous
    /// regions, where `lane_id` already is the OS thread's lane.
    pub os_thread_id: Option<LaneId>,
}

impl TaskData {
    /// `duration == 0` denotes an instantaneous event, which the writer
    /// emits with `ph: "i"` instead of `ph: "X"`.
    #[must_use]
    pub fn is_instantaneous(&self) -> bool {
        self.duration.0 == 0
    }

    #[must_use]
    pub fn end(&self) -> Nanos {
        Nanos(self.start.0 + self.duration.0)
    }
}

/// Extension fields recorded only for `profileAction` calls; all optional.
#[derive(Debug, Clone, Default)]
pub struct ActionTaskData {
    pub mnemonic: Option<String>,
    pub primary_output_path: Option<String>,
    pub target_label: Option<String>,
}

/// A lane-naming record, emitted once per allocated lane.
#[derive(Debug, Clone)]
pub struct ThreadMetadata {
    pub lane_id: LaneId,
    pub display_name: String,
    pub sort_index: i64,
}

/// One entry in a slowest-task aggregator, ordered by duration ascending so
/// a `BinaryHeap` of these keeps the *smallest* of the top-K at its head
/// (making eviction on overflow O(log K)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowTask {
    pub duration: Nanos,
    pub description: String,
    pub task_type: TaskType,
}

impl PartialOrd for SlowTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlowTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.duration.cmp(&other.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantaneous_event_has_zero_duration() {
        let task = TaskData {
            lane_id: LaneId(1),
            start: Nanos(10),
            duration: Nanos(0),
            task_type: TaskType::Info,
            description: "x".into(),
            action: None,
            os_thread_id: None,
        };
        assert!(task.is_instantaneous());
        assert_eq!(task.end(), Nanos(10));
    }

    #[test]
    fn slow_task_orders_by_duration() {
        let a = SlowTask { duration: Nanos(10), description: "a".into(), task_type: TaskType::Action };
        let b = SlowTask { duration: Nanos(20), description: "b".into(), task_type: TaskType::Action };
        assert!(a < b);
    }
}
