//! Lane allocator (C6): mints and recycles virtual track ids for async
//! tasks so a trace visualizer can draw them as independent lanes.

use crate::domain::types::{LaneId, TaskType, FIRST_SYNTHETIC_LANE_ID, SYNTHETIC_LANE_SORT_INDEX};
use crate::task::ThreadMetadata;
use std::collections::BinaryHeap;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A printf-style lane-name template for a task type, e.g. `"Action #{}"`.
/// Kept as a plain closure so callers can format however they like.
pub type LaneNameFormatter = Box<dyn Fn(u64) -> String + Send + Sync>;

struct PerTypeState {
    free_list: BinaryHeap<Reverse<u64>>,
    next_ordinal: u64,
    formatter: LaneNameFormatter,
}

/// Per-`TaskType` pool of integer lane ids for async tasks.
///
/// `nextLaneId` is a single counter shared across all task types so lanes
/// stay globally unique; the free list (smallest id first) is per type so
/// a released `Action` lane is only ever handed back out to another
/// `Action` task, keeping lane naming coherent.
pub struct LaneAllocator {
    next_lane_id: AtomicU64,
    per_type: Mutex<HashMap<TaskType, PerTypeState>>,
}

impl LaneAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_lane_id: AtomicU64::new(FIRST_SYNTHETIC_LANE_ID),
            per_type: Mutex::new(HashMap::new()),
        }
    }

    fn register_if_absent(&self, task_type: TaskType, formatter: LaneNameFormatter, per_type: &mut HashMap<TaskType, PerTypeState>) {
        per_type.entry(task_type).or_insert_with(|| PerTypeState {
            free_list: BinaryHeap::new(),
            next_ordinal: 0,
            formatter,
        });
    }

    /// Acquires a lane for `task_type`, returning the lane id and, if a
    /// fresh id had to be minted, the [`ThreadMetadata`] record the writer
    /// must emit exactly once for it.
    pub fn acquire(&self, task_type: TaskType, formatter: LaneNameFormatter) -> (LaneId, Option<ThreadMetadata>) {
        let mut per_type = self.per_type.lock().unwrap();
        self.register_if_absent(task_type, formatter, &mut per_type);
        let state = per_type.get_mut(&task_type).unwrap();

        if let Some(Reverse(id)) = state.free_list.pop() {
            return (LaneId(id), None);
        }

        let lane_id = self.next_lane_id.fetch_add(1, Ordering::SeqCst);
        let ordinal = state.next_ordinal;
        state.next_ordinal += 1;
        let display_name = (state.formatter)(ordinal);

        (
            LaneId(lane_id),
            Some(ThreadMetadata { lane_id: LaneId(lane_id), display_name, sort_index: SYNTHETIC_LANE_SORT_INDEX }),
        )
    }

    /// Releases `lane_id` back to `task_type`'s free list. Callers must
    /// release exactly once; there is no reference counting.
    pub fn release(&self, task_type: TaskType, lane_id: LaneId) {
        let mut per_type = self.per_type.lock().unwrap();
        if let Some(state) = per_type.get_mut(&task_type) {
            state.free_list.push(Reverse(lane_id.0));
        }
    }
}

impl Default for LaneAllocator {
    fn default() -> Self {
        Self::new()
    }
}
