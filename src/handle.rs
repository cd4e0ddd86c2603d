//! Scoped region handle (C10).
//!
//! A single-shot, move-only value whose release records the completion of
//! a profiled region. Release happens either explicitly via
//! [`TaskGuard::complete`] or implicitly via `Drop`, so every exit path out
//! of an instrumented region — success, early return, or an error
//! propagated with `?` — still records the task exactly once.
//!
//! The no-op handle (used when the profiler is inactive, or the task type
//! is filtered out, at the moment `profile` was called) carries no
//! captured state; its release does nothing and costs nothing beyond the
//! branch that produced it.

use crate::domain::types::{LaneId, Nanos, TaskType};
use crate::task::ActionTaskData;

/// Everything captured at the start of a profiled region.
pub struct TaskStart {
    pub task_type: TaskType,
    pub description: String,
    pub lane_id: LaneId,
    pub start: Nanos,
    pub action: Option<ActionTaskData>,
}

type CompleteFn = Box<dyn FnOnce(TaskStart) + Send>;

/// A move-only guard for a single profiled region.
///
/// If the profiler transitions to inactive between a region's start and
/// its release, the captured completion callback itself is responsible for
/// noticing (it re-checks the profiler's active flag before enqueuing) —
/// the handle's release is then silently ignored beyond the duration
/// computation.
pub struct TaskGuard {
    inner: Option<(TaskStart, CompleteFn)>,
}

impl TaskGuard {
    pub(crate) fn new(start: TaskStart, complete: CompleteFn) -> Self {
        Self { inner: Some((start, complete)) }
    }

    /// A handle that records nothing on release. Returned by `profile`
    /// calls made while the profiler is inactive or the task type is
    /// filtered out.
    #[must_use]
    pub fn noop() -> Self {
        Self { inner: None }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }

    /// Explicitly completes the region now. Equivalent to dropping the
    /// guard, but lets a caller record completion before the guard's
    /// lexical scope ends.
    pub fn complete(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some((start, complete)) = self.inner.take() {
            complete(start);
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.finish();
    }
}
