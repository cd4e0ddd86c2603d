//! External collaborator traits consulted only by the resource sampler
//! (C8) or by `markPhase`. These model callers/collaborators, not
//! subsystems of the profiler itself; this module only defines the seams
//! the facade invokes them through, plus null-object defaults so callers
//! that don't care don't have to implement anything.

use crate::domain::errors::ExportError;
use crate::domain::types::ProfilePhase;

/// Arbitrary extra numbers the sampler should fold into the resource
/// counter series, e.g. a build-system-specific memory estimate.
pub trait ResourceEstimator: Send + Sync {
    /// Returns `(series_name, value)` pairs to emit this sampling tick.
    fn estimate(&self) -> Vec<(&'static str, f64)>;
}

/// Metrics about external worker processes (e.g. sandboxed action
/// executors) the sampler folds into the same counter-series stream.
pub trait WorkerProcessMetricsCollector: Send + Sync {
    fn collect(&self) -> Vec<(&'static str, f64)>;
}

/// Receives I/O failures from the writer or sampler threads. The profiler
/// transitions to inactive on such a failure but never propagates it to
/// unrelated call sites (see the error handling design); this is the one
/// channel by which the failure becomes observable.
pub trait BugReporter: Send + Sync {
    fn report(&self, error: &ExportError);
}

/// Signaled on `markPhase`; an external memory profiler that wants to
/// align its own sampling to build-phase boundaries.
pub trait MemoryProfiler: Send + Sync {
    fn mark_phase(&self, phase: ProfilePhase);
}

/// A `BugReporter` that only logs via the `log` facade.
pub struct NullBugReporter;

impl BugReporter for NullBugReporter {
    fn report(&self, error: &ExportError) {
        log::error!("buildprof: unreported failure: {error}");
    }
}

/// A `MemoryProfiler` that does nothing; the default when no external
/// memory profiler is wired up.
pub struct NullMemoryProfiler;

impl MemoryProfiler for NullMemoryProfiler {
    fn mark_phase(&self, _phase: ProfilePhase) {}
}
