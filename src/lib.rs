//! In-process profiler core for a large build system.
//!
//! Instruments arbitrary code regions across many worker threads, classifies
//! each event by a [`domain::types::TaskType`], optionally tracks the
//! slowest instances per category, samples process-wide resource usage on a
//! background timer, and streams the resulting events to a trace file in
//! the Chrome Trace Event JSON format.
//!
//! The entry point is [`profiler::Profiler::instance`]. Every public
//! operation on the facade is safe to call whether or not the profiler is
//! currently active; when inactive, calls are no-ops on the fast path.

pub mod clock;
pub mod collectors;
pub mod config;
pub mod counters;
pub mod domain;
pub mod export;
pub mod handle;
pub mod histogram;
pub mod lanes;
pub mod profiler;
pub mod sampler;
pub mod slowest;
pub mod task;

pub use clock::{Clock, SystemClock};
pub use config::ProfilerConfig;
pub use domain::errors::{ExportError, ProfilerError};
pub use domain::types::{ProfilePhase, TaskType};
pub use handle::TaskGuard;
pub use profiler::{Profiler, ProfilerStatistics, ScopedProfiler};
pub use task::{ActionTaskData, TaskData, ThreadMetadata};
