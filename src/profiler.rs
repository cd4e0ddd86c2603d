//! Profiler facade (C9): the process-wide singleton every instrumentation
//! call site talks to.
//!
//! Concurrency model: an `RwLock<Option<Arc<ActiveSession>>>` gives every
//! fast-path call a cheap read-lock-and-clone of the current session (or
//! `None` if inactive), while a separate mutex serializes only the
//! `start`/`stop` transitions themselves. A completion callback captures its
//! own `Arc<ActiveSession>` clone at region-start time rather than
//! re-reading the singleton, so a region that outlives a `stop()` call
//! still completes into the session it started in; its writer enqueue is a
//! silent no-op once that writer has shut down, which is exactly the
//! "release after the profiler went inactive is silently ignored" behavior
//! the facade promises.

use crate::clock::Clock;
use crate::collectors::{BugReporter, MemoryProfiler, ResourceEstimator, WorkerProcessMetricsCollector};
use crate::config::ProfilerConfig;
use crate::counters::{CounterSeries, BUCKET_DURATION_NANOS};
use crate::domain::errors::ProfilerError;
use crate::domain::types::{LaneId, Nanos, ProfilePhase, TaskType};
use crate::export::{EventWriter, WriterRecord};
use crate::handle::{TaskGuard, TaskStart};
use crate::histogram::{Histogram, HistogramSnapshot, PredicateCascade};
use crate::lanes::LaneAllocator;
use crate::sampler::{ResourceSampler, SamplerCapabilities};
use crate::task::{ActionTaskData, SlowTask, TaskData, ThreadMetadata};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use sysinfo::{Pid as SysPid, System};

thread_local! {
    static THREAD_LANE_ID: Cell<Option<u64>> = const { Cell::new(None) };
}
static NEXT_THREAD_LANE_ID: AtomicU64 = AtomicU64::new(0);

/// The calling thread's stable lane id, minted lazily on first use.
///
/// Disjoint from synthetic lane ids (which start at `1_000_000`), since this
/// counter starts at zero and a process will never accumulate a million
/// live threads.
fn current_thread_lane_id() -> u64 {
    THREAD_LANE_ID.with(|cell| {
        if let Some(id) = cell.get() {
            id
        } else {
            let id = NEXT_THREAD_LANE_ID.fetch_add(1, Ordering::Relaxed);
            cell.set(Some(id));
            id
        }
    })
}

fn check_description(description: &str) {
    debug_assert!(!description.is_empty(), "task description must not be empty");
}

/// Best-effort process CPU usage percentage, used only to compute a delta
/// for `processCpuTimeMaybe`. Missing on platforms `sysinfo` can't read;
/// callers treat `None` the same as "unsupported here".
fn process_cpu_reading() -> Option<f64> {
    let mut system = System::new();
    let pid = SysPid::from_u32(std::process::id());
    system.refresh_process(pid);
    system.process(pid).map(|process| f64::from(process.cpu_usage()))
}

/// The lane handed to an async task's future builder so nested
/// instrumentation inside it can tag itself with the task's allocated lane.
#[derive(Debug, Clone, Copy)]
pub struct ScopedProfiler {
    lane_id: LaneId,
}

impl ScopedProfiler {
    #[must_use]
    pub fn lane_id(&self) -> LaneId {
        self.lane_id
    }
}

/// Everything allocated by a single `start`/`stop` session. Wrapped in
/// `Arc` so fast-path readers and in-flight region handles can hold their
/// own reference without contending the facade's `RwLock` beyond a single
/// clone.
struct ActiveSession {
    clock: Arc<dyn Clock>,
    profile_start: Nanos,
    cpu_start: Option<f64>,
    enabled: HashSet<TaskType>,
    record_all_durations: bool,
    #[allow(dead_code)] // consulted by external trace-viewer tooling downstream, not by this crate
    slim_profile: bool,
    include_primary_output: bool,
    include_target_label: bool,
    collect_task_histograms: bool,
    histograms: HashMap<TaskType, Histogram>,
    vfs_cascades: HashMap<TaskType, PredicateCascade>,
    slowest: HashMap<TaskType, crate::slowest::SlowestTasks>,
    action_counts: CounterSeries,
    action_cache_counts: CounterSeries,
    lanes: LaneAllocator,
    writer: Arc<EventWriter>,
    sampler: ResourceSampler,
    memory_profiler: Arc<dyn MemoryProfiler>,
    dropped_by_min_duration: AtomicU64,
}

/// A derived summary of a session's activity, computed from counters C7/C9
/// already maintain — not a new subsystem, just numbers worth bundling
/// alongside the `"Finishing"` log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfilerStatistics {
    /// Events written to the sink.
    pub emitted: u64,
    /// Events that updated a histogram but were dropped by the
    /// min-duration filter (`recordAllDurations == false`).
    pub dropped_by_min_duration: u64,
    /// High-water mark of the writer's producer→consumer queue depth.
    pub queue_high_water_mark: usize,
}

/// Applies the recording policy to a completed region and, if it survives,
/// enqueues it to the writer. Always updates the histogram/cascade first
/// (per 4.8, histogram collection is independent of the min-duration
/// filter), only then decides whether to feed the slowest-task aggregator,
/// the counter series, and the writer.
/// Builds the per-VFS-type routing table: source-tree paths, build-output
/// paths, and external/third-party paths each get their own sub-histogram;
/// anything else falls through to the cascade's fallback recorder.
fn build_vfs_cascade(task_type: TaskType) -> PredicateCascade {
    let description = task_type.description();
    let mut cascade = PredicateCascade::new(format!("{description} (other)"));
    cascade.push(format!("{description} (external)"), Box::new(|path: &str| path.starts_with("external/") || path.contains("/external/") || path.starts_with("third_party/") || path.contains("/third_party/")));
    cascade.push(format!("{description} (output tree)"), Box::new(|path: &str| path.starts_with("out/") || path.contains("/out/") || path.starts_with("bin/") || path.contains("/bin/")));
    cascade.push(format!("{description} (source tree)"), Box::new(|path: &str| path.starts_with("src/") || path.contains("/src/")));
    cascade
}

#[allow(clippy::too_many_arguments)]
fn record_task(
    session: &ActiveSession,
    task_type: TaskType,
    description: String,
    lane_id: LaneId,
    os_thread_id: Option<LaneId>,
    start: Nanos,
    duration: Nanos,
    action: Option<ActionTaskData>,
) {
    let duration_millis = duration.0 / 1_000_000;

    if session.collect_task_histograms {
        if task_type.is_vfs() {
            if let Some(cascade) = session.vfs_cascades.get(&task_type) {
                cascade.add(&description, duration_millis);
            }
        } else if let Some(histogram) = session.histograms.get(&task_type) {
            histogram.add(duration_millis);
        }
    }

    if !session.record_all_durations && duration < task_type.min_duration() {
        session.dropped_by_min_duration.fetch_add(1, Ordering::Relaxed);
        return;
    }

    if task_type.collects_slowest_instances() {
        if let Some(aggregator) = session.slowest.get(&task_type) {
            let thread_id = current_thread_lane_id();
            aggregator.add(thread_id, SlowTask { duration, description: description.clone(), task_type });
        }
    }

    if task_type == TaskType::Action || (task_type == TaskType::Info && description == "discoverInputs") {
        session.action_counts.record(session.profile_start, start, duration);
    } else if task_type == TaskType::ActionCheck {
        session.action_cache_counts.record(session.profile_start, start, duration);
    }

    session.writer.enqueue(WriterRecord::Task(TaskData { lane_id, start, duration, task_type, description, action, os_thread_id }));
}

/// Process-wide profiler singleton. Obtain it via [`Profiler::instance`].
pub struct Profiler {
    session: RwLock<Option<Arc<ActiveSession>>>,
    start_stop_lock: Mutex<()>,
}

impl Profiler {
    /// Returns the process-wide instance, creating it (inactive) on first
    /// call.
    #[must_use]
    pub fn instance() -> &'static Profiler {
        static INSTANCE: OnceLock<Profiler> = OnceLock::new();
        INSTANCE.get_or_init(|| Profiler { session: RwLock::new(None), start_stop_lock: Mutex::new(()) })
    }

    fn active_session(&self) -> Option<Arc<ActiveSession>> {
        self.session.read().unwrap().clone()
    }

    /// Transitions inactive → active. Fails if already active; re-entering
    /// after `stop()` is always permitted and starts from a clean slate.
    pub fn start(&self, config: ProfilerConfig, clock: Arc<dyn Clock>) -> Result<(), ProfilerError> {
        let _guard = self.start_stop_lock.lock().unwrap();
        if self.session.read().unwrap().is_some() {
            return Err(ProfilerError::AlreadyActive);
        }

        let profile_start = clock.nanos();
        let cpu_start = process_cpu_reading();
        let enabled: HashSet<TaskType> = config.enabled_types.iter().copied().collect();

        let mut histograms = HashMap::new();
        let mut vfs_cascades = HashMap::new();
        let mut slowest = HashMap::new();
        for &task_type in TaskType::ALL {
            if task_type.is_vfs() {
                vfs_cascades.insert(task_type, build_vfs_cascade(task_type));
            } else {
                histograms.insert(task_type, Histogram::new(task_type.description()));
            }
            if task_type.collects_slowest_instances() {
                slowest.insert(task_type, crate::slowest::SlowestTasks::new());
            }
        }

        let bug_reporter = config.bug_reporter.clone();
        let writer = Arc::new(EventWriter::spawn(config.sink, config.format, profile_start, move |err| bug_reporter.report(&err)));

        let sampler = ResourceSampler::spawn(
            writer.clone(),
            clock.clone(),
            profile_start,
            config.sampler_caps,
            config.resource_estimator.clone(),
            config.worker_metrics_collector.clone(),
        );

        let session = Arc::new(ActiveSession {
            clock,
            profile_start,
            cpu_start,
            enabled,
            record_all_durations: config.record_all_durations,
            slim_profile: config.slim_profile,
            include_primary_output: config.include_primary_output,
            include_target_label: config.include_target_label,
            collect_task_histograms: config.collect_task_histograms,
            histograms,
            vfs_cascades,
            slowest,
            action_counts: CounterSeries::new(),
            action_cache_counts: CounterSeries::new(),
            lanes: LaneAllocator::new(),
            writer,
            sampler,
            memory_profiler: config.memory_profiler,
            dropped_by_min_duration: AtomicU64::new(0),
        });

        *self.session.write().unwrap() = Some(session);
        Ok(())
    }

    /// Transitions active → inactive. Idempotent: a second call is a no-op.
    /// Flushes the two counter series, joins the sampler, emits a final
    /// `"Finishing"` info event, then joins the writer.
    pub fn stop(&self) {
        let _guard = self.start_stop_lock.lock().unwrap();
        let Some(session) = self.session.write().unwrap().take() else {
            return;
        };

        let profile_end = session.clock.nanos();

        let action_values = session.action_counts.densify(session.profile_start, profile_end);
        session.writer.enqueue(WriterRecord::Counters {
            name: TaskType::ActionCounts.description(),
            start: Nanos(0),
            bucket_duration: Nanos(BUCKET_DURATION_NANOS),
            values: action_values,
        });

        let cache_values = session.action_cache_counts.densify(session.profile_start, profile_end);
        session.writer.enqueue(WriterRecord::Counters {
            name: TaskType::ActionCacheCounts.description(),
            start: Nanos(0),
            bucket_duration: Nanos(BUCKET_DURATION_NANOS),
            values: cache_values,
        });

        session.sampler.stop();

        session.writer.enqueue(WriterRecord::Task(TaskData {
            lane_id: LaneId(current_thread_lane_id()),
            start: profile_end,
            duration: Nanos(0),
            task_type: TaskType::Info,
            description: "Finishing".to_string(),
            action: None,
            os_thread_id: None,
        }));

        session.writer.shutdown();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.read().unwrap().is_some()
    }

    #[must_use]
    pub fn is_profiling(&self, task_type: TaskType) -> bool {
        self.active_session().is_some_and(|session| session.enabled.contains(&task_type))
    }

    /// Current clock reading if active, `None` otherwise.
    #[must_use]
    pub fn nano_time_maybe(&self) -> Option<Nanos> {
        self.active_session().map(|session| session.clock.nanos())
    }

    #[must_use]
    pub fn elapsed_time_maybe(&self) -> Option<Nanos> {
        self.active_session().map(|session| session.clock.nanos().saturating_since(session.profile_start))
    }

    #[must_use]
    pub fn process_cpu_time_maybe(&self) -> Option<f64> {
        let session = self.active_session()?;
        let start = session.cpu_start?;
        let now = process_cpu_reading()?;
        Some((now - start).max(0.0))
    }

    fn log_simple_task_inner(&self, session: &ActiveSession, task_type: TaskType, description: String, start: Nanos, duration: Nanos) {
        if !session.enabled.contains(&task_type) {
            return;
        }
        check_description(&description);
        let lane_id = LaneId(current_thread_lane_id());
        record_task(session, task_type, description, lane_id, None, start, duration, None);
    }

    /// Records an already-completed region, inferring `stop` from the
    /// current clock reading.
    pub fn log_simple_task(&self, start: Nanos, task_type: TaskType, description: impl Into<String>) {
        let Some(session) = self.active_session() else { return };
        let stop = session.clock.nanos();
        self.log_simple_task_inner(&session, task_type, description.into(), start, stop.saturating_since(start));
    }

    /// Records an already-completed region with an explicit stop timestamp.
    pub fn log_simple_task_with_stop(&self, start: Nanos, stop: Nanos, task_type: TaskType, description: impl Into<String>) {
        let Some(session) = self.active_session() else { return };
        self.log_simple_task_inner(&session, task_type, description.into(), start, stop.saturating_since(start));
    }

    /// Records an already-completed region with an explicit duration.
    pub fn log_simple_task_duration(&self, start: Nanos, duration: Nanos, task_type: TaskType, description: impl Into<String>) {
        let Some(session) = self.active_session() else { return };
        self.log_simple_task_inner(&session, task_type, description.into(), start, duration);
    }

    /// Records an instantaneous event at a specific timestamp.
    pub fn log_event_at_time(&self, at: Nanos, task_type: TaskType, description: impl Into<String>) {
        let Some(session) = self.active_session() else { return };
        self.log_simple_task_inner(&session, task_type, description.into(), at, Nanos(0));
    }

    /// Starts a region with an eagerly-computed description. Returns a
    /// no-op handle if the profiler is inactive or `task_type` is filtered.
    #[must_use]
    pub fn profile(&self, task_type: TaskType, description: impl Into<String>) -> TaskGuard {
        let description = description.into();
        self.profile_with(task_type, move || description)
    }

    /// Starts a region with a lazily-computed description. The supplier is
    /// never invoked if the profiler is inactive or `task_type` is
    /// filtered, avoiding the allocation entirely on the disabled path.
    #[must_use]
    pub fn profile_with(&self, task_type: TaskType, description: impl FnOnce() -> String) -> TaskGuard {
        let Some(session) = self.active_session() else { return TaskGuard::noop() };
        if !session.enabled.contains(&task_type) {
            return TaskGuard::noop();
        }

        let description = description();
        check_description(&description);
        let lane_id = LaneId(current_thread_lane_id());
        let start = session.clock.nanos();

        TaskGuard::new(
            TaskStart { task_type, description, lane_id, start, action: None },
            Box::new(move |task_start| {
                let end = session.clock.nanos();
                let duration = end.saturating_since(task_start.start);
                record_task(&session, task_start.task_type, task_start.description, task_start.lane_id, None, task_start.start, duration, task_start.action);
            }),
        )
    }

    /// Starts an action region. `primaryOutput`/`targetLabel` are kept only
    /// if the matching `include*` flag was set at `start`.
    #[must_use]
    pub fn profile_action(
        &self,
        task_type: TaskType,
        mnemonic: Option<String>,
        description: impl Into<String>,
        primary_output: Option<String>,
        target_label: Option<String>,
    ) -> TaskGuard {
        let Some(session) = self.active_session() else { return TaskGuard::noop() };
        if !session.enabled.contains(&task_type) {
            return TaskGuard::noop();
        }

        let description = description.into();
        check_description(&description);
        let primary_output = if session.include_primary_output { primary_output } else { None };
        let target_label = if session.include_target_label { target_label } else { None };
        let action = Some(ActionTaskData { mnemonic, primary_output_path: primary_output, target_label });
        let lane_id = LaneId(current_thread_lane_id());
        let start = session.clock.nanos();

        TaskGuard::new(
            TaskStart { task_type, description, lane_id, start, action },
            Box::new(move |task_start| {
                let end = session.clock.nanos();
                let duration = end.saturating_since(task_start.start);
                record_task(&session, task_start.task_type, task_start.description, task_start.lane_id, None, task_start.start, duration, task_start.action);
            }),
        )
    }

    /// Allocates a lane via the lane allocator, runs `future_builder` with a
    /// [`ScopedProfiler`] carrying that lane, and on completion records one
    /// task spanning the future's lifetime and releases the lane. If the
    /// profiler is inactive or `task_type` is filtered, the builder still
    /// runs (its output must still be produced) but against an inert
    /// scoped profiler that records nothing on completion.
    pub fn profile_async<T, Fut, B>(&self, task_type: TaskType, description: impl Into<String>, future_builder: B) -> impl Future<Output = T>
    where
        B: FnOnce(ScopedProfiler) -> Fut,
        Fut: Future<Output = T>,
    {
        let description = description.into();
        check_description(&description);

        let os_thread_id = LaneId(current_thread_lane_id());
        let session = self.active_session().filter(|session| session.enabled.contains(&task_type));

        let (lane_id, recorder) = match session {
            Some(session) => {
                let (lane_id, metadata) = session.lanes.acquire(task_type, Box::new(move |n| format!("{} #{n}", task_type.description())));
                if let Some(metadata) = metadata {
                    session.writer.enqueue(WriterRecord::Metadata(metadata));
                }
                let start = session.clock.nanos();
                (lane_id, Some((session, start)))
            }
            None => (os_thread_id, None),
        };

        let scoped = ScopedProfiler { lane_id };
        let fut = future_builder(scoped);

        async move {
            let result = fut.await;
            if let Some((session, start)) = recorder {
                let end = session.clock.nanos();
                let duration = end.saturating_since(start);
                let reported_thread = (lane_id != os_thread_id).then_some(os_thread_id);
                record_task(&session, task_type, description, lane_id, reported_thread, start, duration, None);
                session.lanes.release(task_type, lane_id);
            }
            result
        }
    }

    /// Emits a `PHASE` event and signals the injected memory profiler of a
    /// phase boundary. A no-op while inactive.
    pub fn mark_phase(&self, phase: ProfilePhase) {
        let Some(session) = self.active_session() else { return };
        if session.enabled.contains(&TaskType::Phase) {
            let lane_id = LaneId(current_thread_lane_id());
            let start = session.clock.nanos();
            session.writer.enqueue(WriterRecord::Task(TaskData {
                lane_id,
                start,
                duration: Nanos(0),
                task_type: TaskType::Phase,
                description: phase.description().to_string(),
                action: None,
                os_thread_id: None,
            }));
        }
        session.memory_profiler.mark_phase(phase);
    }

    /// Concatenates the top-K lists across every task type that opts into
    /// slowest-instance tracking. Empty while inactive.
    #[must_use]
    pub fn get_slowest_tasks(&self) -> Vec<SlowTask> {
        let Some(session) = self.active_session() else { return Vec::new() };
        session.slowest.values().flat_map(crate::slowest::SlowestTasks::merge).collect()
    }

    /// Snapshots every histogram and VFS predicate cascade. Empty while
    /// inactive.
    #[must_use]
    pub fn get_tasks_histograms(&self) -> Vec<HistogramSnapshot> {
        let Some(session) = self.active_session() else { return Vec::new() };
        let mut out: Vec<HistogramSnapshot> = session.histograms.values().map(Histogram::snapshot).collect();
        for cascade in session.vfs_cascades.values() {
            out.extend(cascade.snapshots());
        }
        out
    }

    /// A derived summary of the current session's activity: events written
    /// to the sink, events dropped by the min-duration filter, and the
    /// writer queue's high-water mark. Bundles numbers C7/C9 already track
    /// rather than introducing a new subsystem. `None` while inactive.
    #[must_use]
    pub fn statistics(&self) -> Option<ProfilerStatistics> {
        let session = self.active_session()?;
        let writer_stats = session.writer.statistics();
        Some(ProfilerStatistics {
            emitted: writer_stats.emitted,
            dropped_by_min_duration: session.dropped_by_min_duration.load(Ordering::Relaxed),
            queue_high_water_mark: writer_stats.queue_high_water_mark,
        })
    }

    /// Enqueues an arbitrary pre-built counter series to the writer,
    /// bypassing the facade's own action/action-check series. `start` is
    /// relative to `profileStart`, matching the convention the writer uses
    /// to timestamp every other counter bucket.
    pub fn log_counters(&self, name: &'static str, values: Vec<f64>, start: Nanos, bucket_duration: Nanos) {
        let Some(session) = self.active_session() else { return };
        session.writer.enqueue(WriterRecord::Counters { name, start, bucket_duration, values });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::collectors::{NullBugReporter, NullMemoryProfiler};
    use crate::config::ProfilerConfigBuilder;
    use crate::export::OutputFormat;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone)]
    struct SharedSink(Arc<StdMutex<Vec<u8>>>);
    impl std::io::Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.0.lock().unwrap().flush()
        }
    }

    fn fresh_profiler() -> Profiler {
        Profiler { session: RwLock::new(None), start_stop_lock: Mutex::new(()) }
    }

    fn start_with(profiler: &Profiler, buffer: Arc<StdMutex<Vec<u8>>>, clock: Arc<FakeClock>) {
        let config = ProfilerConfigBuilder::new(SharedSink(buffer))
            .bug_reporter(Arc::new(NullBugReporter))
            .memory_profiler(Arc::new(NullMemoryProfiler))
            .build();
        profiler.start(config, clock).unwrap();
    }

    fn parse(buffer: &Arc<StdMutex<Vec<u8>>>) -> serde_json::Value {
        let bytes = buffer.lock().unwrap().clone();
        serde_json::from_slice(&bytes).expect("writer output must be valid JSON")
    }

    #[test]
    fn disabled_profile_call_is_silent() {
        let profiler = fresh_profiler();
        let guard = profiler.profile(TaskType::Info, "x");
        assert!(guard.is_noop());
        drop(guard);
        assert!(!profiler.is_active());
    }

    #[test]
    fn start_fails_when_already_active() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer, clock.clone());

        let second_buffer = Arc::new(StdMutex::new(Vec::new()));
        let config = ProfilerConfigBuilder::new(SharedSink(second_buffer)).build();
        let result = profiler.start(config, clock);
        assert!(matches!(result, Err(ProfilerError::AlreadyActive)));

        profiler.stop();
    }

    #[test]
    fn round_trip_timestamps_and_duration() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer.clone(), clock.clone());

        clock.set(1_000_000);
        let guard = profiler.profile(TaskType::Info, "compiling widget");
        clock.set(1_500_000);
        guard.complete();

        profiler.stop();

        let parsed = parse(&buffer);
        let events = parsed.as_array().unwrap();
        let event = events.iter().find(|e| e["name"] == "compiling widget").expect("event present");
        assert_eq!(event["ts"], 1_000); // 1_000_000ns since profileStart, in microseconds
        assert_eq!(event["dur"], 500); // 500_000ns duration, in microseconds
        assert_eq!(event["cat"], "Info");
    }

    #[test]
    fn min_duration_filter_still_updates_histogram() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer.clone(), clock.clone());

        for duration_ms in [1, 5, 10, 20, 50] {
            let guard = profiler.profile(TaskType::VfsRead, "/src/lib.rs");
            clock.advance(duration_ms * 1_000_000);
            guard.complete();
        }

        let histograms = profiler.get_tasks_histograms();
        let total_samples: u64 = histograms.iter().map(|h| h.buckets.iter().sum::<u64>()).sum();
        assert_eq!(total_samples, 5);

        profiler.stop();

        let parsed = parse(&buffer);
        let duration_events = parsed.as_array().unwrap().iter().filter(|e| e["cat"] == "VFS read" && e["ph"] == "X").count();
        assert_eq!(duration_events, 3, "only durations >= 10ms should be enqueued");
    }

    #[test]
    fn top_k_across_shards_keeps_true_maximum() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer, clock.clone());

        for i in 0..200u64 {
            let guard = profiler.profile(TaskType::Action, format!("action-{i}"));
            clock.advance((i % 50) * 1_000_000);
            guard.complete();
            clock.set(0);
        }

        let slowest = profiler.get_slowest_tasks();
        assert_eq!(slowest.len(), 30);
        let max = slowest.iter().map(|t| t.duration.0).max().unwrap();
        assert_eq!(max, 49 * 1_000_000);

        profiler.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer, clock);

        profiler.stop();
        assert!(!profiler.is_active());
        profiler.stop();
        assert!(!profiler.is_active());
    }

    #[test]
    fn action_count_bucketing_covers_discover_inputs_alias() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer.clone(), clock.clone());

        let guard = profiler.profile(TaskType::Info, "discoverInputs");
        clock.advance(50_000_000);
        guard.complete();

        profiler.stop();

        let parsed = parse(&buffer);
        let counters = parsed.as_array().unwrap().iter().find(|e| e["name"] == TaskType::ActionCounts.description()).expect("action counts series present");
        let total: f64 = counters["args"].as_object().unwrap()[TaskType::ActionCounts.description()].as_f64().unwrap();
        assert!(total > 0.0);
    }

    #[test]
    fn empty_session_still_produces_valid_array() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer.clone(), clock);
        profiler.stop();

        let parsed = parse(&buffer);
        assert!(parsed.is_array());
    }

    #[test]
    fn statistics_counts_emitted_and_dropped_events() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer, clock.clone());

        // Below VfsRead's 10ms threshold: updates the histogram, dropped from the writer.
        let guard = profiler.profile(TaskType::VfsRead, "/src/lib.rs");
        clock.advance(1_000_000);
        guard.complete();

        // Above threshold: reaches the writer.
        let guard = profiler.profile(TaskType::VfsRead, "/src/lib.rs");
        clock.advance(20_000_000);
        guard.complete();

        let stats = profiler.statistics().expect("active session has statistics");
        assert_eq!(stats.dropped_by_min_duration, 1);
        assert!(stats.emitted >= 1);

        profiler.stop();
    }

    #[test]
    fn statistics_is_none_while_inactive() {
        let profiler = fresh_profiler();
        assert!(profiler.statistics().is_none());
    }

    #[test]
    fn vfs_cascade_routes_by_path_into_distinct_sub_histograms() {
        let profiler = fresh_profiler();
        let buffer = Arc::new(StdMutex::new(Vec::new()));
        let clock = Arc::new(FakeClock::new());
        start_with(&profiler, buffer, clock.clone());

        for (path, duration_ms) in [
            ("/repo/src/lib.rs", 11),
            ("/repo/out/lib.o", 22),
            ("/repo/external/crate/lib.rs", 33),
            ("/repo/README.md", 44),
        ] {
            let guard = profiler.profile(TaskType::VfsRead, path);
            clock.advance(duration_ms * 1_000_000);
            guard.complete();
            clock.set(0);
        }

        let histograms = profiler.get_tasks_histograms();
        let vfs_read: Vec<_> = histograms.iter().filter(|h| h.name.starts_with("VFS read")).collect();
        assert_eq!(vfs_read.len(), 4, "source/output/external/fallback sub-histograms");
        assert!(vfs_read.iter().all(|h| h.buckets.iter().sum::<u64>() == 1), "each path routes to exactly one row");

        profiler.stop();
    }
}
