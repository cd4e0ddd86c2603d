//! Builder for everything threaded through `Profiler::start`.
//!
//! `start` has a couple dozen independent knobs; a builder over a struct of
//! named, defaulted fields reads far better than a long positional
//! parameter list.

use crate::collectors::{BugReporter, MemoryProfiler, NullBugReporter, NullMemoryProfiler, ResourceEstimator, WorkerProcessMetricsCollector};
use crate::domain::types::TaskType;
use crate::export::OutputFormat;
use crate::sampler::SamplerCapabilities;
use std::io::Write;
use std::sync::Arc;

/// Everything the profiler needs to start a session.
pub struct ProfilerConfig {
    pub(crate) enabled_types: Vec<TaskType>,
    pub(crate) sink: Box<dyn Write + Send>,
    pub(crate) format: OutputFormat,
    pub(crate) build_id: String,
    pub(crate) record_all_durations: bool,
    pub(crate) slim_profile: bool,
    pub(crate) include_primary_output: bool,
    pub(crate) include_target_label: bool,
    pub(crate) collect_task_histograms: bool,
    pub(crate) sampler_caps: SamplerCapabilities,
    pub(crate) resource_estimator: Option<Arc<dyn ResourceEstimator>>,
    pub(crate) worker_metrics_collector: Option<Arc<dyn WorkerProcessMetricsCollector>>,
    pub(crate) bug_reporter: Arc<dyn BugReporter>,
    pub(crate) memory_profiler: Arc<dyn MemoryProfiler>,
}

/// Builds a [`ProfilerConfig`]. `sink` is the only required field; every
/// other setting has a sensible default (all task types enabled,
/// uncompressed JSON, min-duration filtering on, histograms on).
pub struct ProfilerConfigBuilder {
    enabled_types: Vec<TaskType>,
    sink: Box<dyn Write + Send>,
    format: OutputFormat,
    build_id: String,
    record_all_durations: bool,
    slim_profile: bool,
    include_primary_output: bool,
    include_target_label: bool,
    collect_task_histograms: bool,
    sampler_caps: SamplerCapabilities,
    resource_estimator: Option<Arc<dyn ResourceEstimator>>,
    worker_metrics_collector: Option<Arc<dyn WorkerProcessMetricsCollector>>,
    bug_reporter: Arc<dyn BugReporter>,
    memory_profiler: Arc<dyn MemoryProfiler>,
}

impl ProfilerConfigBuilder {
    #[must_use]
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            enabled_types: TaskType::ALL.to_vec(),
            sink: Box::new(sink),
            format: OutputFormat::Json,
            build_id: String::new(),
            record_all_durations: false,
            slim_profile: false,
            include_primary_output: true,
            include_target_label: true,
            collect_task_histograms: true,
            sampler_caps: SamplerCapabilities::default(),
            resource_estimator: None,
            worker_metrics_collector: None,
            bug_reporter: Arc::new(NullBugReporter),
            memory_profiler: Arc::new(NullMemoryProfiler),
        }
    }

    #[must_use]
    pub fn enabled_types(mut self, types: Vec<TaskType>) -> Self {
        self.enabled_types = types;
        self
    }

    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = build_id.into();
        self
    }

    #[must_use]
    pub fn record_all_durations(mut self, value: bool) -> Self {
        self.record_all_durations = value;
        self
    }

    #[must_use]
    pub fn slim_profile(mut self, value: bool) -> Self {
        self.slim_profile = value;
        self
    }

    #[must_use]
    pub fn include_primary_output(mut self, value: bool) -> Self {
        self.include_primary_output = value;
        self
    }

    #[must_use]
    pub fn include_target_label(mut self, value: bool) -> Self {
        self.include_target_label = value;
        self
    }

    #[must_use]
    pub fn collect_task_histograms(mut self, value: bool) -> Self {
        self.collect_task_histograms = value;
        self
    }

    #[must_use]
    pub fn sampler_capabilities(mut self, caps: SamplerCapabilities) -> Self {
        self.sampler_caps = caps;
        self
    }

    #[must_use]
    pub fn resource_estimator(mut self, estimator: Arc<dyn ResourceEstimator>) -> Self {
        self.resource_estimator = Some(estimator);
        self
    }

    #[must_use]
    pub fn worker_metrics_collector(mut self, collector: Arc<dyn WorkerProcessMetricsCollector>) -> Self {
        self.worker_metrics_collector = Some(collector);
        self
    }

    #[must_use]
    pub fn bug_reporter(mut self, reporter: Arc<dyn BugReporter>) -> Self {
        self.bug_reporter = reporter;
        self
    }

    #[must_use]
    pub fn memory_profiler(mut self, profiler: Arc<dyn MemoryProfiler>) -> Self {
        self.memory_profiler = profiler;
        self
    }

    #[must_use]
    pub fn build(self) -> ProfilerConfig {
        ProfilerConfig {
            enabled_types: self.enabled_types,
            sink: self.sink,
            format: self.format,
            build_id: self.build_id,
            record_all_durations: self.record_all_durations,
            slim_profile: self.slim_profile,
            include_primary_output: self.include_primary_output,
            include_target_label: self.include_target_label,
            collect_task_histograms: self.collect_task_histograms,
            sampler_caps: self.sampler_caps,
            resource_estimator: self.resource_estimator,
            worker_metrics_collector: self.worker_metrics_collector,
            bug_reporter: self.bug_reporter,
            memory_profiler: self.memory_profiler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_task_type() {
        let config = ProfilerConfigBuilder::new(Vec::new()).build();
        assert_eq!(config.enabled_types.len(), TaskType::ALL.len());
    }

    #[test]
    fn defaults_are_uncompressed_json() {
        let config = ProfilerConfigBuilder::new(Vec::new()).build();
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = ProfilerConfigBuilder::new(Vec::new())
            .record_all_durations(true)
            .format(OutputFormat::JsonGzip)
            .build_id("abc123")
            .build();
        assert!(config.record_all_durations);
        assert_eq!(config.format, OutputFormat::JsonGzip);
        assert_eq!(config.build_id, "abc123");
    }
}
