//! Resource sampler (C8): a daemon background thread that periodically
//! reads process/OS counters and appends them as synthetic counter events
//! through the same writer path as every other recorded event.

use crate::clock::Clock;
use crate::collectors::{ResourceEstimator, WorkerProcessMetricsCollector};
use crate::domain::types::Nanos;
use crate::export::{EventWriter, WriterRecord};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration as StdDuration;
use sysinfo::{Networks, Pid as SysPid, System};

/// Sampling interval. Implementation-defined but stable across runs.
pub const SAMPLE_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Which optional metrics the sampler should read this run. Each flag maps
/// directly to one of the "optionally, per capability flag" bullets in the
/// resource sampler's design.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplerCapabilities {
    pub collect_worker_data: bool,
    pub collect_load_average: bool,
    pub collect_system_network: bool,
    pub collect_pressure_stall: bool,
    pub collect_resource_estimation: bool,
}

/// Handle to the running sampler thread.
pub struct ResourceSampler {
    stop_flag: Arc<AtomicBool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ResourceSampler {
    /// Spawns the sampler thread. Reads are best-effort: a missing OS API
    /// (e.g. PSI off Linux) simply omits that series rather than erroring.
    pub fn spawn(
        writer: Arc<EventWriter>,
        clock: Arc<dyn Clock>,
        profile_start: Nanos,
        caps: SamplerCapabilities,
        estimator: Option<Arc<dyn ResourceEstimator>>,
        worker_collector: Option<Arc<dyn WorkerProcessMetricsCollector>>,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop = stop_flag.clone();

        let handle = std::thread::Builder::new()
            .name("buildprof-sampler".into())
            .spawn(move || {
                let mut system = System::new();
                let pid = SysPid::from_u32(std::process::id());
                let mut networks = Networks::new_with_refreshed_list();

                while !thread_stop.load(Ordering::Relaxed) {
                    system.refresh_process(pid);
                    system.refresh_cpu_usage();

                    let mut values: Vec<(&'static str, f64)> = Vec::new();

                    if let Some(process) = system.process(pid) {
                        values.push(("process_cpu_pct", f64::from(process.cpu_usage())));
                    }

                    if caps.collect_load_average {
                        let load = System::load_average();
                        values.push(("load_avg_1", load.one));
                        values.push(("load_avg_5", load.five));
                        values.push(("load_avg_15", load.fifteen));
                    }

                    if caps.collect_system_network {
                        networks.refresh();
                        let mut rx_bytes = 0u64;
                        let mut tx_bytes = 0u64;
                        for (_interface, data) in &networks {
                            rx_bytes += data.received();
                            tx_bytes += data.transmitted();
                        }
                        values.push(("net_rx_bytes_per_sec", rx_bytes as f64));
                        values.push(("net_tx_bytes_per_sec", tx_bytes as f64));
                    }

                    if caps.collect_pressure_stall {
                        if let Some(memory_psi) = read_psi_avg10("/proc/pressure/memory") {
                            values.push(("psi_memory_avg10", memory_psi));
                        }
                        if let Some(io_psi) = read_psi_avg10("/proc/pressure/io") {
                            values.push(("psi_io_avg10", io_psi));
                        }
                    }

                    if caps.collect_resource_estimation {
                        if let Some(estimator) = &estimator {
                            values.extend(estimator.estimate());
                        }
                    }

                    if caps.collect_worker_data {
                        if let Some(collector) = &worker_collector {
                            values.extend(collector.collect());
                        }
                    }

                    if !values.is_empty() {
                        let ts = clock.nanos().saturating_since(profile_start);
                        writer.enqueue(WriterRecord::ResourceSample { name: "ResourceUsage", ts, values });
                    }

                    debug!("buildprof sampler tick");
                    std::thread::sleep(SAMPLE_INTERVAL);
                }
            })
            .expect("failed to spawn buildprof sampler thread");

        Self { stop_flag, handle: std::sync::Mutex::new(Some(handle)) }
    }

    /// Signals termination and joins the thread. Idempotent: a second call
    /// after the handle has already been taken is a no-op, which matters
    /// once `ResourceSampler` lives inside an `Arc`-shared session.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

/// Reads the `avg10` field of a Linux PSI file
/// (`/proc/pressure/{memory,io}`), e.g. `some avg10=0.00 avg60=0.00 ...`.
/// Returns `None` off Linux or if the file/field is absent.
fn read_psi_avg10(path: &str) -> Option<f64> {
    let contents = std::fs::read_to_string(path).ok()?;
    let some_line = contents.lines().find(|line| line.starts_with("some "))?;
    let avg10_field = some_line.split_whitespace().find(|field| field.starts_with("avg10="))?;
    avg10_field.strip_prefix("avg10=")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psi_parsing_handles_missing_file() {
        assert_eq!(read_psi_avg10("/nonexistent/path"), None);
    }

    #[test]
    fn psi_parsing_extracts_avg10() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory");
        std::fs::write(&path, "some avg10=1.23 avg60=2.00 avg300=3.00 total=100\nfull avg10=0.00 avg60=0.00 avg300=0.00 total=0\n").unwrap();
        let value = read_psi_avg10(path.to_str().unwrap());
        assert_eq!(value, Some(1.23));
    }
}
