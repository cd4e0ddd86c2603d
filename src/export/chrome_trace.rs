//! Chrome Trace Event JSON writer (C7).
//!
//! A single background thread drains a wait-free MPSC queue and emits one
//! JSON object per dequeued record. The output framing is a single
//! top-level JSON array: `[` is written when the writer starts, `]` when
//! it shuts down. Producers never block: [`crossbeam_channel`]'s unbounded
//! sender is wait-free, matching the "slowing the traced program is worse
//! than dropping accuracy" backpressure policy.

use crate::domain::errors::ExportError;
use crate::domain::types::{LaneId, Nanos, TaskType};
use crate::task::{TaskData, ThreadMetadata};
use crossbeam_channel::{unbounded, Sender};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::warn;
use serde_json::{json, Value as JsonValue};
use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;

/// Reserved `tid` used for `CriticalPathComponent` events; disjoint from
/// both OS thread ids and the synthetic lane range (which starts at
/// `1_000_000`), so a trace viewer can give it a dedicated track.
pub const CRITICAL_PATH_RESERVED_LANE: u64 = 0;

/// Whether the writer wraps its sink in a gzip encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonGzip,
}

/// One item the writer thread can dequeue.
pub enum WriterRecord {
    Task(TaskData),
    Metadata(ThreadMetadata),
    /// A densified counter series: `name` is the series' `TaskType`
    /// description, `values[i]` is the count in bucket `i`, and
    /// `bucket_duration` / `start` let the writer compute each bucket's
    /// timestamp.
    Counters { name: &'static str, start: Nanos, bucket_duration: Nanos, values: Vec<f64> },
    /// A single resource-sampler tick: one or more named numeric series
    /// sharing a timestamp, e.g. `[("cpu_pct", 42.0), ("load1", 1.3)]`.
    ResourceSample { name: &'static str, ts: Nanos, values: Vec<(&'static str, f64)> },
}

enum Message {
    Record(WriterRecord),
    Shutdown,
}

fn task_to_json(task: &TaskData, profile_start: Nanos) -> JsonValue {
    let ts = task.start.saturating_since(profile_start).as_micros();
    let mut obj = serde_json::Map::new();
    obj.insert("cat".into(), json!(task.task_type.description()));
    obj.insert("name".into(), json!(task.description));
    obj.insert("ts".into(), json!(ts));
    obj.insert("pid".into(), json!(1));

    let mut args = serde_json::Map::new();

    if task.task_type == TaskType::CriticalPathComponent {
        obj.insert("tid".into(), json!(CRITICAL_PATH_RESERVED_LANE));
        args.insert("tid".into(), json!(task.lane_id.0));
    } else {
        obj.insert("tid".into(), json!(task.lane_id.0));
        if let Some(os_thread_id) = task.os_thread_id {
            args.insert("tid".into(), json!(os_thread_id.0));
        }
    }

    if task.is_instantaneous() {
        obj.insert("ph".into(), json!("i"));
    } else {
        obj.insert("ph".into(), json!("X"));
        obj.insert("dur".into(), json!(task.duration.as_micros()));
    }

    if let Some(action) = &task.action {
        if let Some(out) = &action.primary_output_path {
            obj.insert("out".into(), json!(out));
        }
        if let Some(target) = &action.target_label {
            args.insert("target".into(), json!(target));
        }
        if let Some(mnemonic) = &action.mnemonic {
            args.insert("mnemonic".into(), json!(mnemonic));
        }
    }

    if !args.is_empty() {
        obj.insert("args".into(), JsonValue::Object(args));
    }

    JsonValue::Object(obj)
}

fn metadata_to_json(meta: &ThreadMetadata) -> Vec<JsonValue> {
    vec![
        json!({
            "name": "thread_name",
            "ph": "M",
            "pid": 1,
            "tid": meta.lane_id.0,
            "ts": 0,
            "args": { "name": meta.display_name },
        }),
        json!({
            "name": "thread_sort_index",
            "ph": "M",
            "pid": 1,
            "tid": meta.lane_id.0,
            "ts": 0,
            "args": { "sort_index": meta.sort_index },
        }),
    ]
}

fn counters_to_json(name: &str, start: Nanos, bucket_duration: Nanos, values: &[f64]) -> Vec<JsonValue> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let ts = start.as_micros() + (i as u64) * bucket_duration.as_micros();
            let mut args = serde_json::Map::new();
            args.insert(name.to_string(), json!(value));
            json!({
                "name": name,
                "ph": "C",
                "pid": 1,
                "tid": 0,
                "ts": ts,
                "args": args,
            })
        })
        .collect()
}

fn resource_sample_to_json(name: &str, ts: Nanos, values: &[(&'static str, f64)]) -> JsonValue {
    let mut args = serde_json::Map::new();
    for (key, value) in values {
        args.insert((*key).to_string(), json!(value));
    }
    json!({
        "name": name,
        "ph": "C",
        "pid": 1,
        "tid": 0,
        "ts": ts.as_micros(),
        "args": args,
    })
}

/// A point-in-time summary of writer activity, backing
/// [`crate::profiler::Profiler::statistics`]. Bundles numbers the writer
/// already tracks for its own bookkeeping rather than introducing a new
/// subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterStatistics {
    /// Records successfully serialized to the sink.
    pub emitted: u64,
    /// High-water mark of the producer→consumer queue depth, observed at
    /// enqueue time.
    pub queue_high_water_mark: usize,
}

/// The background writer owning the output sink.
pub struct EventWriter {
    sender: Sender<Message>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    emitted: std::sync::Arc<AtomicU64>,
    queue_high_water_mark: AtomicUsize,
}

impl EventWriter {
    /// Spawns the writer thread. `sink` is assumed to already be buffered
    /// (e.g. `BufWriter`); the writer never performs small unbuffered
    /// writes directly.
    pub fn spawn<W>(mut sink: W, format: OutputFormat, profile_start: Nanos, on_error: impl Fn(ExportError) + Send + 'static) -> Self
    where
        W: Write + Send + 'static,
    {
        let (sender, receiver) = unbounded::<Message>();
        let emitted = std::sync::Arc::new(AtomicU64::new(0));
        let thread_emitted = emitted.clone();

        let handle = std::thread::Builder::new()
            .name("buildprof-writer".into())
            .spawn(move || {
                let write_result: Result<(), ExportError> = (|| {
                    let mut first = true;
                    let mut gz = match format {
                        OutputFormat::JsonGzip => Some(GzEncoder::new(&mut sink, Compression::default())),
                        OutputFormat::Json => None,
                    };

                    macro_rules! out {
                        () => {
                            match &mut gz {
                                Some(encoder) => encoder as &mut dyn Write,
                                None => &mut sink as &mut dyn Write,
                            }
                        };
                    }

                    write!(out!(), "[")?;

                    loop {
                        match receiver.recv() {
                            Ok(Message::Record(record)) => {
                                let values: Vec<JsonValue> = match record {
                                    WriterRecord::Task(task) => vec![task_to_json(&task, profile_start)],
                                    WriterRecord::Metadata(meta) => metadata_to_json(&meta),
                                    WriterRecord::Counters { name, start, bucket_duration, values } => {
                                        counters_to_json(name, start, bucket_duration, &values)
                                    }
                                    WriterRecord::ResourceSample { name, ts, values } => {
                                        vec![resource_sample_to_json(name, ts, &values)]
                                    }
                                };
                                for value in values {
                                    if !first {
                                        write!(out!(), ",")?;
                                    }
                                    first = false;
                                    serde_json::to_writer(out!(), &value)?;
                                    thread_emitted.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            Ok(Message::Shutdown) | Err(_) => break,
                        }
                    }

                    write!(out!(), "]")?;
                    if let Some(encoder) = gz {
                        encoder.finish()?;
                    }
                    sink.flush()?;
                    Ok(())
                })();

                if let Err(err) = write_result {
                    warn!("buildprof writer failed: {err}");
                    on_error(err);
                }
            })
            .expect("failed to spawn buildprof writer thread");

        Self { sender, handle: std::sync::Mutex::new(Some(handle)), emitted, queue_high_water_mark: AtomicUsize::new(0) }
    }

    /// Enqueues a record. Wait-free: never blocks the caller even if the
    /// writer is slow or the sink is gone (the message is simply dropped
    /// once the receiver end is closed).
    pub fn enqueue(&self, record: WriterRecord) {
        let _ = self.sender.send(Message::Record(record));
        let depth = self.sender.len();
        self.queue_high_water_mark.fetch_max(depth, Ordering::Relaxed);
    }

    /// A point-in-time snapshot of writer activity; backs
    /// [`crate::profiler::Profiler::statistics`].
    #[must_use]
    pub fn statistics(&self) -> WriterStatistics {
        WriterStatistics {
            emitted: self.emitted.load(Ordering::Relaxed),
            queue_high_water_mark: self.queue_high_water_mark.load(Ordering::Relaxed),
        }
    }

    /// Sets the termination sentinel and joins the worker, flushing and
    /// closing the sink. `&self` rather than `self` because the writer is
    /// shared via `Arc` with in-flight producers; idempotent because the
    /// join handle is taken at most once.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LaneId;
    use std::sync::{Arc, Mutex};

    fn sample_task(start_ns: u64, duration_ns: u64) -> TaskData {
        TaskData {
            lane_id: LaneId(7),
            start: Nanos(start_ns),
            duration: Nanos(duration_ns),
            task_type: TaskType::Info,
            description: "x".into(),
            action: None,
            os_thread_id: None,
        }
    }

    #[test]
    fn emits_well_formed_json_array() {
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));

        struct SharedSink(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                self.0.lock().unwrap().flush()
            }
        }

        let writer = EventWriter::spawn(SharedSink(buffer.clone()), OutputFormat::Json, Nanos(1_000_000), |_| {});
        writer.enqueue(WriterRecord::Task(sample_task(1_500_000, 0)));
        writer.shutdown();

        let bytes = buffer.lock().unwrap().clone();
        let parsed: JsonValue = serde_json::from_slice(&bytes).expect("valid JSON");
        let arr = parsed.as_array().expect("top-level array");
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["ts"], 500);
        assert_eq!(arr[0]["ph"], "i");
        assert_eq!(arr[0]["cat"], "Info");
    }

    #[test]
    fn empty_stream_is_still_a_valid_array() {
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        struct SharedSink(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                self.0.lock().unwrap().flush()
            }
        }

        let writer = EventWriter::spawn(SharedSink(buffer.clone()), OutputFormat::Json, Nanos(0), |_| {});
        writer.shutdown();

        let bytes = buffer.lock().unwrap().clone();
        let parsed: JsonValue = serde_json::from_slice(&bytes).expect("valid JSON even with zero events");
        assert_eq!(parsed.as_array().unwrap().len(), 0);
    }

    #[test]
    fn critical_path_events_use_reserved_tid() {
        let task = TaskData {
            lane_id: LaneId(42),
            start: Nanos(0),
            duration: Nanos(1_000),
            task_type: TaskType::CriticalPathComponent,
            description: "cp".into(),
            action: None,
            os_thread_id: None,
        };
        let json = task_to_json(&task, Nanos(0));
        assert_eq!(json["tid"], CRITICAL_PATH_RESERVED_LANE);
        assert_eq!(json["args"]["tid"], 42);
    }

    #[test]
    fn async_task_on_synthetic_lane_keeps_os_thread_id_in_args() {
        let task = TaskData {
            lane_id: LaneId(1_000_000),
            start: Nanos(0),
            duration: Nanos(7_000_000),
            task_type: TaskType::Action,
            description: "job".into(),
            action: None,
            os_thread_id: Some(LaneId(3)),
        };
        let json = task_to_json(&task, Nanos(0));
        assert_eq!(json["tid"], 1_000_000);
        assert_eq!(json["args"]["tid"], 3);
    }

    #[test]
    fn duration_event_includes_dur_field() {
        let task = sample_task(0, 5_000_000);
        let json = task_to_json(&task, Nanos(0));
        assert_eq!(json["ph"], "X");
        assert_eq!(json["dur"], 5_000);
    }

    #[test]
    fn gzip_output_round_trips() {
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        struct SharedSink(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                self.0.lock().unwrap().flush()
            }
        }

        let writer = EventWriter::spawn(SharedSink(buffer.clone()), OutputFormat::JsonGzip, Nanos(0), |_| {});
        writer.enqueue(WriterRecord::Task(sample_task(0, 0)));
        writer.shutdown();

        let bytes = buffer.lock().unwrap().clone();
        assert_eq!(&bytes[0..2], &[0x1f, 0x8b], "gzip magic bytes");

        let mut decoder = flate2::read::GzDecoder::new(&bytes[..]);
        let mut decompressed = String::new();
        std::io::Read::read_to_string(&mut decoder, &mut decompressed).unwrap();
        let parsed: JsonValue = serde_json::from_str(&decompressed).unwrap();
        assert!(parsed.is_array());
    }

    #[test]
    fn statistics_counts_emitted_records() {
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        struct SharedSink(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                self.0.lock().unwrap().flush()
            }
        }

        let writer = EventWriter::spawn(SharedSink(buffer), OutputFormat::Json, Nanos(0), |_| {});
        writer.enqueue(WriterRecord::Task(sample_task(0, 0)));
        writer.enqueue(WriterRecord::Task(sample_task(1, 0)));
        writer.shutdown();

        assert_eq!(writer.statistics().emitted, 2);
    }
}
