//! Trace export (C7): the background writer that serializes recorded
//! events to Chrome Trace Event JSON, optionally gzip-compressed.

pub mod chrome_trace;

pub use chrome_trace::{EventWriter, OutputFormat, WriterRecord, WriterStatistics};
