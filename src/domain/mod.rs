//! Domain model for buildprof
//!
//! Core domain types and errors shared across every component:
//! - Compile-time safety via the newtype pattern (lane ids are not thread
//!   ids, nanoseconds are not microseconds)
//! - Self-documenting function signatures
//! - Structured error handling via `thiserror`

pub mod errors;
pub mod types;

pub use errors::{ExportError, ProfilerError};
pub use types::{LaneId, Nanos, ProfilePhase, TaskType};
