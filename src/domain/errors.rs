//! Structured error types for buildprof
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Per the error handling design, nothing on the fast path (`profile`,
//! `logSimpleTask`, handle release) ever returns a `Result`: these types
//! only surface from `start`/`stop` misuse and from the writer/sampler
//! background threads, which report failures through
//! [`crate::collectors::BugReporter`] rather than propagating them to
//! unrelated call sites.

use thiserror::Error;

/// Misuse of the profiler lifecycle, or an invariant violated at a call site.
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("profiler is already active; call stop() before start()")]
    AlreadyActive,

    #[error("task description must not be empty")]
    EmptyDescription,

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Failures in the writer or sampler background threads.
///
/// These are reported to the injected [`crate::collectors::BugReporter`] and
/// transition the profiler to inactive; they are never returned to the
/// caller that triggered the recorded event.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to serialize trace event: {0}")]
    SerializationFailed(String),

    #[error("failed to write trace output: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_active_message() {
        let err = ProfilerError::AlreadyActive;
        assert!(err.to_string().contains("already active"));
    }

    #[test]
    fn export_error_wraps_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: ExportError = io_err.into();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn profiler_error_wraps_export_error() {
        let export = ExportError::WriteFailed("sink closed".to_string());
        let err: ProfilerError = export.into();
        assert!(err.to_string().contains("sink closed"));
    }
}
