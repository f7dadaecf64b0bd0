//! Capture of transient diagnostic state: console output and test source.
//!
//! Everything here is best-effort. A capture that can't be completed degrades
//! to an absent value and a warning; it never fails the test or the report.

pub mod console_tee;
pub mod line_reader;
pub mod log_buffer;
pub mod source_context;

use thiserror::Error;

pub use console_tee::ConsoleTee;
pub use line_reader::LineStreamReader;
pub use log_buffer::{LogEntry, LogLevel, LogRingBuffer, LogSource};
pub use source_context::{SourceContext, SourceContextExtractor};

/// Errors raised while installing or removing a capture.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("console capture is not supported on this platform")]
    Unsupported,

    #[error("console capture is already active elsewhere in this process")]
    AlreadyActive,

    #[error("failed to {op} for console capture: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn console reader thread: {0}")]
    ReaderSpawn(std::io::Error),
}
