//! Normalized report model.

pub mod types;

pub use types::{
    BatteryState, CodeLine, DeviceTelemetry, ErrorRecord, Issue, IssueKind, SourceLocation,
    TestReport, TestStatus, format_test_method_name,
};
