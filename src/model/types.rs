//! Report entities shared by the capture, assembly and upload layers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::capture::log_buffer::LogEntry;
use crate::clock;

/// Final verdict of one test execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Excluded,
    Resolved,
    Undetermined,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Excluded => "excluded",
            Self::Resolved => "resolved",
            Self::Undetermined => "undetermined",
        }
    }

    /// Whether the report lifecycle may move from `self` to `next`.
    ///
    /// Everything starts undetermined; `failed` is sticky, and re-recording a
    /// failure is allowed so a later issue can replace the active error.
    pub fn can_transition_to(self, next: TestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Undetermined, Self::Failed)
                | (Self::Undetermined, Self::Excluded)
                | (Self::Undetermined, Self::Passed)
                | (Self::Failed, Self::Failed)
        )
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a recorded issue, as reported by the test runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    AssertionFailure,
    PerformanceRegression,
    System,
    ThrownError,
    UncaughtException,
    UnmatchedExpectedFailure,
    Other,
}

impl IssueKind {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::AssertionFailure => "Assertion Failure",
            Self::PerformanceRegression => "Performance Regression",
            Self::System => "Internal Failure",
            Self::ThrownError => "Error Thrown",
            Self::UncaughtException => "Uncaught Exception",
            Self::UnmatchedExpectedFailure => "Unmatched Expected Failure",
            Self::Other => "Issue",
        }
    }
}

/// Where in the test source an issue was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-based.
    pub line: u32,
}

/// An issue handed to the reporter by the test runtime.
#[derive(Debug, Clone)]
pub struct Issue {
    pub kind: IssueKind,
    pub description: String,
    pub location: Option<SourceLocation>,
}

impl Issue {
    pub fn new(kind: IssueKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            location: None,
        }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }
}

/// One numbered line of test source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeLine {
    pub line_number: u32,
    pub line_code: String,
}

impl CodeLine {
    pub fn new(line_number: u32, line_code: impl Into<String>) -> Self {
        Self {
            line_number,
            line_code: line_code.into(),
        }
    }
}

/// The failure attached to a report.
///
/// `code_context` travels as a top-level payload field, so it is not part of
/// the serialized error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    #[serde(rename = "error_type")]
    pub error_type: String,
    #[serde(rename = "error_msg")]
    pub message: String,
    #[serde(rename = "line_number", skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(rename = "invoked_func")]
    pub invoked_function: String,
    #[serde(rename = "code_executed", skip_serializing_if = "Option::is_none")]
    pub code_executed: Option<String>,
    #[serde(skip)]
    pub code_context: Option<Vec<CodeLine>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatteryState {
    Full,
    Charging,
    Unplugged,
}

/// Device and platform facts, all optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_simulator: Option<bool>,
    /// Diagonal, in inches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_rounded_display_corners: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_pixel_density: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_state: Option<BatteryState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_power_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
}

/// Diagnostic bundle for one test execution.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub name: String,
    pub filename: String,
    pub status: TestStatus,
    pub telemetry: DeviceTelemetry,
    /// Base64-encoded PNG.
    pub screenshot: Option<String>,
    /// Serialized hierarchy markup.
    pub view: Option<String>,
    pub error: Option<ErrorRecord>,
    pub log: Option<Vec<LogEntry>>,
    /// Uptime seconds at test start.
    pub start_time: f64,
    pub end_time: Option<f64>,
}

impl TestReport {
    /// Start a report now, in the undetermined state.
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        telemetry: DeviceTelemetry,
    ) -> Self {
        Self::started_at(name, filename, telemetry, clock::uptime_seconds())
    }

    pub fn started_at(
        name: impl Into<String>,
        filename: impl Into<String>,
        telemetry: DeviceTelemetry,
        start_time: f64,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            status: TestStatus::Undetermined,
            telemetry,
            screenshot: None,
            view: None,
            error: None,
            log: None,
            start_time,
            end_time: None,
        }
    }

    /// Whole milliseconds between start and end, once the report is finalized.
    pub fn elapsed_time_ms(&self) -> Option<u64> {
        self.end_time.map(|end| clock::elapsed_millis(self.start_time, end))
    }
}

/// Reduce a runner-provided name like `-[LoginTests testBadPassword]` to the
/// method name. Names in any other shape are returned trimmed.
pub fn format_test_method_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix("-[")
        .and_then(|rest| rest.strip_suffix(']'))
        && let Some((_, method)) = inner.split_once(' ')
    {
        return method.trim().to_string();
    }
    trimmed.to_string()
}
