//! Report lifecycle: undetermined until finalized, `failed` once any issue
//! is recorded.

use tracing::{debug, warn};

use crate::capture::log_buffer::LogEntry;
use crate::capture::source_context::SourceContext;
use crate::clock;
use crate::model::types::{DeviceTelemetry, ErrorRecord, Issue, TestReport, TestStatus};

/// Expensive diagnostics, fetched on demand.
pub trait CaptureSource {
    fn log_excerpt(&self) -> Option<Vec<LogEntry>>;

    /// Base64-encoded PNG of the screen.
    fn screenshot(&self) -> Option<String>;

    fn hierarchy_markup(&self) -> Option<String>;
}

/// Build the error record for `issue`, raised while running `invoked_function`.
pub fn error_record_for(
    issue: &Issue,
    invoked_function: &str,
    context: Option<SourceContext>,
) -> ErrorRecord {
    let (code_executed, code_context) = match context {
        Some(ctx) => (Some(ctx.executed), Some(ctx.lines)),
        None => (None, None),
    };
    ErrorRecord {
        error_type: issue.kind.display_name().to_string(),
        message: issue.description.clone(),
        line_number: issue.location.as_ref().map(|l| l.line),
        invoked_function: invoked_function.to_string(),
        code_executed,
        code_context,
    }
}

/// Accumulates one test's report between start and teardown.
#[derive(Debug)]
pub struct ReportAssembler {
    report: TestReport,
}

impl ReportAssembler {
    /// Start a report now.
    pub fn begin(
        name: impl Into<String>,
        filename: impl Into<String>,
        telemetry: DeviceTelemetry,
    ) -> Self {
        Self {
            report: TestReport::new(name, filename, telemetry),
        }
    }

    /// Continue from an existing, not yet finalized, report.
    pub fn resume(report: TestReport) -> Self {
        Self { report }
    }

    pub fn report(&self) -> &TestReport {
        &self.report
    }

    pub fn status(&self) -> TestStatus {
        self.report.status
    }

    fn transition(&mut self, next: TestStatus) -> bool {
        if self.report.status.can_transition_to(next) {
            self.report.status = next;
            true
        } else {
            false
        }
    }

    /// Mark the test failed with `error`, replacing any earlier error.
    pub fn record_issue(&mut self, error: ErrorRecord) {
        if self.transition(TestStatus::Failed) {
            self.report.error = Some(error);
        } else {
            warn!(status = %self.report.status, "report: ignoring issue for settled report");
        }
    }

    /// Capture diagnostics at the moment of failure, replacing earlier ones.
    pub fn capture_now(&mut self, source: &dyn CaptureSource) {
        self.report.log = source.log_excerpt();
        self.report.screenshot = source.screenshot();
        self.report.view = source.hierarchy_markup();
    }

    /// Stamp the end time, backfill empty diagnostics and settle the status.
    pub fn finalize(self, excluded: bool, source: &dyn CaptureSource) -> TestReport {
        self.finalize_at(excluded, source, clock::uptime_seconds())
    }

    pub fn finalize_at(
        mut self,
        excluded: bool,
        source: &dyn CaptureSource,
        end_time: f64,
    ) -> TestReport {
        self.report.end_time = Some(end_time);

        if self.report.log.is_none() {
            self.report.log = source.log_excerpt();
        }
        if self.report.screenshot.is_none() {
            self.report.screenshot = source.screenshot();
        }
        if self.report.view.is_none() {
            self.report.view = source.hierarchy_markup();
        }

        let settled = if excluded {
            TestStatus::Excluded
        } else {
            TestStatus::Passed
        };
        // failed is sticky
        self.transition(settled);

        debug!(
            name = %self.report.name,
            status = %self.report.status,
            elapsed_ms = ?self.report.elapsed_time_ms(),
            "report: finalized"
        );
        self.report
    }
}
