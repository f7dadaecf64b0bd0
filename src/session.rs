//! Per-test lifecycle hooks tying capture, assembly and delivery together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::capture::console_tee::ConsoleTee;
use crate::capture::log_buffer::{LogEntry, LogRingBuffer};
use crate::capture::source_context::SourceContextExtractor;
use crate::config::ReporterConfig;
use crate::driver::{HostTelemetry, TelemetryProvider, UiDriver};
use crate::hierarchy::HierarchySerializer;
use crate::model::types::{Issue, TestReport, format_test_method_name};
use crate::report::{CaptureSource, ReportAssembler, error_record_for};
use crate::upload::client::{DeliveryClient, DeliveryOutcome, PendingDelivery};
use crate::upload::transport::Transport;

/// Diagnostics read live from the driver and the log buffer.
struct LiveCaptures<'a> {
    driver: Option<&'a dyn UiDriver>,
    logs: &'a LogRingBuffer,
    hierarchy: &'a HierarchySerializer,
}

impl CaptureSource for LiveCaptures<'_> {
    fn log_excerpt(&self) -> Option<Vec<LogEntry>> {
        Some(self.logs.excerpt())
    }

    fn screenshot(&self) -> Option<String> {
        let Some(driver) = self.driver else {
            warn!("screenshot: no UI driver attached");
            return None;
        };
        match driver.screenshot_png() {
            Ok(png) => Some(STANDARD.encode(png)),
            Err(e) => {
                warn!(error = %e, "screenshot: capture failed");
                None
            }
        }
    }

    fn hierarchy_markup(&self) -> Option<String> {
        let Some(driver) = self.driver else {
            warn!("hierarchy: no UI driver attached");
            return None;
        };
        Some(self.hierarchy.capture(driver))
    }
}

/// Builds and delivers one report per test.
///
/// The host calls [`on_start`](Self::on_start) before the test body,
/// [`on_issue_recorded`](Self::on_issue_recorded) for every failure, and
/// [`on_teardown`](Self::on_teardown) afterwards. Teardown never blocks for
/// longer than the configured upload timeout.
pub struct FailureReporter {
    config: ReporterConfig,
    caller_file: PathBuf,
    driver: Option<Box<dyn UiDriver>>,
    telemetry: Box<dyn TelemetryProvider>,
    transport: Option<Arc<dyn Transport>>,
    logs: Arc<LogRingBuffer>,
    tee: ConsoleTee,
    hierarchy: HierarchySerializer,
    extractor: SourceContextExtractor,
    invoked_function: String,
    assembler: Option<ReportAssembler>,
    last_report: Option<TestReport>,
}

impl FailureReporter {
    /// `caller_file` is the test's source file; its file name becomes the
    /// report's `test_filename`.
    pub fn new(config: ReporterConfig, caller_file: impl Into<PathBuf>) -> Self {
        let logs = Arc::new(LogRingBuffer::new());
        Self {
            config,
            caller_file: caller_file.into(),
            driver: None,
            telemetry: Box::new(HostTelemetry),
            transport: None,
            tee: ConsoleTee::new(logs.clone()),
            logs,
            hierarchy: HierarchySerializer::new(),
            extractor: SourceContextExtractor::new(),
            invoked_function: String::new(),
            assembler: None,
            last_report: None,
        }
    }

    pub fn with_driver(mut self, driver: impl UiDriver + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    pub fn with_telemetry(mut self, provider: impl TelemetryProvider + 'static) -> Self {
        self.telemetry = Box::new(provider);
        self
    }

    /// Deliver through `transport` instead of the HTTP client built from the
    /// config.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_hierarchy_serializer(mut self, serializer: HierarchySerializer) -> Self {
        self.hierarchy = serializer;
        self
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn log_buffer(&self) -> &Arc<LogRingBuffer> {
        &self.logs
    }

    pub fn is_capturing_console(&self) -> bool {
        self.tee.is_active()
    }

    /// The report currently being assembled.
    pub fn current_report(&self) -> Option<&TestReport> {
        self.assembler.as_ref().map(ReportAssembler::report)
    }

    /// The report finalized by the most recent teardown.
    pub fn last_report(&self) -> Option<&TestReport> {
        self.last_report.as_ref()
    }

    /// Begin a report for the test named `raw_test_name` by the runner.
    pub fn on_start(&mut self, raw_test_name: &str) {
        if self.assembler.is_some() {
            warn!("reporter: on_start called twice; discarding the unfinished report");
        }

        self.invoked_function = format_test_method_name(raw_test_name);
        let name = self
            .config
            .custom_test_name
            .clone()
            .unwrap_or_else(|| self.invoked_function.clone());

        if self.config.capture_console
            && let Err(e) = self.tee.start()
        {
            warn!(error = %e, "reporter: console capture unavailable");
        }

        self.assembler = Some(ReportAssembler::begin(
            name,
            test_filename_of(&self.caller_file),
            self.telemetry.telemetry(),
        ));
        debug!(test = %self.invoked_function, "reporter: test started");
    }

    /// Mark the test failed and capture diagnostics while the failing state is
    /// still on screen.
    pub fn on_issue_recorded(&mut self, issue: &Issue) {
        let Some(assembler) = self.assembler.as_mut() else {
            warn!("reporter: issue recorded before on_start; ignoring");
            return;
        };

        let context = issue
            .location
            .as_ref()
            .and_then(|loc| self.extractor.extract(&loc.file, loc.line));
        assembler.record_issue(error_record_for(issue, &self.invoked_function, context));

        let captures = LiveCaptures {
            driver: self.driver.as_deref(),
            logs: &self.logs,
            hierarchy: &self.hierarchy,
        };
        assembler.capture_now(&captures);
    }

    /// Restore the console, finalize the report and deliver it, waiting at
    /// most the configured upload timeout.
    pub fn on_teardown(&mut self) -> DeliveryOutcome {
        self.tee.stop();

        let Some(assembler) = self.assembler.take() else {
            warn!("reporter: teardown without a started report");
            return DeliveryOutcome::Skipped("no report was started".into());
        };

        let captures = LiveCaptures {
            driver: self.driver.as_deref(),
            logs: &self.logs,
            hierarchy: &self.hierarchy,
        };
        let mut report = assembler.finalize(self.config.excluded, &captures);
        if let Some(bundle_id) = &self.config.bundle_id {
            report.telemetry.bundle_id = Some(bundle_id.clone());
        }
        self.last_report = Some(report.clone());

        let Some(credentials) = self.config.credentials() else {
            warn!(
                test = %report.name,
                "reporter: API token or project id missing; report not uploaded"
            );
            return DeliveryOutcome::Skipped("missing API token or project id".into());
        };

        let pending: PendingDelivery = match &self.transport {
            Some(transport) => {
                DeliveryClient::with_transport(transport.clone(), &self.config, credentials)
                    .spawn(report)
            }
            None => match DeliveryClient::from_config(&self.config, credentials) {
                Ok(client) => client.spawn(report),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "reporter: cannot create upload client");
                    return DeliveryOutcome::Skipped(format!("{e:#}"));
                }
            },
        };
        pending.wait(self.config.upload_timeout)
    }
}

/// File name component of `path`.
pub fn test_filename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
