//! Reporter configuration: credentials, collector endpoint and timeouts.

use std::time::Duration;

/// Collector endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://www.tauk.com/api/v1/session/upload";

/// How long teardown waits for an upload before moving on.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(4);

/// Per-attempt HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_AUTOMATION_TYPE: &str = "XCTest";
const DEFAULT_LANGUAGE: &str = "Rust";

/// Configuration for a [`crate::session::FailureReporter`].
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Collector API token, sent as the `api_token` header.
    pub api_token: Option<String>,
    /// Collector project id, sent as the `project_id` header.
    pub project_id: Option<String>,
    /// Full upload URL.
    pub endpoint: String,
    /// Upper bound on how long teardown blocks on delivery.
    pub upload_timeout: Duration,
    /// Timeout applied to each individual HTTP attempt.
    pub request_timeout: Duration,
    /// Report the test as excluded unless it failed.
    pub excluded: bool,
    /// Overrides the name derived from the runner.
    pub custom_test_name: Option<String>,
    /// Bundle identifier stamped onto the telemetry at teardown.
    pub bundle_id: Option<String>,
    pub automation_type: String,
    pub language: String,
    /// Install the console tee at test start.
    pub capture_console: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            project_id: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            excluded: false,
            custom_test_name: None,
            bundle_id: None,
            automation_type: DEFAULT_AUTOMATION_TYPE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            capture_console: true,
        }
    }
}

impl ReporterConfig {
    /// Create a config carrying collector credentials, other fields defaulted.
    pub fn new(api_token: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_token: Some(api_token.into()),
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    /// Load config from environment variables (and a `.env` file if present).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(token) = dotenvy::var("UITEST_REPORT_API_TOKEN") {
            cfg.api_token = Some(token);
        }

        if let Ok(project) = dotenvy::var("UITEST_REPORT_PROJECT_ID") {
            cfg.project_id = Some(project);
        }

        if let Ok(endpoint) = dotenvy::var("UITEST_REPORT_ENDPOINT") {
            cfg.endpoint = endpoint;
        }

        if let Ok(val) = dotenvy::var("UITEST_REPORT_UPLOAD_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            cfg.upload_timeout = Duration::from_millis(ms);
        }

        if let Ok(val) = dotenvy::var("UITEST_REPORT_REQUEST_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            cfg.request_timeout = Duration::from_millis(ms);
        }

        if let Ok(val) = dotenvy::var("UITEST_REPORT_EXCLUDE") {
            cfg.excluded = parse_flag(&val);
        }

        if let Ok(bundle) = dotenvy::var("UITEST_REPORT_BUNDLE_ID") {
            cfg.bundle_id = Some(bundle);
        }

        if let Ok(val) = dotenvy::var("UITEST_REPORT_CAPTURE_CONSOLE") {
            cfg.capture_console = parse_flag(&val);
        }

        cfg
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_excluded(mut self, excluded: bool) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_custom_test_name(mut self, name: impl Into<String>) -> Self {
        self.custom_test_name = Some(name.into());
        self
    }

    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    pub fn with_console_capture(mut self, enabled: bool) -> Self {
        self.capture_console = enabled;
        self
    }

    /// Token and project id, if both are present and non-empty.
    pub fn credentials(&self) -> Option<Credentials> {
        let token = self.api_token.as_deref().filter(|t| !t.trim().is_empty())?;
        let project = self.project_id.as_deref().filter(|p| !p.trim().is_empty())?;
        Some(Credentials {
            api_token: token.to_string(),
            project_id: project.to_string(),
        })
    }
}

/// Identification attached to every upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_token: String,
    pub project_id: String,
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}
