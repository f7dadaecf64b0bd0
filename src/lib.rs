//! Failure diagnostics for automated UI test runs.
//!
//! When a test fails, this crate rebuilds a self-contained report from
//! transient in-process state (recent console output, the source lines around
//! the failing assertion, a snapshot of the on-screen UI tree, and host
//! telemetry) and delivers it to a remote collector without holding up the
//! rest of the suite.
//!
//! The entry point for a test harness is [`session::FailureReporter`], which
//! exposes the three lifecycle hooks a host runtime calls: `on_start`,
//! `on_issue_recorded` and `on_teardown`.

pub mod capture;
pub mod clock;
pub mod config;
pub mod driver;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod report;
pub mod session;
pub mod upload;

pub use config::ReporterConfig;
pub use session::FailureReporter;
pub use upload::client::DeliveryOutcome;
