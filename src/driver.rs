//! Capabilities the host runtime provides: the UI driver and device telemetry.

use std::process::Command;

use thiserror::Error;

use crate::hierarchy::traversal::UiElement;
use crate::model::types::DeviceTelemetry;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("UI driver unavailable: {0}")]
    Unavailable(String),

    #[error("screenshot failed: {0}")]
    Screenshot(String),

    #[error("debug description failed: {0}")]
    DebugDump(String),
}

/// UI automation driver for the application under test.
pub trait UiDriver: Send {
    /// PNG-encoded capture of the current screen.
    fn screenshot_png(&self) -> Result<Vec<u8>, DriverError>;

    /// Live root of the element tree, if the driver supports structured queries.
    fn root_element(&self) -> Option<Box<dyn UiElement + '_>>;

    /// Indented textual description of the element tree.
    fn debug_dump(&self) -> Result<String, DriverError>;
}

/// Source of the device facts attached to every report.
pub trait TelemetryProvider: Send {
    fn telemetry(&self) -> DeviceTelemetry;
}

/// Telemetry fixed up front by the host.
#[derive(Debug, Clone, Default)]
pub struct StaticTelemetry(pub DeviceTelemetry);

impl TelemetryProvider for StaticTelemetry {
    fn telemetry(&self) -> DeviceTelemetry {
        self.0.clone()
    }
}

/// Facts about the machine running the tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostTelemetry;

impl HostTelemetry {
    fn os_release() -> Option<String> {
        if !cfg!(unix) {
            return None;
        }
        Command::new("uname")
            .arg("-r")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl TelemetryProvider for HostTelemetry {
    fn telemetry(&self) -> DeviceTelemetry {
        DeviceTelemetry {
            device_name: Some(format!(
                "{}-{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
            is_simulator: Some(std::env::var_os("SIMULATOR_UDID").is_some()),
            platform_name: Some(std::env::consts::OS.to_string()),
            platform_version: Self::os_release(),
            ..DeviceTelemetry::default()
        }
    }
}
