//! JSON body of an upload request.

use serde::Serialize;

use crate::capture::log_buffer::LogEntry;
use crate::model::types::{CodeLine, DeviceTelemetry, ErrorRecord, TestReport, TestStatus};

/// Borrowed view of a [`TestReport`] with the collector's field names.
/// Absent optional fields are omitted.
#[derive(Debug, Serialize)]
pub struct UploadPayload<'a> {
    pub test_status: TestStatus,
    pub test_name: &'a str,
    pub test_filename: &'a str,
    pub tags: &'a DeviceTelemetry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<&'a [LogEntry]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a ErrorRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_context: Option<&'a [CodeLine]>,
    pub automation_type: &'a str,
    pub language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time_ms: Option<u64>,
}

impl<'a> UploadPayload<'a> {
    pub fn new(report: &'a TestReport, automation_type: &'a str, language: &'a str) -> Self {
        Self {
            test_status: report.status,
            test_name: &report.name,
            test_filename: &report.filename,
            tags: &report.telemetry,
            screenshot: report.screenshot.as_deref(),
            view: report.view.as_deref(),
            log: report.log.as_deref(),
            error: report.error.as_ref(),
            code_context: report.error.as_ref().and_then(|e| e.code_context.as_deref()),
            automation_type,
            language,
            platform: report.telemetry.platform_name.as_deref(),
            platform_version: report.telemetry.platform_version.as_deref(),
            elapsed_time_ms: report.elapsed_time_ms(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::log_buffer::LogSource;

    fn failed_report() -> TestReport {
        let mut report = TestReport::started_at(
            "testLogin",
            "LoginTests.swift",
            DeviceTelemetry {
                device_name: Some("iPhone 15".into()),
                platform_name: Some("iOS".into()),
                platform_version: Some("17.2".into()),
                bundle_id: Some("com.example.demo".into()),
                ..DeviceTelemetry::default()
            },
            100.0,
        );
        report.status = TestStatus::Failed;
        report.end_time = Some(100.5);
        report.screenshot = Some("iVBORw0KGgo=".into());
        report.view = Some("<?xml version=\"1.0\"?>".into());
        report.log = Some(vec![LogEntry::with_timestamp(
            "1700000000.000".into(),
            LogSource::Console,
            "tapping login",
        )]);
        report.error = Some(ErrorRecord {
            error_type: "Assertion Failure".into(),
            message: "XCTAssertTrue failed".into(),
            line_number: Some(15),
            invoked_function: "testLogin".into(),
            code_executed: Some("XCTAssertTrue(ok)".into()),
            code_context: Some(vec![CodeLine::new(15, "XCTAssertTrue(ok)")]),
        });
        report
    }

    #[test]
    fn uses_collector_field_names() {
        let report = failed_report();
        let value: serde_json::Value =
            serde_json::from_slice(&UploadPayload::new(&report, "XCTest", "Rust").to_json().unwrap())
                .unwrap();

        assert_eq!(value["test_status"], "failed");
        assert_eq!(value["test_name"], "testLogin");
        assert_eq!(value["test_filename"], "LoginTests.swift");
        assert_eq!(value["tags"]["deviceName"], "iPhone 15");
        assert_eq!(value["tags"]["bundleId"], "com.example.demo");
        assert_eq!(value["platform"], "iOS");
        assert_eq!(value["platform_version"], "17.2");
        assert_eq!(value["automation_type"], "XCTest");
        assert_eq!(value["language"], "Rust");
        assert_eq!(value["elapsed_time_ms"], 500);
        assert_eq!(value["error"]["error_msg"], "XCTAssertTrue failed");
        assert_eq!(value["code_context"][0]["line_number"], 15);
        assert_eq!(value["code_context"][0]["line_code"], "XCTAssertTrue(ok)");
        assert_eq!(value["log"][0]["message"], "tapping login");
        assert_eq!(value["log"][0]["type"], "console");
    }

    #[test]
    fn absent_fields_are_omitted() {
        let report = TestReport::started_at("t", "f.swift", DeviceTelemetry::default(), 1.0);
        let value = serde_json::to_value(UploadPayload::new(&report, "XCTest", "Rust")).unwrap();
        let obj = value.as_object().unwrap();
        for key in ["screenshot", "view", "log", "error", "code_context", "platform", "elapsed_time_ms"] {
            assert!(!obj.contains_key(key), "{key} should be omitted");
        }
        assert_eq!(value["test_status"], "undetermined");
        assert!(value["tags"].as_object().unwrap().is_empty());
    }
}
