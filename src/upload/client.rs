//! Report delivery with bounded retry and a bounded wait.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::error::DeliveryError;
use super::payload::UploadPayload;
use super::transport::{
    self, HttpTransport, RawResponse, Transport, TransportError, USER_AGENT, UploadRequest,
};
use crate::config::{Credentials, ReporterConfig};
use crate::model::types::TestReport;

/// Attempts per report, counting the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// A report the collector accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub status: u16,
    /// Response body, when it parsed as JSON.
    pub body: Option<serde_json::Value>,
}

/// What teardown observed about a report's delivery.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered(Delivered),
    Failed(DeliveryError),
    /// The wait bound elapsed; delivery may still finish in the background.
    TimedOut,
    /// Delivery was not attempted.
    Skipped(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Turn a server response into the delivery result. Never retried.
pub fn classify(response: RawResponse) -> Result<Delivered, DeliveryError> {
    let Some(body) = response.body else {
        return Err(DeliveryError::UnableToDecode);
    };
    match DeliveryError::from_status(response.status) {
        None => Ok(Delivered {
            status: response.status,
            body: serde_json::from_slice(&body).ok(),
        }),
        Some(err) => Err(err),
    }
}

/// Decide what to do after a failed attempt: `None` to try again.
fn after_transport_failure(attempt: u32, err: TransportError) -> Option<DeliveryError> {
    match err {
        TransportError::InvalidUrl { url } => {
            warn!(url = %url, "delivery: endpoint is not a valid URL");
            Some(DeliveryError::InvalidUrl)
        }
        TransportError::InvalidRequest(reason) => Some(DeliveryError::InvalidRequest(reason)),
        TransportError::NoResponse(reason) if attempt < MAX_ATTEMPTS => {
            debug!(attempt, error = %reason, "delivery: no response, retrying");
            None
        }
        TransportError::NoResponse(reason) => {
            warn!(attempts = attempt, error = %reason, "delivery: giving up after repeated transport failures");
            Some(DeliveryError::Unknown { attempts: attempt })
        }
    }
}

/// Uploads finalized reports to the collector.
pub struct DeliveryClient<T = HttpTransport> {
    transport: T,
    endpoint: String,
    credentials: Credentials,
    automation_type: String,
    language: String,
}

impl DeliveryClient<HttpTransport> {
    pub fn from_config(config: &ReporterConfig, credentials: Credentials) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(transport, config, credentials))
    }
}

impl<T: Transport> DeliveryClient<T> {
    pub fn with_transport(transport: T, config: &ReporterConfig, credentials: Credentials) -> Self {
        Self {
            transport,
            endpoint: config.endpoint.clone(),
            credentials,
            automation_type: config.automation_type.clone(),
            language: config.language.clone(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Upload `report`, retrying only when no response arrived. The payload is
    /// encoded once and reused for every attempt.
    pub fn send(&self, report: &TestReport) -> Result<Delivered, DeliveryError> {
        let body = UploadPayload::new(report, &self.automation_type, &self.language).to_json()?;
        let request = UploadRequest {
            endpoint: &self.endpoint,
            credentials: &self.credentials,
            body: &body,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.post(&request) {
                Ok(response) => {
                    debug!(attempt, status = response.status, "delivery: response received");
                    return classify(response);
                }
                Err(err) => {
                    if let Some(terminal) = after_transport_failure(attempt, err) {
                        return Err(terminal);
                    }
                }
            }
        }
    }
}

impl<T: Transport + 'static> DeliveryClient<T> {
    /// Run [`send`](Self::send) on a background thread.
    pub fn spawn(self, report: TestReport) -> PendingDelivery {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result = self.send(&report);
            // The receiver is gone if teardown already stopped waiting
            let _ = tx.send(result);
        });
        PendingDelivery { rx }
    }
}

/// A delivery running in the background.
pub struct PendingDelivery {
    rx: Receiver<Result<Delivered, DeliveryError>>,
}

impl PendingDelivery {
    /// Block for at most `timeout`, then report what happened.
    pub fn wait(self, timeout: Duration) -> DeliveryOutcome {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => log_result(result),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "delivery: upload still in flight, continuing without it"
                );
                DeliveryOutcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("delivery: upload worker exited without a result");
                DeliveryOutcome::Failed(DeliveryError::Unknown { attempts: 0 })
            }
        }
    }
}

fn log_result(result: Result<Delivered, DeliveryError>) -> DeliveryOutcome {
    match result {
        Ok(delivered) => {
            info!(status = delivered.status, "delivery: uploaded test report");
            DeliveryOutcome::Delivered(delivered)
        }
        Err(e) => {
            warn!(error = %e, status = ?e.status(), "delivery: failed to upload test report");
            DeliveryOutcome::Failed(e)
        }
    }
}

/// Delivery over the async HTTP client, for hosts already inside a tokio
/// runtime. Same retry and classification rules as [`DeliveryClient`].
pub struct AsyncDeliveryClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
    automation_type: String,
    language: String,
}

impl AsyncDeliveryClient {
    pub fn from_config(config: &ReporterConfig, credentials: Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            credentials,
            automation_type: config.automation_type.clone(),
            language: config.language.clone(),
        })
    }

    pub async fn send(&self, report: &TestReport) -> Result<Delivered, DeliveryError> {
        let body = UploadPayload::new(report, &self.automation_type, &self.language).to_json()?;
        let request = UploadRequest {
            endpoint: &self.endpoint,
            credentials: &self.credentials,
            body: &body,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match transport::post_async(&self.client, &request).await {
                Ok(response) => {
                    debug!(attempt, status = response.status, "delivery: response received");
                    return classify(response);
                }
                Err(err) => {
                    if let Some(terminal) = after_transport_failure(attempt, err) {
                        return Err(terminal);
                    }
                }
            }
        }
    }

    /// [`send`](Self::send) bounded by `timeout`, logged like the blocking path.
    pub async fn deliver_async(&self, report: &TestReport, timeout: Duration) -> DeliveryOutcome {
        match tokio::time::timeout(timeout, self.send(report)).await {
            Ok(result) => log_result(result),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "delivery: upload did not finish in time"
                );
                DeliveryOutcome::TimedOut
            }
        }
    }
}
