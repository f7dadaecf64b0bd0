//! The network seam: one POST of an encoded payload.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;

use crate::config::Credentials;

pub const API_TOKEN_HEADER: &str = "api_token";
pub const PROJECT_ID_HEADER: &str = "project_id";
const JSON: &str = "application/json";

pub(crate) const USER_AGENT: &str = concat!("uitest-report/", env!("CARGO_PKG_VERSION"));

/// A request that could not produce a response.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid endpoint URL {url}")]
    InvalidUrl { url: String },

    #[error("request could not be built: {0}")]
    InvalidRequest(String),

    /// Connection refused, DNS failure, timeout, reset.
    #[error("No response from server: {0}")]
    NoResponse(String),
}

impl TransportError {
    /// Only failures that never reached a server are worth repeating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoResponse(_))
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::NoResponse(e.to_string())
        }
    }
}

/// Status and body of whatever the server sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// `None` if the body could not be read.
    pub body: Option<Vec<u8>>,
}

/// Everything needed to issue one upload attempt.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub endpoint: &'a str,
    pub credentials: &'a Credentials,
    pub body: &'a [u8],
}

pub trait Transport: Send + Sync {
    fn post(&self, request: &UploadRequest<'_>) -> Result<RawResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn post(&self, request: &UploadRequest<'_>) -> Result<RawResponse, TransportError> {
        (**self).post(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn post(&self, request: &UploadRequest<'_>) -> Result<RawResponse, TransportError> {
        (**self).post(request)
    }
}

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<reqwest::Url, TransportError> {
    reqwest::Url::parse(endpoint).map_err(|_| TransportError::InvalidUrl {
        url: endpoint.to_string(),
    })
}

/// Blocking HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Transport whose every attempt gives up after `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: &UploadRequest<'_>) -> Result<RawResponse, TransportError> {
        let url = parse_endpoint(request.endpoint)?;
        let response = self
            .client
            .post(url)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON)
            .header(API_TOKEN_HEADER, request.credentials.api_token.as_str())
            .header(PROJECT_ID_HEADER, request.credentials.project_id.as_str())
            .body(request.body.to_vec())
            .send()
            .map_err(TransportError::from_reqwest)?;

        let status = response.status().as_u16();
        let body = response.bytes().ok().map(|b| b.to_vec());
        Ok(RawResponse { status, body })
    }
}

/// Async counterpart of [`HttpTransport::post`].
pub(crate) async fn post_async(
    client: &reqwest::Client,
    request: &UploadRequest<'_>,
) -> Result<RawResponse, TransportError> {
    let url = parse_endpoint(request.endpoint)?;
    let response = client
        .post(url)
        .header(ACCEPT, JSON)
        .header(CONTENT_TYPE, JSON)
        .header(API_TOKEN_HEADER, request.credentials.api_token.as_str())
        .header(PROJECT_ID_HEADER, request.credentials.project_id.as_str())
        .body(request.body.to_vec())
        .send()
        .await
        .map_err(TransportError::from_reqwest)?;

    let status = response.status().as_u16();
    let body = response.bytes().await.ok().map(|b| b.to_vec());
    Ok(RawResponse { status, body })
}
