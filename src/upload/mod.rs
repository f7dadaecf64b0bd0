//! Delivery of finalized reports to the remote collector.

pub mod client;
pub mod error;
pub mod payload;
pub mod transport;

pub use client::{AsyncDeliveryClient, Delivered, DeliveryClient, DeliveryOutcome, PendingDelivery};
pub use error::DeliveryError;
pub use payload::UploadPayload;
pub use transport::{HttpTransport, RawResponse, Transport, TransportError, UploadRequest};
