use thiserror::Error;

/// Why a report did not reach the collector.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unable to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unable to decode")]
    UnableToDecode,

    #[error("400 - Bad Request")]
    BadRequest,

    #[error("401 - Unauthorized")]
    Unauthorized,

    #[error("404 - Not Found")]
    NotFound,

    #[error("500 - Internal Server Error")]
    InternalServerError,

    #[error("503 - Service Unavailable")]
    ServiceUnavailable,

    #[error("Unexpected Status Code")]
    UnexpectedStatusCode { status: u16 },

    /// Every attempt failed without a response.
    #[error("Unknown Error")]
    Unknown { attempts: u32 },
}

impl DeliveryError {
    /// Failure for a non-2xx status, `None` for success.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            404 => Some(Self::NotFound),
            500 => Some(Self::InternalServerError),
            503 => Some(Self::ServiceUnavailable),
            status => Some(Self::UnexpectedStatusCode { status }),
        }
    }

    /// HTTP status behind this failure, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest => Some(400),
            Self::Unauthorized => Some(401),
            Self::NotFound => Some(404),
            Self::InternalServerError => Some(500),
            Self::ServiceUnavailable => Some(503),
            Self::UnexpectedStatusCode { status } => Some(*status),
            _ => None,
        }
    }
}
