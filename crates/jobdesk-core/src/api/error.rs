use thiserror::Error;

use super::envelope::ApiErrorBody;
use super::transport::OutboundRequest;

/// HTTP status the backend uses for a rejected access token
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure produced by a `Transport`.
///
/// Every variant keeps the request that was sent so callers can replay it.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP {status} from {request}: {body}")]
    Status {
        status: u16,
        body: String,
        request: OutboundRequest,
    },

    #[error("Network error on {request}: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
        request: OutboundRequest,
    },
}

impl TransportError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &str, request: OutboundRequest) -> Self {
        TransportError::Status {
            status,
            body: Self::truncate_body(body),
            request,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Network { .. } => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(STATUS_UNAUTHORIZED)
    }

    pub fn request(&self) -> &OutboundRequest {
        match self {
            TransportError::Status { request, .. } | TransportError::Network { request, .. } => {
                request
            }
        }
    }

    pub fn into_request(self) -> OutboundRequest {
        match self {
            TransportError::Status { request, .. } | TransportError::Network { request, .. } => {
                request
            }
        }
    }
}

/// `hasError` envelope, already shown to the user.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct BusinessError {
    /// Localized message that was displayed
    pub message: String,
    /// Error object exactly as the backend sent it
    pub error: ApiErrorBody,
}

impl BusinessError {
    pub fn code(&self) -> Option<&str> {
        self.error.code.as_deref()
    }
}

/// Outcome of a failed `RequestGateway` call.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Business(#[from] BusinessError),

    #[error("Failed to encode request body for {url}: {source}")]
    InvalidBody {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid response envelope from {url}: {source}")]
    InvalidEnvelope {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(STATUS_UNAUTHORIZED)
    }

    pub fn as_business(&self) -> Option<&BusinessError> {
        match self {
            GatewayError::Business(e) => Some(e),
            _ => None,
        }
    }
}
