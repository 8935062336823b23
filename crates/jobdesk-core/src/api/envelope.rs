//! The response wrapper every backend endpoint returns.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error object inside a failed envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `{ payload, hasError, error }` as sent by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    #[serde(default)]
    pub payload: T,
    #[serde(rename = "hasError", default)]
    pub has_error: bool,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// Why an envelope did not yield a payload.
#[derive(Debug)]
pub enum EnvelopeFailure {
    /// `hasError` was set; a missing error object reads as an empty one
    Business(ApiErrorBody),
    /// Body or payload did not match the expected shape
    Malformed(serde_json::Error),
}

impl Envelope {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Payload as `T` when `hasError` is false.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, EnvelopeFailure> {
        if self.has_error {
            return Err(EnvelopeFailure::Business(self.error.unwrap_or_default()));
        }
        serde_json::from_value(self.payload).map_err(EnvelopeFailure::Malformed)
    }
}

/// Parse a response body and unwrap its payload in one step.
pub fn unwrap_body<T: DeserializeOwned>(body: &str) -> Result<T, EnvelopeFailure> {
    Envelope::parse(body)
        .map_err(EnvelopeFailure::Malformed)?
        .into_result()
}
