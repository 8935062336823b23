//! Turns backend error objects into messages the user sees.

use std::sync::Arc;

use tracing::debug;

use crate::i18n::{Localizer, DEFAULT_UNKNOWN_ERROR, UNKNOWN_ERROR_KEY};
use crate::notify::NotificationSink;

use super::envelope::ApiErrorBody;
use super::error::BusinessError;

/// Resolves business-error messages and reports them to the host.
#[derive(Clone)]
pub struct ErrorPresenter {
    localizer: Arc<dyn Localizer>,
    sink: Arc<dyn NotificationSink>,
}

impl ErrorPresenter {
    pub fn new(localizer: Arc<dyn Localizer>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { localizer, sink }
    }

    /// Translation of `error.<code>` (or `error.<message>` without a code),
    /// falling back to the unknown-error message.
    pub fn resolve_message(&self, error: &ApiErrorBody) -> String {
        let key = non_empty(error.code.as_deref()).or(non_empty(error.message.as_deref()));

        if let Some(key) = key {
            if let Some(message) = self.localizer.lookup(&format!("error.{}", key)) {
                return message;
            }
            debug!(key = key, "No translation for error key");
        }

        self.unknown_error()
    }

    pub fn unknown_error(&self) -> String {
        self.localizer
            .lookup(UNKNOWN_ERROR_KEY)
            .unwrap_or_else(|| DEFAULT_UNKNOWN_ERROR.to_string())
    }

    /// Notify the user, then hand back the error to return.
    pub fn present(&self, error: ApiErrorBody) -> BusinessError {
        let message = self.resolve_message(&error);
        self.sink.notify(&message);
        BusinessError { message, error }
    }
}

/// Empty strings count as absent
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
