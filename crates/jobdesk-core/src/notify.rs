//! User-facing notification channel.
//!
//! The request pipeline reports business errors here before returning
//! them; the host application decides how they are rendered.

use tracing::warn;

pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Sink that only records notifications in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, message: &str) {
        warn!(message = message, "User notification");
    }
}
