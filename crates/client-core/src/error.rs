use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state_machine::ChannelLifecycle;

/// What went wrong, coarsely. Screens pick the notice wording from this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientErrorCategory {
    /// The backend refused the request as sent (4xx other than auth and throttling).
    Request,
    /// Missing, expired or insufficient credential.
    Auth,
    /// Unreachable backend, dropped socket or a 5xx answer.
    Network,
    RateLimited,
    /// Session store or profile file.
    Storage,
    /// A body that would not encode or decode.
    Serialization,
    Internal,
}

/// Error surfaced to the user as a notice; it never ends the screen.
///
/// `code` is stable and machine-readable (`http_404`, `session_absent`, ...),
/// `message` is the text to show, preferably the backend's `detail`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{message} [{code}]")]
pub struct ClientError {
    pub category: ClientErrorCategory,
    pub code: String,
    pub message: String,
    pub retry_after_ms: Option<u64>,
}

impl ClientError {
    pub fn new(
        category: ClientErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Error for a failed HTTP exchange, coded `http_<status>`.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(classify_http_status(status), format!("http_{status}"), message)
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms.map(Duration::from_millis)
    }

    /// `action` is not allowed while the channel is in `current`.
    pub fn invalid_state(current: ChannelLifecycle, action: impl Into<String>) -> Self {
        Self::new(
            ClientErrorCategory::Internal,
            "channel_transition_rejected",
            format!("channel cannot {} while {current:?}", action.into()),
        )
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category,
            ClientErrorCategory::Network | ClientErrorCategory::RateLimited
        )
    }
}

/// Map an HTTP status to a category; 408 and 429 both count as throttling.
pub fn classify_http_status(status: u16) -> ClientErrorCategory {
    match status {
        401 | 403 => ClientErrorCategory::Auth,
        408 | 429 => ClientErrorCategory::RateLimited,
        400..=499 => ClientErrorCategory::Request,
        500..=599 => ClientErrorCategory::Network,
        _ => ClientErrorCategory::Internal,
    }
}
