//! Response payload of a successful submission.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Status value reported for accepted messages.
pub const SUCCESS_STATUS: &str = "success";

/// Result of a send call as reported by the Postal API.
///
/// A 2xx response may still carry a status other than `"success"`; use
/// [`is_success`](Self::is_success) and [`is_failed`](Self::is_failed) to
/// interpret it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    /// Identifier of the queued message.
    #[serde(default)]
    pub message_id: String,
    /// Status string.
    #[serde(default)]
    pub status: String,
    /// Free-form response data.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
    /// Error strings reported alongside the status.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl SendResult {
    /// Returns true if the API accepted the message.
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    /// Returns true for every status other than success.
    pub fn is_failed(&self) -> bool {
        !self.is_success()
    }
}
