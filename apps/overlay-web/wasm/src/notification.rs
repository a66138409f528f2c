//! Transient user-facing messages
//!
//! A notification carries its own expiry time. The session drops it once the
//! clock passes that point, or when the user dismisses it.

use serde::Serialize;

/// How long a notification stays visible
pub const AUTO_HIDE_MS: f64 = 6000.0;

pub const VALIDATION_MESSAGE: &str = "Please paste the text to overlay and upload a PDF.";
pub const PROCESSING_MESSAGE: &str = "An error occurred while merging the PDFs. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    /// Milliseconds since the epoch after which the notification is hidden
    pub expires_at_ms: f64,
}

impl Notification {
    pub fn success(message: impl Into<String>, now_ms: f64) -> Self {
        Self::new(message.into(), Severity::Success, now_ms)
    }

    pub fn error(message: impl Into<String>, now_ms: f64) -> Self {
        Self::new(message.into(), Severity::Error, now_ms)
    }

    fn new(message: String, severity: Severity, now_ms: f64) -> Self {
        Self {
            message,
            severity,
            expires_at_ms: now_ms + AUTO_HIDE_MS,
        }
    }

    pub fn is_expired(&self, now_ms: f64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_until_deadline() {
        let note = Notification::success("done", 1_000.0);
        assert!(!note.is_expired(1_000.0));
        assert!(!note.is_expired(6_999.0));
        assert!(note.is_expired(7_000.0));
    }

    #[test]
    fn test_severity() {
        assert_eq!(Notification::error("x", 0.0).severity, Severity::Error);
        assert_eq!(Notification::success("x", 0.0).severity, Severity::Success);
    }

    #[test]
    fn test_serializes_for_js() {
        let json = serde_json::to_value(Notification::error("bad", 0.0)).unwrap();
        assert_eq!(json["severity"], "Error");
        assert_eq!(json["message"], "bad");
        assert_eq!(json["expires_at_ms"], 6000.0);
    }
}
