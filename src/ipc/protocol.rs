//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::ModeInterval;
use crate::state::DecoderStatus;

/// Requests from a timeline viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request the current decoder status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Receive every interval emitted from now on
    Subscribe,
}

/// Responses to a viewer request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Status(TraceStatus),

    Pong,

    Subscribed,

    Error { code: String, message: String },
}

/// Pushed to subscribed viewers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Interval(ModeInterval),
}

/// Status snapshot served to viewers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStatus {
    pub version: String,

    pub decoder: DecoderStatus,

    /// The whole capture has been decoded
    pub capture_complete: bool,

    pub uptime_secs: u64,
}

impl Default for TraceStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            decoder: DecoderStatus::default(),
            capture_complete: false,
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::IntervalLabel;

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_string(&Request::GetStatus).unwrap();
        assert_eq!(json, r#"{"type":"get_status"}"#);

        let req: Request = serde_json::from_str(r#"{"type":"subscribe"}"#).unwrap();
        assert!(matches!(req, Request::Subscribe));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(TraceStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""mode":"none""#));
        assert!(json.contains("capture_complete"));
    }

    #[test]
    fn test_notification_serialization() {
        let interval = ModeInterval::new(IntervalLabel::TxEnd, 1.0, 1.5, "TX ", "");
        let json = serde_json::to_string(&Notification::Interval(interval)).unwrap();
        assert!(json.contains(r#""type":"interval""#));
        assert!(json.contains(r#""label":"txEnd""#));
        assert!(json.contains("TX 500.00000ms"));
    }
}
