//! Frames produced by the SPI framing layer

use serde::{Deserialize, Serialize};

/// Seconds on the capture clock
pub type Timestamp = f64;

/// One event from the SPI framer, in capture order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// One byte clocked in each direction
    Result { mosi: u8, miso: u8 },

    /// NSS falling edge: a transaction starts
    Enable { time: Timestamp },

    /// NSS rising edge: the transaction is over
    Disable { time: Timestamp },

    /// The framer could not make sense of the signal
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserialization() {
        let event: BusEvent = serde_json::from_str(r#"{"type":"enable","time":0.5}"#).unwrap();
        assert_eq!(event, BusEvent::Enable { time: 0.5 });

        let event: BusEvent =
            serde_json::from_str(r#"{"type":"result","mosi":2,"miso":128}"#).unwrap();
        assert_eq!(event, BusEvent::Result { mosi: 0x02, miso: 0x80 });

        let event: BusEvent = serde_json::from_str(r#"{"type":"error"}"#).unwrap();
        assert_eq!(event, BusEvent::Error);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&BusEvent::Disable { time: 1.25 }).unwrap();
        assert_eq!(json, r#"{"type":"disable","time":1.25}"#);
    }

    #[test]
    fn test_rejects_out_of_range_byte() {
        assert!(serde_json::from_str::<BusEvent>(r#"{"type":"result","mosi":256,"miso":0}"#).is_err());
    }
}
