//! WebSocket message codec for the Signal K stream.
//!
//! Signal K uses JSON messages over WebSocket text frames. This module
//! provides encoding and decoding utilities for the frames the bridge
//! sends and receives.

use skbridge_core::BusPath;
use thiserror::Error;

use crate::messages::{InboundFrame, SubscribeRequest, UnsubscribeRequest};

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// Received binary frame instead of text.
    #[error("Expected text frame, received binary")]
    BinaryFrame,

    /// Text frame that is neither a hello nor a delta.
    #[error("Unknown message type")]
    UnknownMessage,
}

/// Decode an inbound frame from JSON text received over the stream.
pub fn decode_frame(text: &str) -> Result<InboundFrame, CodecError> {
    serde_json::from_str(text).map_err(|_| CodecError::UnknownMessage)
}

/// Encode a subscribe frame covering the given paths.
pub fn encode_subscribe<I>(paths: I) -> Result<String, CodecError>
where
    I: IntoIterator<Item = BusPath>,
{
    serde_json::to_string(&SubscribeRequest::for_paths(paths)).map_err(CodecError::from)
}

/// Encode an unsubscribe frame covering the given paths.
pub fn encode_unsubscribe<I>(paths: I) -> Result<String, CodecError>
where
    I: IntoIterator<Item = BusPath>,
{
    serde_json::to_string(&UnsubscribeRequest::for_paths(paths)).map_err(CodecError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_delta() {
        let json = r#"{"updates":[{"values":[{"path":"electrical.switches.venus-0.state","value":1}]}]}"#;
        let frame = decode_frame(json).unwrap();

        match frame {
            InboundFrame::Delta(delta) => {
                assert_eq!(delta.updates.len(), 1);
            }
            _ => panic!("Expected Delta"),
        }
    }

    #[test]
    fn test_decode_hello() {
        let json = r#"{"name":"signalk-server","self":"vessels.urn:mrn:signalk:uuid:test"}"#;
        let frame = decode_frame(json).unwrap();

        match frame {
            InboundFrame::Hello(hello) => {
                assert_eq!(hello.name, "signalk-server");
            }
            _ => panic!("Expected Hello"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown() {
        assert!(matches!(
            decode_frame(r#"{"ping":"pong"}"#),
            Err(CodecError::UnknownMessage)
        ));
        assert!(matches!(
            decode_frame("not json"),
            Err(CodecError::UnknownMessage)
        ));
    }

    #[test]
    fn test_encode_subscribe() {
        let json = encode_subscribe(vec![
            BusPath::new("tanks.freshWater.0.currentLevel"),
            BusPath::new("electrical.batteries.house.voltage"),
        ])
        .unwrap();

        assert!(json.contains("\"context\":\"vessels.self\""));
        assert!(json.contains("\"subscribe\":["));
        assert!(json.contains("tanks.freshWater.0.currentLevel"));
        assert!(json.contains("electrical.batteries.house.voltage"));
    }

    #[test]
    fn test_encode_unsubscribe() {
        let json = encode_unsubscribe(vec![BusPath::new("propulsion.port.temperature")]).unwrap();

        assert!(json.contains("\"unsubscribe\":["));
        assert!(json.contains("propulsion.port.temperature"));
    }
}
