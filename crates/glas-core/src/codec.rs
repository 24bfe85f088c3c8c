//! JSON frame codec.
//!
//! Each frame carries exactly one complete message, so there is no
//! streaming or partial decoding.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors produced while encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// The frame is not valid JSON or violates the message schema.
    #[error("invalid message: {0}")]
    Decode(#[source] serde_json::Error),
    /// A binary frame did not contain UTF-8 text.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
}

/// Encode a message as a JSON text frame.
pub fn encode<T: Serialize>(message: &T) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}

/// Decode a text frame.
pub fn decode<T: DeserializeOwned>(frame: &str) -> Result<T, CodecError> {
    serde_json::from_str(frame).map_err(CodecError::Decode)
}

/// Decode a binary frame holding UTF-8 JSON.
pub fn decode_bytes<T: DeserializeOwned>(frame: &[u8]) -> Result<T, CodecError> {
    let text = std::str::from_utf8(frame).map_err(|_| CodecError::InvalidUtf8)?;
    decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{InputMessage, OutputMessage, OutputType};
    use proptest::prelude::*;

    #[test]
    fn encode_output_shape() {
        let frame = encode(&OutputMessage::text("a dim room")).unwrap();
        assert_eq!(frame, r#"{"type":0,"data":"a dim room"}"#);
    }

    #[test]
    fn decode_input() {
        let msg: InputMessage = decode(r#"{"data":"look"}"#).unwrap();
        assert_eq!(msg.data, "look");
    }

    #[test]
    fn decode_garbage_fails() {
        let err = decode::<InputMessage>("not json at all").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn decode_non_object_fails() {
        assert!(decode::<InputMessage>("[1,2,3]").is_err());
        assert!(decode::<InputMessage>("\"look\"").is_err());
        assert!(decode::<InputMessage>("").is_err());
    }

    #[test]
    fn decode_bytes_rejects_invalid_utf8() {
        let err = decode_bytes::<InputMessage>(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8));
    }

    #[test]
    fn decode_bytes_accepts_utf8_json() {
        let msg: InputMessage = decode_bytes(br#"{"data":"north"}"#).unwrap();
        assert_eq!(msg.data, "north");
    }

    #[test]
    fn error_display() {
        let err = decode::<InputMessage>("{").unwrap_err();
        assert!(err.to_string().starts_with("invalid message"));
        assert_eq!(CodecError::InvalidUtf8.to_string(), "frame is not valid UTF-8");
    }

    fn output_type() -> impl Strategy<Value = OutputType> {
        prop_oneof![
            Just(OutputType::Text),
            Just(OutputType::Instruction),
            Just(OutputType::Buffered),
        ]
    }

    proptest! {
        #[test]
        fn input_round_trip(data in any::<String>()) {
            let msg = InputMessage::new(data);
            let back: InputMessage = decode(&encode(&msg).unwrap()).unwrap();
            prop_assert_eq!(back, msg);
        }

        #[test]
        fn output_round_trip(kind in output_type(), data in any::<String>()) {
            let msg = OutputMessage::new(kind, data);
            let back: OutputMessage = decode(&encode(&msg).unwrap()).unwrap();
            prop_assert_eq!(back, msg);
        }
    }
}
