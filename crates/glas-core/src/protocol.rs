//! Wire message types.
//!
//! One message travels per WebSocket frame:
//!
//! - client → server: `{"data": "look"}`
//! - server → client: `{"type": 0, "data": "a dim room"}`
//!
//! `type` is `0` (text), `1` (instruction) or `2` (buffered). Decoding also
//! accepts the enum names (`"TEXT"`, `"INSTRUCTION"`, `"BUFFERED"`) and a
//! missing `type` (text), which is how protobuf-JSON peers emit it.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ─────────────────────────────────────────────────────────────────────────────
// Input
// ─────────────────────────────────────────────────────────────────────────────

/// A command sent by the client, forwarded verbatim to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputMessage {
    /// Raw command text.
    #[serde(default)]
    pub data: String,
}

impl InputMessage {
    /// Create an input message.
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// Discriminator for [`OutputMessage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OutputType {
    /// Ordinary displayed text.
    #[default]
    Text,
    /// A control directive extracted from engine output.
    Instruction,
    /// A text segment that accompanies the preceding instruction.
    Buffered,
}

impl OutputType {
    /// Numeric wire code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Instruction => 1,
            Self::Buffered => 2,
        }
    }

    /// Look up a type by its numeric wire code.
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Text),
            1 => Some(Self::Instruction),
            2 => Some(Self::Buffered),
            _ => None,
        }
    }

    /// Enum name as emitted by protobuf-JSON peers.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Instruction => "INSTRUCTION",
            Self::Buffered => "BUFFERED",
        }
    }

    /// Look up a type by its enum name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TEXT" => Some(Self::Text),
            "INSTRUCTION" => Some(Self::Instruction),
            "BUFFERED" => Some(Self::Buffered),
            _ => None,
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for OutputType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for OutputType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(OutputTypeVisitor)
    }
}

struct OutputTypeVisitor;

impl Visitor<'_> for OutputTypeVisitor {
    type Value = OutputType;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an output type code (0, 1, 2) or name")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<OutputType, E> {
        OutputType::from_code(v)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<OutputType, E> {
        u64::try_from(v)
            .ok()
            .and_then(OutputType::from_code)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<OutputType, E> {
        OutputType::from_name(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

/// A message sent to the client.
///
/// The engine produces these with raw (possibly ANSI-annotated) text; the
/// output multiplexer derives the typed messages that go on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputMessage {
    /// Message kind.
    #[serde(rename = "type", default)]
    pub kind: OutputType,
    /// Message payload.
    #[serde(default)]
    pub data: String,
}

impl OutputMessage {
    /// Create a message of the given kind.
    pub fn new(kind: OutputType, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Plain text.
    pub fn text(data: impl Into<String>) -> Self {
        Self::new(OutputType::Text, data)
    }

    /// Instruction directive.
    pub fn instruction(data: impl Into<String>) -> Self {
        Self::new(OutputType::Instruction, data)
    }

    /// Buffered segment following an instruction.
    pub fn buffered(data: impl Into<String>) -> Self {
        Self::new(OutputType::Buffered, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_type_codes() {
        assert_eq!(OutputType::Text.code(), 0);
        assert_eq!(OutputType::Instruction.code(), 1);
        assert_eq!(OutputType::Buffered.code(), 2);
        assert_eq!(OutputType::from_code(3), None);
    }

    #[test]
    fn output_type_names() {
        for kind in [OutputType::Text, OutputType::Instruction, OutputType::Buffered] {
            assert_eq!(OutputType::from_name(kind.name()), Some(kind));
        }
        assert_eq!(OutputType::from_name("text"), None);
    }

    #[test]
    fn output_serializes_type_as_integer() {
        let json = serde_json::to_value(OutputMessage::instruction("go north")).unwrap();
        assert_eq!(json["type"], 1);
        assert_eq!(json["data"], "go north");
    }

    #[test]
    fn output_accepts_enum_name() {
        let msg: OutputMessage =
            serde_json::from_str(r#"{"type":"BUFFERED","data":"x"}"#).unwrap();
        assert_eq!(msg, OutputMessage::buffered("x"));
    }

    #[test]
    fn output_missing_type_is_text() {
        let msg: OutputMessage = serde_json::from_str(r#"{"data":"hello"}"#).unwrap();
        assert_eq!(msg.kind, OutputType::Text);
    }

    #[test]
    fn output_rejects_unknown_code() {
        assert!(serde_json::from_str::<OutputMessage>(r#"{"type":7,"data":""}"#).is_err());
        assert!(serde_json::from_str::<OutputMessage>(r#"{"type":-1,"data":""}"#).is_err());
        assert!(serde_json::from_str::<OutputMessage>(r#"{"type":"LOUD","data":""}"#).is_err());
    }

    #[test]
    fn input_missing_data_is_empty() {
        let msg: InputMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(msg, InputMessage::default());
    }

    #[test]
    fn input_rejects_unknown_fields() {
        assert!(serde_json::from_str::<InputMessage>(r#"{"data":"x","extra":1}"#).is_err());
    }

    #[test]
    fn input_rejects_wrong_type() {
        assert!(serde_json::from_str::<InputMessage>(r#"{"data":42}"#).is_err());
    }
}
