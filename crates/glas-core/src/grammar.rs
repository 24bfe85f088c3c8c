//! Output grammar: turns one raw engine output value into wire messages.
//!
//! The default [`InstructionGrammar`]:
//!
//! 1. strips ANSI escape sequences (CSI, OSC, two-byte ESC),
//! 2. if the plain text starts with the marker token, strips it and splits
//!    the remainder on the separator token; segment 0 becomes an
//!    `Instruction`, every later segment a `Buffered` message,
//! 3. otherwise yields a single `Text` message.
//!
//! Plain text that happens to begin with the marker is always treated as an
//! instruction. There is no escape mechanism.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::protocol::OutputMessage;

/// Default token prefixing instruction-bearing output.
pub const DEFAULT_MARKER: &str = "@@instruction@@";

/// Default token delimiting buffered segments.
pub const DEFAULT_SEPARATOR: &str = "@@buffer@@";

/// Revision of the built-in grammar.
pub const INSTRUCTION_GRAMMAR_VERSION: &str = "ansi-instruction/1";

static ANSI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\x1b\[[0-?]*[ -/]*[@-~]",
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        r"|\x1b[@-Z\\-_]",
        r"|\x{9b}[0-?]*[ -/]*[@-~]",
    ))
    .expect("ANSI pattern is valid")
});

/// Remove ANSI control and formatting sequences.
pub fn strip_ansi(raw: &str) -> Cow<'_, str> {
    ANSI_PATTERN.replace_all(raw, "")
}

/// Rules for splitting raw engine output into wire messages.
///
/// Shared between the engine and the client, so it is swappable per server.
pub trait OutputGrammar: Send + Sync {
    /// Identifier of this grammar revision.
    fn version(&self) -> &str;

    /// Split one raw output value into the messages to send, in send order.
    ///
    /// Always yields at least one message.
    fn split(&self, raw: &str) -> Vec<OutputMessage>;
}

/// Marker/separator grammar with ANSI stripping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionGrammar {
    marker: String,
    separator: String,
}

impl InstructionGrammar {
    /// Create a grammar with explicit tokens.
    ///
    /// An empty marker disables instruction detection. An empty separator
    /// keeps the whole remainder as the instruction.
    pub fn new(marker: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            separator: separator.into(),
        }
    }

    /// Instruction marker token.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Buffered segment separator token.
    pub fn separator(&self) -> &str {
        &self.separator
    }
}

impl Default for InstructionGrammar {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER, DEFAULT_SEPARATOR)
    }
}

impl OutputGrammar for InstructionGrammar {
    fn version(&self) -> &str {
        INSTRUCTION_GRAMMAR_VERSION
    }

    fn split(&self, raw: &str) -> Vec<OutputMessage> {
        let plain = strip_ansi(raw);

        let rest = if self.marker.is_empty() {
            None
        } else {
            plain.strip_prefix(self.marker.as_str())
        };
        let Some(rest) = rest else {
            return vec![OutputMessage::text(plain.into_owned())];
        };

        if self.separator.is_empty() {
            return vec![OutputMessage::instruction(rest)];
        }

        let mut segments = rest.split(self.separator.as_str());
        // split() always yields at least one item
        let head = segments.next().unwrap_or_default();
        let mut messages = vec![OutputMessage::instruction(head)];
        messages.extend(segments.map(OutputMessage::buffered));
        messages
    }
}
