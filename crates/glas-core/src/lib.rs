//! # glas-core
//!
//! Shared vocabulary for the Glas gateway.
//!
//! - **Protocol**: `InputMessage` (client → engine) and `OutputMessage`
//!   (engine → client) with the `OutputType` discriminator
//! - **Codec**: JSON encoding of one message per frame
//! - **Grammar**: ANSI stripping and instruction/buffer splitting of raw
//!   engine output, behind the pluggable `OutputGrammar` trait
//! - **Engine**: the `EngineFactory` / `Engine` traits a session drives

#![deny(unsafe_code)]

pub mod codec;
pub mod engine;
pub mod grammar;
pub mod protocol;

pub use codec::{CodecError, decode, decode_bytes, encode};
pub use engine::{Engine, EngineChannels, EngineError, EngineFactory};
pub use grammar::{InstructionGrammar, OutputGrammar, strip_ansi};
pub use protocol::{InputMessage, OutputMessage, OutputType};
