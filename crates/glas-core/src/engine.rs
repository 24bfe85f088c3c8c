//! Interface to the session engine the gateway fronts.
//!
//! The engine is opaque: a session constructs one per connection with a
//! pair of channels, then drives [`Engine::run`] until it returns or the
//! session's cancellation token fires. The engine may cancel that token
//! itself to end the session.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::{InputMessage, OutputMessage};

/// Errors reported by an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be constructed for this session.
    #[error("engine construction failed: {0}")]
    Construct(String),
    /// The engine's upstream I/O failed.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other abnormal termination.
    #[error("engine fault: {0}")]
    Fault(String),
}

/// Channels connecting one session to its engine.
pub struct EngineChannels {
    /// Commands relayed from the client.
    pub input: mpsc::Receiver<InputMessage>,
    /// Raw output for the multiplexer.
    pub output: mpsc::Sender<OutputMessage>,
}

/// Builds one engine per session.
pub trait EngineFactory: Send + Sync {
    /// Construct an engine bound to the given channels.
    fn construct(&self, channels: EngineChannels) -> Result<Box<dyn Engine>, EngineError>;
}

/// A running engine instance.
#[async_trait]
pub trait Engine: Send {
    /// Run until the engine finishes, fails, or `cancel` fires.
    ///
    /// Returning `Ok` is a clean completion; `Err` is a session fault.
    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), EngineError>;
}
