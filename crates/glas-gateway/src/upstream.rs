//! Engine that relays a session to a line-oriented TCP upstream.
//!
//! Each session opens its own connection. Client input is written as one
//! line per message; every line the upstream sends becomes one raw output
//! message for the multiplexer.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use glas_core::{Engine, EngineChannels, EngineError, EngineFactory, OutputMessage};
use glas_settings::UpstreamSettings;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Builds a [`TcpEngine`] per session.
#[derive(Clone, Debug)]
pub struct TcpEngineFactory {
    address: String,
    connect_timeout: Duration,
    max_line_length: usize,
}

impl TcpEngineFactory {
    /// Factory for the configured upstream.
    pub fn new(upstream: &UpstreamSettings) -> Self {
        Self {
            address: upstream.address(),
            connect_timeout: Duration::from_millis(upstream.connect_timeout_ms),
            max_line_length: upstream.max_line_length,
        }
    }

    /// Upstream `host:port`.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl EngineFactory for TcpEngineFactory {
    fn construct(&self, channels: EngineChannels) -> Result<Box<dyn Engine>, EngineError> {
        Ok(Box::new(TcpEngine {
            address: self.address.clone(),
            connect_timeout: self.connect_timeout,
            max_line_length: self.max_line_length,
            channels,
        }))
    }
}

/// One session's upstream connection.
pub struct TcpEngine {
    address: String,
    connect_timeout: Duration,
    max_line_length: usize,
    channels: EngineChannels,
}

fn line_error(err: LinesCodecError, max_line_length: usize) -> EngineError {
    match err {
        LinesCodecError::Io(err) => EngineError::Io(err),
        LinesCodecError::MaxLineLengthExceeded => {
            EngineError::Fault(format!("upstream line exceeds {max_line_length} bytes"))
        }
    }
}

#[async_trait]
impl Engine for TcpEngine {
    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), EngineError> {
        let TcpEngine {
            address,
            connect_timeout,
            max_line_length,
            channels,
        } = *self;
        let EngineChannels { mut input, output } = channels;

        let connected = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            connected = tokio::time::timeout(connect_timeout, TcpStream::connect(&address)) => connected,
        };
        let stream = connected.map_err(|_| {
            EngineError::Fault(format!(
                "timed out connecting to {address} after {connect_timeout:?}"
            ))
        })??;
        info!(%address, "upstream connected");

        let framed = Framed::new(stream, LinesCodec::new_with_max_length(max_line_length));
        let (mut writer, mut reader) = framed.split();

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                line = reader.next() => match line {
                    Some(Ok(line)) => {
                        let sent = tokio::select! {
                            () = cancel.cancelled() => return Ok(()),
                            sent = output.send(OutputMessage::text(line)) => sent,
                        };
                        if sent.is_err() {
                            debug!("session output closed");
                            return Ok(());
                        }
                    }
                    Some(Err(err)) => return Err(line_error(err, max_line_length)),
                    None => {
                        info!(%address, "upstream closed connection");
                        return Ok(());
                    }
                },
                msg = input.recv() => match msg {
                    Some(msg) => tokio::select! {
                        () = cancel.cancelled() => return Ok(()),
                        written = writer.send(msg.data) => {
                            written.map_err(|err| line_error(err, max_line_length))?;
                        }
                    },
                    None => return Ok(()),
                },
            }
        }
    }
}
