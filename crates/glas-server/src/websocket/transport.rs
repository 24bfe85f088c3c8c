//! Transport adapter over one WebSocket connection.
//!
//! The connection is split into a [`FrameSource`] (read half) and a
//! [`FrameSink`] (write half). Session code only sees these traits, so the
//! relay and multiplexer run unchanged against in-memory transports in tests.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::trace;

use crate::errors::TransportError;

/// A data frame received from the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame; decoded as text when valid UTF-8.
    Binary(Vec<u8>),
}

impl Frame {
    /// Raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// Receiving half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next data frame.
    ///
    /// Control frames are absorbed. A close or failure is returned as
    /// [`TransportError::Read`] with its classification.
    async fn receive_frame(&mut self) -> Result<Frame, TransportError>;
}

/// Sending half of a connection. Only one owner may write at a time.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send_frame(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a normal close frame and shut the write side. Best effort.
    async fn close(&mut self);
}

/// Classify a close frame by its status code.
///
/// 1000 (normal), 1001 (going away) and a close without a code are graceful.
/// Every other code is unexpected.
pub fn classify_close(code: Option<u16>, reason: &str) -> TransportError {
    let detail = match (code, reason.is_empty()) {
        (Some(code), true) => format!("close code {code}"),
        (Some(code), false) => format!("close code {code}: {reason}"),
        (None, _) => "close frame without status".to_string(),
    };
    match code {
        None | Some(close_code::NORMAL | close_code::AWAY) => TransportError::graceful(detail),
        Some(_) => TransportError::unexpected(detail),
    }
}

/// Split an upgraded socket into its halves.
pub fn split(socket: WebSocket) -> (WsSink, WsSource) {
    let (sink, stream) = socket.split();
    (WsSink { inner: sink }, WsSource { inner: stream })
}

/// Read half of an axum WebSocket.
pub struct WsSource {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn receive_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            let msg = match self.inner.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(TransportError::unexpected(e.to_string())),
                None => {
                    return Err(TransportError::unexpected(
                        "connection ended without close frame",
                    ));
                }
            };
            match msg {
                Message::Text(text) => return Ok(Frame::Text(text.to_string())),
                Message::Binary(bytes) => return Ok(Frame::Binary(bytes.to_vec())),
                Message::Ping(_) | Message::Pong(_) => trace!("control frame absorbed"),
                Message::Close(frame) => {
                    return Err(match frame {
                        Some(frame) => classify_close(Some(frame.code), frame.reason.as_str()),
                        None => classify_close(None, ""),
                    });
                }
            }
        }
    }
}

/// Write half of an axum WebSocket.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::write(e.to_string()))
    }

    async fn close(&mut self) {
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        };
        let _ = self.inner.send(Message::Close(Some(frame))).await;
        let _ = self.inner.close().await;
    }
}
