//! # glas-server
//!
//! Axum WebSocket gateway that fronts a per-connection engine.
//!
//! - `{prefix}/connect` upgrades to a WebSocket and runs one session
//! - Sessions relay client input to the engine and multiplex engine output
//!   through an [`glas_core::OutputGrammar`] back to the client
//! - First-error-wins session results with bounded teardown
//! - Liveness, health, and Prometheus metrics endpoints
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{CloseKind, SessionError, TransportError, UpgradeError};
pub use server::GatewayServer;
pub use session::{SessionConfig, SessionState, run_session};
pub use shutdown::ShutdownCoordinator;
pub use websocket::origin::OriginPolicy;
pub use websocket::stats::{SessionStats, StatsSnapshot};
pub use websocket::transport::{Frame, FrameSink, FrameSource};
