//! Session lifecycle: one upgraded connection from engine construction
//! through bounded teardown.
//!
//! A session runs three tasks under one cancellation token:
//!
//! - the input relay (client frames to engine input),
//! - the output multiplexer (engine output to typed client messages),
//! - the engine itself.
//!
//! Whichever task reports first decides how the session ended. That report
//! cancels the others, the multiplexer hands the write half back for the
//! close notice, and anything still running at the teardown deadline is
//! aborted.

pub mod error_slot;
mod multiplexer;
mod relay;

use std::sync::Arc;
use std::time::Duration;

use glas_core::{EngineChannels, EngineFactory, OutputGrammar};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::errors::SessionError;
use crate::metrics::WS_TEARDOWN_ABORTS_TOTAL;
use crate::websocket::transport::{FrameSink, FrameSource};

pub use error_slot::ErrorSlot;

/// Capacity of the channels between the session and its engine.
const CHANNEL_CAPACITY: usize = 1;

/// Per-session settings.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Bound on teardown before remaining tasks are aborted.
    pub teardown_timeout: Duration,
    /// Text frame sent before the close frame. Empty sends none.
    pub close_notice: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            teardown_timeout: config.teardown_timeout(),
            close_notice: config.close_notice.clone(),
        }
    }
}

/// Lifecycle phase of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Building the engine and spawning tasks.
    Starting,
    /// Relaying in both directions.
    Running,
    /// Cancelled; sending the close notice and joining tasks.
    Draining,
    /// Every task has exited or been aborted.
    Closed,
}

fn transition(state: &mut SessionState, next: SessionState) {
    debug!(from = ?*state, to = ?next, "session state");
    *state = next;
}

/// Run one session over an already-upgraded connection.
///
/// Returns `Ok` when the session ended gracefully (client close, engine
/// completion, or cancellation) and the retained fault otherwise. An engine
/// that cannot be constructed fails before any task is spawned.
#[instrument(skip_all, fields(session_id = %session_id))]
pub async fn run_session<S, K>(
    session_id: Uuid,
    source: S,
    sink: K,
    factory: &dyn EngineFactory,
    grammar: Arc<dyn OutputGrammar>,
    config: &SessionConfig,
    parent: &CancellationToken,
) -> Result<(), SessionError>
where
    S: FrameSource + 'static,
    K: FrameSink + 'static,
{
    let mut state = SessionState::Starting;

    let (input_tx, input_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (output_tx, output_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let engine = factory.construct(EngineChannels {
        input: input_rx,
        output: output_tx,
    })?;

    let cancel = parent.child_token();
    let errors = Arc::new(ErrorSlot::new());

    let relay = tokio::spawn(relay::run_input_relay(
        source,
        input_tx,
        errors.clone(),
        cancel.clone(),
    ));
    let mut mux = tokio::spawn(multiplexer::run_output_multiplexer(
        sink,
        output_rx,
        grammar,
        errors.clone(),
        cancel.clone(),
    ));
    let engine_task = {
        let errors = errors.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let ended = match engine.run(cancel).await {
                Ok(()) => SessionError::EngineFinished,
                Err(err) => SessionError::from(err),
            };
            let _ = errors.report(ended);
        })
    };
    transition(&mut state, SessionState::Running);

    tokio::select! {
        biased;
        _ = errors.wait() => {}
        () = cancel.cancelled() => {
            let _ = errors.report(SessionError::Cancelled);
        }
    }
    cancel.cancel();
    transition(&mut state, SessionState::Draining);

    let deadline = Instant::now() + config.teardown_timeout;
    let mut aborted = 0u64;

    match timeout_at(deadline, &mut mux).await {
        Ok(Ok(mut sink)) => {
            let notice = config.close_notice.clone();
            let closing = async move {
                if !notice.is_empty() {
                    let _ = sink.send_frame(notice).await;
                }
                sink.close().await;
            };
            if timeout_at(deadline, closing).await.is_err() {
                debug!("close notice timed out");
            }
        }
        Ok(Err(err)) => warn!(error = %err, "output multiplexer task failed"),
        Err(_) => {
            abort_and_wait(mux).await;
            aborted += 1;
        }
    }

    for (name, handle) in [("input relay", relay), ("engine", engine_task)] {
        if !join_until(deadline, handle).await {
            warn!(task = name, "task outlived teardown timeout, aborted");
            aborted += 1;
        }
    }
    if aborted > 0 {
        counter!(WS_TEARDOWN_ABORTS_TOTAL).increment(aborted);
    }
    transition(&mut state, SessionState::Closed);

    match errors.get() {
        Some(err) if err.is_fault() => Err(err.clone()),
        Some(err) => {
            info!(reason = %err, "session ended");
            Ok(())
        }
        None => Ok(()),
    }
}

/// Join `handle` before `deadline`, aborting it otherwise. Returns whether
/// the task finished on its own.
async fn join_until(deadline: Instant, mut handle: JoinHandle<()>) -> bool {
    match timeout_at(deadline, &mut handle).await {
        Ok(Err(err)) if err.is_panic() => {
            warn!(error = %err, "session task panicked");
            true
        }
        Ok(_) => true,
        Err(_) => {
            abort_and_wait(handle).await;
            false
        }
    }
}

async fn abort_and_wait<T>(handle: JoinHandle<T>) {
    handle.abort();
    let _ = handle.await;
}
