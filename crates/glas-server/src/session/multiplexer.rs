//! Output multiplexer: engine output to typed client messages.

use std::sync::Arc;

use glas_core::{OutputGrammar, OutputMessage, encode};
use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::error_slot::ErrorSlot;
use crate::errors::SessionError;
use crate::metrics::WS_MESSAGES_OUT_TOTAL;
use crate::websocket::transport::FrameSink;

/// Split each raw engine output through `grammar` and send the results, in
/// order, as the connection's only writer.
///
/// Stops when the engine closes its output, a send fails (reported to
/// `errors`), or `cancel` fires. When the session ended because the engine
/// finished, output it had already queued is still flushed; after any other
/// ending nothing more is written. The sink is handed back so the caller can
/// write the close notice.
pub(crate) async fn run_output_multiplexer<K: FrameSink>(
    mut sink: K,
    mut output: mpsc::Receiver<OutputMessage>,
    grammar: Arc<dyn OutputGrammar>,
    errors: Arc<ErrorSlot>,
    cancel: CancellationToken,
) -> K {
    loop {
        let raw = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            raw = output.recv() => raw,
        };
        let Some(raw) = raw else {
            debug!("engine output closed");
            return sink;
        };

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => return sink,
            sent = emit(&mut sink, grammar.as_ref(), &raw) => sent,
        };
        if let Err(err) = sent {
            debug!(error = %err, "output multiplexer stopped by send failure");
            let _ = errors.report(err);
            return sink;
        }
    }

    if !matches!(errors.get(), Some(SessionError::EngineFinished)) {
        debug!("output multiplexer cancelled");
        return sink;
    }

    // The engine finished: flush its last queued output.
    while let Ok(raw) = output.try_recv() {
        if let Err(err) = emit(&mut sink, grammar.as_ref(), &raw).await {
            let _ = errors.report(err);
            break;
        }
    }
    sink
}

async fn emit<K: FrameSink>(
    sink: &mut K,
    grammar: &dyn OutputGrammar,
    raw: &OutputMessage,
) -> Result<(), SessionError> {
    for msg in grammar.split(&raw.data) {
        let kind = msg.kind;
        sink.send_frame(encode(&msg)?).await?;
        trace!(kind = kind.name(), "message sent");
        counter!(WS_MESSAGES_OUT_TOTAL, "type" => kind.name()).increment(1);
    }
    Ok(())
}
