//! Input relay: client frames to engine input.

use std::sync::Arc;

use glas_core::{InputMessage, decode_bytes};
use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error_slot::ErrorSlot;
use crate::errors::SessionError;
use crate::metrics::WS_FRAMES_IN_TOTAL;
use crate::websocket::transport::FrameSource;

/// Forward decoded client frames to the engine until the connection ends,
/// a frame fails to decode, the engine stops reading, or `cancel` fires.
///
/// A close or decode failure is reported to `errors`. The first bad frame
/// ends the relay.
pub(crate) async fn run_input_relay<S: FrameSource>(
    mut source: S,
    input: mpsc::Sender<InputMessage>,
    errors: Arc<ErrorSlot>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            received = source.receive_frame() => received,
        };

        let frame = match received {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "input relay stopped by transport");
                let _ = errors.report(err.into());
                return;
            }
        };

        let msg = match decode_bytes::<InputMessage>(frame.as_bytes()) {
            Ok(msg) => msg,
            Err(err) => {
                debug!(error = %err, "input relay stopped by malformed frame");
                let _ = errors.report(SessionError::from(err));
                return;
            }
        };

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            sent = input.send(msg) => sent,
        };
        if sent.is_err() {
            debug!("engine input closed");
            return;
        }
        counter!(WS_FRAMES_IN_TOTAL).increment(1);
    }
}
