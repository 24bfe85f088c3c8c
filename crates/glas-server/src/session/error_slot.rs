//! First-error-wins result cell shared by a session's tasks.

use tokio::sync::{Notify, OnceCell};

use crate::errors::SessionError;

/// Write-once holder for the reason a session ended.
///
/// [`ErrorSlot::report`] never blocks; only the first report is kept and
/// later ones are dropped. [`ErrorSlot::wait`] resolves once anything has
/// been reported.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    cell: OnceCell<SessionError>,
    notify: Notify,
}

impl ErrorSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a result. Returns whether this report was retained.
    pub fn report(&self, err: SessionError) -> bool {
        if self.cell.set(err).is_ok() {
            self.notify.notify_one();
            true
        } else {
            false
        }
    }

    /// The retained result, if any.
    pub fn get(&self) -> Option<&SessionError> {
        self.cell.get()
    }

    /// Wait until a result has been retained.
    pub async fn wait(&self) -> &SessionError {
        loop {
            let notified = self.notify.notified();
            if let Some(err) = self.cell.get() {
                return err;
            }
            notified.await;
        }
    }
}
