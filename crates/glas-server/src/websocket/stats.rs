//! Session outcome counters.

use parking_lot::Mutex;

use crate::errors::SessionError;

/// Point-in-time copy of [`SessionStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Sessions currently running.
    pub active: usize,
    /// Sessions that ended without a fault.
    pub completed: u64,
    /// Sessions that ended with a fault.
    pub faulted: u64,
    /// The most recent surfaced fault.
    pub last_fault: Option<SessionError>,
}

/// Live counters shared between the server and its sessions.
#[derive(Debug, Default)]
pub struct SessionStats {
    inner: Mutex<StatsSnapshot>,
}

impl SessionStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session starting.
    pub fn opened(&self) {
        self.inner.lock().active += 1;
    }

    /// Record a session ending with `outcome`.
    pub fn closed(&self, outcome: &Result<(), SessionError>) {
        let mut inner = self.inner.lock();
        inner.active = inner.active.saturating_sub(1);
        match outcome {
            Ok(()) => inner.completed += 1,
            Err(err) => {
                inner.faulted += 1;
                inner.last_fault = Some(err.clone());
            }
        }
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().clone()
    }
}
