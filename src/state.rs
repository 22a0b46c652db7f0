//! Authoritative in-memory run state.
//!
//! Writers publish the run state after every successful status write.
//! Progress subscriptions hold a receiver and park on it while stopped. The
//! status file's `R_STATUS` row is a mirror for the rig controller and is
//! never read back into this store.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::types::RunState;

/// Shared handle to the process-level [`RunState`].
///
/// Clones observe and update the same state.
#[derive(Debug, Clone)]
pub struct RunStateHandle {
    tx: Arc<watch::Sender<RunState>>,
}

impl Default for RunStateHandle {
    fn default() -> Self {
        Self::new(RunState::default())
    }
}

impl RunStateHandle {
    /// Creates a handle holding `initial`.
    pub fn new(initial: RunState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Returns the current run state.
    pub fn get(&self) -> RunState {
        *self.tx.borrow()
    }

    /// Publishes a new run state.
    pub fn set(&self, state: RunState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "run state changed");
        }
    }

    /// Subscribes to run state changes.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.tx.subscribe()
    }
}
