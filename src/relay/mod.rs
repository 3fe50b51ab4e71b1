//! The deduplication-and-forwarding pipeline.
//!
//! Per event: fingerprint, check the store, short-circuit on a duplicate,
//! otherwise record, render, and schedule dispatch. The whole sequence runs
//! under a process-wide serialization gate so two concurrent submissions of
//! the same event cannot both observe "not seen" and both forward.
//!
//! ```text
//! Received -> Fingerprinted -> Duplicate                      (respond dupe=true)
//!                           -> Recorded -> Rendered
//!                                       -> Dispatch-Scheduled (respond dupe=false)
//!                                       -> Dispatch-Attempted (async, unobserved)
//! ```

pub mod event;
pub mod fingerprint;
pub mod forward;
pub mod render;

pub use event::ChatEvent;
pub use fingerprint::{Fingerprint, fingerprint};
pub use forward::{
    DispatchJob, DispatchOutcome, ForwardError, Forwarder, HttpSink, Sink, run_dispatcher,
};
pub use render::render;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::store::{DedupStore, StoreError};

/// Errors the pipeline can surface to the transport shell.
///
/// A duplicate insert is not among them: the store's constraint violation is
/// folded into [`RelayOutcome::Duplicate`].
#[derive(Debug, Error)]
pub enum RelayError {
    /// The store failed for a reason other than a duplicate key.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Dispatch could not be scheduled. The dedup record is already
    /// committed at this point and is deliberately not rolled back.
    #[error("dispatch scheduling failed: {0}")]
    Dispatch(#[from] ForwardError),
}

/// Result of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// First sighting: recorded and scheduled for dispatch.
    Forwarded,
    /// Already seen; nothing was dispatched.
    Duplicate,
}

impl RelayOutcome {
    pub fn is_duplicate(self) -> bool {
        matches!(self, RelayOutcome::Duplicate)
    }
}

/// Composes the store, gate, renderer, and forwarder into the
/// request-handling contract.
pub struct RelayPipeline {
    store: DedupStore,
    forwarder: Forwarder,
    /// Process-wide gate serializing {exists-check, insert, render,
    /// schedule}. Deliberately not keyed per fingerprint: traffic is a
    /// single clan's chat, and the store's exclusive create remains an
    /// independent backstop should the gate discipline ever regress.
    gate: Mutex<()>,
}

impl RelayPipeline {
    pub fn new(store: DedupStore, forwarder: Forwarder) -> RelayPipeline {
        RelayPipeline {
            store,
            forwarder,
            gate: Mutex::new(()),
        }
    }

    /// Handles one decoded event: exactly-once forwarding decision plus
    /// dispatch scheduling.
    ///
    /// Returns as soon as dispatch is scheduled; delivery happens later on
    /// the dispatcher task. The guard releases the gate on every exit path,
    /// including the error returns. Nothing under the gate touches the
    /// network, which keeps the hold to a few file operations.
    pub async fn handle(&self, event: ChatEvent) -> Result<RelayOutcome, RelayError> {
        let _guard = self.gate.lock().await;

        let fingerprint = fingerprint(&event);

        if self.store.exists(&fingerprint) {
            debug!(%fingerprint, "Duplicate event, skipping");
            return Ok(RelayOutcome::Duplicate);
        }

        match self.store.insert(&fingerprint, event.timestamp) {
            Ok(()) => {}
            // Raced past the exists check; the constraint caught it.
            Err(StoreError::AlreadyRecorded(_)) => {
                debug!(%fingerprint, "Duplicate event caught by store constraint");
                return Ok(RelayOutcome::Duplicate);
            }
            Err(e) => return Err(e.into()),
        }

        let text = render(&event);
        self.forwarder.dispatch(fingerprint.clone(), text)?;

        info!(%fingerprint, "Event recorded and dispatch scheduled");
        Ok(RelayOutcome::Forwarded)
    }
}
