//! Fire-and-forget dispatch to the downstream sink.
//!
//! Dispatch is decoupled from the inbound request: the pipeline only
//! *schedules* delivery by pushing a job onto a bounded queue, and a
//! dedicated dispatcher task performs the outbound call after a fixed short
//! delay. Call outcomes are reported on an observable channel and logged;
//! they are never surfaced to the inbound caller and never roll back the
//! already-committed dedup record. The service guarantees at most one
//! *attempted* forward per fingerprint, not a successful delivery.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::fingerprint::Fingerprint;

/// Errors that can occur while scheduling or performing a dispatch.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The dispatch queue is full; the job was not scheduled.
    #[error("dispatch queue is full")]
    QueueFull,

    /// The dispatcher has shut down; the job was not scheduled.
    #[error("dispatch queue is closed")]
    QueueClosed,

    /// The outbound request failed before a response arrived.
    #[error("sink request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The sink answered with a non-success status.
    #[error("sink responded with status {0}")]
    SinkStatus(reqwest::StatusCode),
}

/// A scheduled delivery: rendered text plus the fingerprint it was rendered
/// for, carried along for log correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchJob {
    pub fingerprint: Fingerprint,
    pub content: String,
}

/// Result of one dispatch attempt, reported on the outcome channel.
#[derive(Debug)]
pub enum DispatchOutcome {
    Delivered {
        fingerprint: Fingerprint,
    },
    Failed {
        fingerprint: Fingerprint,
        error: ForwardError,
    },
}

/// Handle for scheduling dispatches onto the bounded queue.
#[derive(Debug, Clone)]
pub struct Forwarder {
    tx: mpsc::Sender<DispatchJob>,
}

impl Forwarder {
    /// Creates a forwarder and the receiving end of its job queue.
    ///
    /// The receiver is normally handed to [`run_dispatcher`]; tests hold it
    /// directly to observe what was scheduled.
    pub fn channel(capacity: usize) -> (Forwarder, mpsc::Receiver<DispatchJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Forwarder { tx }, rx)
    }

    /// Schedules delivery of rendered text. Non-blocking; fails only when
    /// the queue is full or the dispatcher is gone.
    pub fn dispatch(&self, fingerprint: Fingerprint, content: String) -> Result<(), ForwardError> {
        self.tx
            .try_send(DispatchJob {
                fingerprint,
                content,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ForwardError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ForwardError::QueueClosed,
            })
    }
}

/// A delivery target for rendered text.
pub trait Sink: Send + Sync + 'static {
    /// Delivers one message; an error means this attempt failed and will not
    /// be retried.
    fn deliver(&self, content: String) -> impl Future<Output = Result<(), ForwardError>> + Send;
}

/// Sink that POSTs `{"content": ...}` to a webhook URL.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> HttpSink {
        HttpSink {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl Sink for HttpSink {
    fn deliver(&self, content: String) -> impl Future<Output = Result<(), ForwardError>> + Send {
        async move {
            let response = self
                .client
                .post(&self.url)
                .json(&serde_json::json!({ "content": content }))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ForwardError::SinkStatus(status));
            }
            Ok(())
        }
    }
}

/// Dispatcher task: drains the job queue, waits out the decoupling delay,
/// and performs the outbound call.
///
/// Each job's outcome is logged and reported on `outcomes` (best-effort; a
/// dropped receiver is ignored). One job's failure never blocks the next.
/// Runs until the queue closes or `shutdown` is cancelled.
pub async fn run_dispatcher<S: Sink>(
    mut jobs: mpsc::Receiver<DispatchJob>,
    sink: S,
    delay: Duration,
    outcomes: mpsc::Sender<DispatchOutcome>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Dispatcher shutting down");
                return;
            }
            job = jobs.recv() => match job {
                Some(job) => job,
                None => {
                    debug!("Dispatch queue closed, dispatcher exiting");
                    return;
                }
            },
        };

        tokio::time::sleep(delay).await;

        let fingerprint = job.fingerprint;
        match sink.deliver(job.content).await {
            Ok(()) => {
                debug!(%fingerprint, "Dispatched message to sink");
                let _ = outcomes
                    .send(DispatchOutcome::Delivered { fingerprint })
                    .await;
            }
            Err(error) => {
                warn!(%fingerprint, %error, "Dispatch to sink failed");
                let _ = outcomes
                    .send(DispatchOutcome::Failed { fingerprint, error })
                    .await;
            }
        }
    }
}
