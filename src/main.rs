use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_relay::config::Config;
use chat_relay::relay::{
    DispatchOutcome, Forwarder, HttpSink, RelayPipeline, run_dispatcher,
};
use chat_relay::server::{AppState, build_router};
use chat_relay::store::DedupStore;
use chat_relay::store::retention::prune_expired_records;

/// Capacity of the dispatch queue. A full queue fails the inbound request
/// rather than blocking the gate.
const DISPATCH_QUEUE_CAPACITY: usize = 256;

/// How often the retention sweep runs.
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let store = match DedupStore::open(&config.data_dir) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, dir = %config.data_dir.display(), "Cannot open record store");
            std::process::exit(1);
        }
    };

    let (forwarder, jobs) = Forwarder::channel(DISPATCH_QUEUE_CAPACITY);
    let (outcome_tx, mut outcome_rx) = tokio::sync::mpsc::channel(DISPATCH_QUEUE_CAPACITY);
    let shutdown = CancellationToken::new();

    let sink = HttpSink::new(config.sink_url.clone());
    tokio::spawn(run_dispatcher(
        jobs,
        sink,
        Duration::from_millis(config.dispatch_delay_ms),
        outcome_tx,
        shutdown.clone(),
    ));

    // Dispatch outcomes are fire-and-forget from the caller's perspective;
    // failures surface only here, in the logs.
    tokio::spawn(async move {
        while let Some(outcome) = outcome_rx.recv().await {
            if let DispatchOutcome::Failed { fingerprint, error } = outcome {
                warn!(%fingerprint, %error, "Message was not delivered to the sink");
            }
        }
    });

    if config.dedupe_ttl_hours > 0 {
        let sweep_store = store.clone();
        let ttl_hours = config.dedupe_ttl_hours;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                match prune_expired_records(&sweep_store, ttl_hours) {
                    Ok(0) => {}
                    Ok(pruned) => info!(pruned, "Retention sweep removed expired records"),
                    Err(e) => warn!(error = %e, "Retention sweep failed"),
                }
            }
        });
    }

    let pipeline = RelayPipeline::new(store, forwarder);
    let app = build_router(AppState::new(pipeline));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
