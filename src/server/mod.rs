//! HTTP transport shell.
//!
//! A thin layer over the relay pipeline:
//!
//! - `POST /webhook` - accepts a chat event, answers with the duplicate verdict
//! - `GET /health` - liveness probe
//!
//! Request parsing ends at handing a decoded [`ChatEvent`](crate::relay::ChatEvent)
//! to the pipeline; everything with correctness weight lives in [`crate::relay`].

use std::sync::Arc;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::webhook_handler;

use crate::relay::RelayPipeline;

/// Shared application state, passed to handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<RelayPipeline>,
}

impl AppState {
    pub fn new(pipeline: RelayPipeline) -> Self {
        AppState {
            inner: Arc::new(pipeline),
        }
    }

    /// Returns the relay pipeline.
    pub fn pipeline(&self) -> &RelayPipeline {
        &self.inner
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::relay::{DispatchJob, Forwarder};
    use crate::server::webhook::DupeResponse;
    use crate::store::DedupStore;

    /// Builds an app over a fresh store, keeping the dispatch queue's
    /// receiving end so tests can observe what got scheduled.
    fn test_app(
        dir: &std::path::Path,
    ) -> (axum::Router, tokio::sync::mpsc::Receiver<DispatchJob>) {
        let store = DedupStore::open(dir).unwrap();
        let (forwarder, jobs) = Forwarder::channel(16);
        let app = build_router(AppState::new(RelayPipeline::new(store, forwarder)));
        (app, jobs)
    }

    /// Percent-encodes a JSON payload into the `data` form field.
    fn form_body(payload: &serde_json::Value) -> String {
        let mut body = String::from("data=");
        for byte in payload.to_string().bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    body.push(byte as char);
                }
                b' ' => body.push('+'),
                _ => body.push_str(&format!("%{:02X}", byte)),
            }
        }
        body
    }

    fn webhook_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn dupe_verdict(response: axum::response::Response) -> String {
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: DupeResponse = serde_json::from_slice(&bytes).unwrap();
        parsed.dupe
    }

    #[tokio::test]
    async fn health_returns_200() {
        let dir = tempdir().unwrap();
        let (app, _jobs) = test_app(dir.path());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn resubmitted_event_reports_dupe() {
        let dir = tempdir().unwrap();
        let (app, mut jobs) = test_app(dir.path());
        let payload = serde_json::json!({
            "author": "Bob",
            "content": "hello",
            "timestamp": 1690000000123i64,
        });

        let first = app
            .clone()
            .oneshot(webhook_request(form_body(&payload)))
            .await
            .unwrap();
        assert_eq!(dupe_verdict(first).await, "false");

        let second = app
            .oneshot(webhook_request(form_body(&payload)))
            .await
            .unwrap();
        assert_eq!(dupe_verdict(second).await, "true");

        // One dispatch total, with the author-prefixed rendering.
        let job = jobs.try_recv().unwrap();
        assert_eq!(job.content, "**Bob**: hello");
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_event_is_dispatched_verbatim() {
        let dir = tempdir().unwrap();
        let (app, mut jobs) = test_app(dir.path());
        let payload = serde_json::json!({
            "content": "Server restarting",
            "timestamp": 1690000000000i64,
            "broadcast": true,
        });

        let response = app
            .oneshot(webhook_request(form_body(&payload)))
            .await
            .unwrap();
        assert_eq!(dupe_verdict(response).await, "false");

        assert_eq!(jobs.try_recv().unwrap().content, "Server restarting");
    }

    #[tokio::test]
    async fn marker_substitution_applies_end_to_end() {
        let dir = tempdir().unwrap();
        let (app, mut jobs) = test_app(dir.path());
        let payload = serde_json::json!({
            "author": "Amy",
            "content": "status <img=2> ready",
            "timestamp": 1690000000123i64,
        });

        let response = app
            .oneshot(webhook_request(form_body(&payload)))
            .await
            .unwrap();
        assert_eq!(dupe_verdict(response).await, "false");

        assert_eq!(
            jobs.try_recv().unwrap().content,
            "**Amy**: status <:Ironman_chat_badge:1082980848200065034> ready"
        );
    }

    #[tokio::test]
    async fn payload_missing_content_returns_400_and_dispatches_nothing() {
        let dir = tempdir().unwrap();
        let (app, mut jobs) = test_app(dir.path());
        let payload = serde_json::json!({
            "author": "Bob",
            "timestamp": 1690000000123i64,
        });

        let response = app
            .oneshot(webhook_request(form_body(&payload)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn payload_missing_timestamp_returns_400() {
        let dir = tempdir().unwrap();
        let (app, _jobs) = test_app(dir.path());
        let payload = serde_json::json!({
            "author": "Bob",
            "content": "hello",
        });

        let response = app
            .oneshot(webhook_request(form_body(&payload)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unparseable_data_field_returns_400() {
        let dir = tempdir().unwrap();
        let (app, _jobs) = test_app(dir.path());

        let response = app
            .oneshot(webhook_request("data=not%20json".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_data_field_is_rejected() {
        let dir = tempdir().unwrap();
        let (app, _jobs) = test_app(dir.path());

        let response = app
            .oneshot(webhook_request("other=field".to_string()))
            .await
            .unwrap();

        // Axum's Form extractor rejects the body before the handler runs.
        assert!(response.status().is_client_error());
    }
}
