//! Webhook endpoint handler.
//!
//! The upstream plugin POSTs a form whose `data` field carries the JSON chat
//! event. The handler decodes the event, runs it through the relay pipeline,
//! and answers with the duplicate verdict. It returns as soon as dispatch is
//! scheduled; it never waits for delivery.

use axum::Form;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::relay::{ChatEvent, RelayError};

/// Errors that can occur when processing a webhook request.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The `data` field did not decode into a chat event (bad JSON, or a
    /// required field like `content`/`timestamp` is missing). Rejected
    /// before fingerprinting; never reaches the store or the sink.
    #[error("malformed event payload: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    /// The pipeline failed past the decode stage.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            WebhookError::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Inbound form body: a single `data` field holding the JSON payload.
#[derive(Debug, Deserialize)]
pub struct WebhookForm {
    pub data: String,
}

/// Response body: `dupe` is the stringly-typed verdict the upstream plugin
/// expects (`"true"` for an already-seen event).
#[derive(Debug, Serialize, Deserialize)]
pub struct DupeResponse {
    pub dupe: String,
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST, `application/x-www-form-urlencoded`
/// - `data`: JSON text `{author?, content, timestamp, broadcast?}`
///
/// # Response
///
/// - 200 OK `{"dupe": "false"}` - first sighting, dispatch scheduled
/// - 200 OK `{"dupe": "true"}` - duplicate, nothing dispatched
/// - 400 Bad Request - payload did not decode into a chat event
/// - 500 Internal Server Error - store or scheduling failure
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    Form(form): Form<WebhookForm>,
) -> Result<Json<DupeResponse>, WebhookError> {
    let event: ChatEvent = serde_json::from_str(&form.data).map_err(|e| {
        warn!(error = %e, "Rejecting malformed event payload");
        WebhookError::MalformedEvent(e)
    })?;

    debug!(
        author = event.author.as_deref().unwrap_or("<none>"),
        broadcast = event.broadcast,
        "Received chat event"
    );

    let outcome = app_state.pipeline().handle(event).await?;

    Ok(Json(DupeResponse {
        dupe: if outcome.is_duplicate() {
            "true".to_string()
        } else {
            "false".to_string()
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_event_maps_to_bad_request() {
        let error = serde_json::from_str::<ChatEvent>("not json").unwrap_err();
        let response = WebhookError::MalformedEvent(error).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn relay_errors_map_to_internal_error() {
        let error = RelayError::Dispatch(crate::relay::ForwardError::QueueFull);
        let response = WebhookError::Relay(error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
