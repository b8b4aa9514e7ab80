use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::error::AppError;
use crate::server::AppState;
use crate::webhook::signature::verify_signature;

pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok());
    if let Err(e) = verify_signature(state.config.webhook_secret(), &body, signature) {
        tracing::warn!(error = %e, "Webhook signature verification failed");
        return StatusCode::UNAUTHORIZED;
    }

    let Some(event_name) = headers.get("x-github-event").and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Missing X-GitHub-Event header");
        return StatusCode::BAD_REQUEST;
    };

    let event = match state.events.parse_event(event_name, &body).await {
        Ok(event) => event,
        Err(AppError::UnsupportedEvent(what)) => {
            tracing::debug!(event_name, what = %what, "Ignoring webhook event");
            return StatusCode::OK;
        }
        Err(e @ AppError::Serialization(_)) => {
            tracing::error!(event_name, error = %e, "Failed to parse webhook event");
            return StatusCode::BAD_REQUEST;
        }
        Err(e) => {
            tracing::error!(event_name, error = %e, "Failed to build event");
            return StatusCode::BAD_GATEWAY;
        }
    };

    if !event.triggers(&state.config.github.trigger_label) {
        tracing::debug!(event = %event.description(), "Event does not trigger generation");
        return StatusCode::OK;
    }

    state.queue.write().await.enqueue(event);
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::config;
    use crate::platform::testing::FakePlatform;
    use crate::webhook::signature::sign;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::with_platform(config(), Arc::new(FakePlatform::default())).unwrap())
    }

    fn labeled(label: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "action": "labeled",
            "label": {"name": label},
            "issue": {
                "number": 42,
                "title": "Widgets render upside down",
                "body": "Every widget is flipped.",
                "labels": [{"name": label}],
                "user": {"login": "alice"}
            },
            "repository": {
                "full_name": "octo/widgets",
                "clone_url": "https://github.com/octo/widgets.git",
                "default_branch": "main"
            }
        }))
        .unwrap()
    }

    fn headers(event_name: &str, body: &[u8], secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-github-event", HeaderValue::from_str(event_name).unwrap());
        headers.insert(
            "x-hub-signature-256",
            HeaderValue::from_str(&sign(secret, body).unwrap()).unwrap(),
        );
        headers
    }

    async fn deliver(state: &Arc<AppState>, headers: HeaderMap, body: Vec<u8>) -> StatusCode {
        handle_webhook(State(Arc::clone(state)), headers, Bytes::from(body)).await
    }

    #[tokio::test]
    async fn test_trigger_label_is_enqueued() {
        let state = state();
        let body = labeled("hyphae");

        let status = deliver(&state, headers("issues", &body, "s3cret"), body).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(state.queue.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_other_label_is_ignored() {
        let state = state();
        let body = labeled("bug");

        let status = deliver(&state, headers("issues", &body, "s3cret"), body).await;

        assert_eq!(status, StatusCode::OK);
        assert!(state.queue.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized() {
        let state = state();
        let body = labeled("hyphae");

        let status = deliver(&state, headers("issues", &body, "wrong"), body).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(state.queue.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_event_is_acknowledged() {
        let state = state();
        let body = b"{}".to_vec();

        let status = deliver(&state, headers("ping", &body, "s3cret"), body).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let state = state();
        let body = b"{\"action\": 1}".to_vec();

        let status = deliver(&state, headers("issues", &body, "s3cret"), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
