//! HTTP API for swap status and wallet callbacks

use crate::config::ApiConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::swap::SwapView;
use crate::tracker::SwapTracker;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<SwapTracker>,
}

pub fn router(tracker: Arc<SwapTracker>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/swaps", get(list_swaps))
        .route("/swaps/:id", get(get_swap))
        .route("/swaps/:id/begin", post(begin_execution))
        .route("/swaps/:id/complete", post(complete))
        .route("/swaps/:id/fail", post(fail))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { tracker })
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, tracker: Arc<SwapTracker>) -> TrackerResult<()> {
    let app = router(tracker);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TrackerError::Internal(format!("bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| TrackerError::Internal(format!("API server: {}", e)))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracked_swaps: state.tracker.tracked(),
    })
}

async fn list_swaps(State(state): State<AppState>) -> Json<Vec<SwapView>> {
    Json(state.tracker.views().await)
}

async fn get_swap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SwapView>, ApiError> {
    Ok(Json(state.tracker.view(&id).await?))
}

async fn begin_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SwapView>, ApiError> {
    Ok(Json(state.tracker.begin_execution(&id).await?))
}

async fn complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CompleteRequest>, JsonRejection>,
) -> Result<Json<SwapView>, ApiError> {
    let Json(body) = body?;
    if body.tx_id.trim().is_empty() {
        return Err(ApiError(TrackerError::Payload("tx_id must not be empty".to_string())));
    }
    Ok(Json(state.tracker.complete(&id, body.tx_id.trim()).await?))
}

async fn fail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<FailRequest>, JsonRejection>,
) -> Result<Json<SwapView>, ApiError> {
    let Json(body) = body?;
    Ok(Json(state.tracker.fail(&id, &body.reason).await?))
}

/// Maps tracker errors onto HTTP responses
pub struct ApiError(TrackerError);

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(TrackerError::Payload(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TrackerError::SwapNotFound { .. } => StatusCode::NOT_FOUND,
            TrackerError::InvalidTransition { .. } => StatusCode::CONFLICT,
            TrackerError::Payload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// Request and response types

#[derive(Deserialize)]
struct CompleteRequest {
    tx_id: String,
}

#[derive(Deserialize)]
struct FailRequest {
    #[serde(default = "default_fail_reason")]
    reason: String,
}

fn default_fail_reason() -> String {
    "rejected by wallet".to_string()
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    tracked_swaps: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnd::{MockSwapSource, SwapSnapshot};
    use crate::config::TrackerConfig;
    use crate::swap::{ActionKind, ActionOffer, EventSet, ProtocolOrdering, Role};

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn tracker_with_deploy_offer() -> Arc<SwapTracker> {
        let mut source = MockSwapSource::new();
        source
            .expect_list_swaps()
            .returning(|| Ok(vec!["/swaps/abc".to_string()]));
        source.expect_fetch_swap().returning(|href| {
            Ok(SwapSnapshot {
                href: href.to_string(),
                ordering: ProtocolOrdering::AlphaFirst,
                role: Role::Alice,
                events: EventSet::new(),
                offer: Some(ActionOffer::new(ActionKind::Deploy, "/swaps/abc/deploy")),
            })
        });
        source
            .expect_fetch_ledger_action()
            .returning(|_| Err(TrackerError::DetailFetch("offline".to_string())));

        let tracker = Arc::new(SwapTracker::new(
            Arc::new(source),
            None,
            TrackerConfig {
                poll_interval_ms: 1_000,
                detail_fetch_timeout_ms: 100,
                execution_timeout_ms: 100,
                auto_execute: false,
            },
        ));
        tracker.poll_once().await.unwrap();
        tracker
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_swap() {
        let app = router(tracker_with_deploy_offer().await);

        let (status, body) = send(
            app.clone(),
            Request::get("/swaps/abc").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active_step"], "alice-deploy");
        assert_eq!(body["status"], "awaiting_user_interaction");
        assert_eq!(body["requires_user_interaction"], true);

        let (status, body) = send(app, Request::get("/swaps/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_wallet_callbacks() {
        let app = router(tracker_with_deploy_offer().await);

        let (status, body) = send(app.clone(), post_json("/swaps/abc/begin", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "trying_to_execute");

        let (status, _) = send(app.clone(), post_json("/swaps/abc/begin", "{}")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(app.clone(), post_json("/swaps/abc/fail", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "awaiting_user_interaction");

        let (status, _) = send(
            app.clone(),
            post_json("/swaps/abc/complete", r#"{"tx_id":"  "}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            app.clone(),
            post_json("/swaps/abc/complete", r#"{"tx_id":"0xabc"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "waiting_confirmation");
        assert_eq!(body["tx_id"], "0xabc");

        let (status, body) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tracked_swaps"], 1);
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_errors() {
        let app = router(tracker_with_deploy_offer().await);

        let (status, body) = send(app.clone(), post_json("/swaps/abc/complete", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid payload"));

        let (status, body) = send(app.clone(), post_json("/swaps/abc/complete", r#"{"txid":"0x1"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        // no content type
        let (status, body) = send(
            app.clone(),
            Request::post("/swaps/abc/fail")
                .body(Body::from(r#"{"reason":"x"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        // state untouched by rejected requests
        let (_, body) = send(app, Request::get("/swaps/abc").body(Body::empty()).unwrap()).await;
        assert_eq!(body["status"], "awaiting_user_interaction");
    }
}
