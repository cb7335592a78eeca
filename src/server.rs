//! HTTP review API for an external reviewer UI.

use crate::error::HarvestError;
use crate::insight::Insight;
use crate::jobs::{JobTracker, ProcessingJob};
use crate::review::{PendingFilter, QualityStats, ReviewQueue};
use crate::store::Records;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared application state.
pub struct AppState {
    review: ReviewQueue,
    jobs: JobTracker,
}

impl AppState {
    pub fn new(records: Records) -> Self {
        Self {
            review: ReviewQueue::new(records.clone()),
            jobs: JobTracker::new(records),
        }
    }
}

/// Build the router with permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/insights/pending", get(pending))
        .route("/insights/{id}/approve", post(approve))
        .route("/insights/{id}/reject", post(reject))
        .route("/jobs", get(jobs))
        .route("/stats", get(stats))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Debug, Deserialize, Default)]
struct PendingQuery {
    category: Option<String>,
    #[serde(default)]
    flagged: bool,
}

#[derive(Serialize)]
struct PendingResponse {
    count: usize,
    insights: Vec<Insight>,
}

#[derive(Deserialize)]
struct RejectRequest {
    reason: String,
}

#[derive(Serialize)]
struct JobsResponse {
    jobs: Vec<ProcessingJob>,
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: QualityStats,
    pending: usize,
    approval_rate: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(error: HarvestError) -> Response {
    let status = match &error {
        HarvestError::NotFound(_) => StatusCode::NOT_FOUND,
        HarvestError::InvalidTransition(_) => StatusCode::CONFLICT,
        HarvestError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(error = %error, "Request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> Response {
    let filter = PendingFilter {
        category: query.category,
        needs_review_only: query.flagged,
    };
    match state.review.pending(&filter).await {
        Ok(insights) => Json(PendingResponse {
            count: insights.len(),
            insights,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn approve(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let result = match state.review.resolve_id(&id).await {
        Ok(id) => state.review.approve(id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(insight) => Json(insight).into_response(),
        Err(e) => error_response(e),
    }
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Response {
    if req.reason.trim().is_empty() {
        return error_response(HarvestError::InvalidInput("reason is required".to_string()));
    }
    let result = match state.review.resolve_id(&id).await {
        Ok(id) => state.review.reject(id, &req.reason).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(insight) => Json(insight).into_response(),
        Err(e) => error_response(e),
    }
}

async fn jobs(State(state): State<Arc<AppState>>) -> Response {
    match state.jobs.list().await {
        Ok(jobs) => Json(JobsResponse { jobs }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn stats(State(state): State<Arc<AppState>>) -> Response {
    let stats = match state.review.stats().await {
        Ok(stats) => stats,
        Err(e) => return error_response(e),
    };
    match state.review.pending(&PendingFilter::default()).await {
        Ok(pending) => Json(StatsResponse {
            approval_rate: stats.approval_rate(),
            stats,
            pending: pending.len(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::tests::sample_insight;
    use crate::store::MemoryKeyValueStore;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn state_with(insights: &[Insight]) -> Arc<AppState> {
        let state = AppState::new(Records::new(Arc::new(MemoryKeyValueStore::new())));
        state.review.enqueue(insights).await.unwrap();
        Arc::new(state)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_pending_then_approve() {
        let insight = sample_insight("Name the feeling");
        let state = state_with(&[insight.clone()]).await;

        let response = pending(State(state.clone()), Query(PendingQuery::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["count"], 1);

        let response = approve(State(state.clone()), Path(insight.id.to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["review_state"], "approved");

        let again = approve(State(state.clone()), Path(insight.id.to_string())).await;
        assert_eq!(again.status(), StatusCode::CONFLICT);

        let response = stats(State(state)).await;
        let body = body_json(response).await;
        assert_eq!(body["approved"], 1);
        assert_eq!(body["pending"], 0);
    }

    #[tokio::test]
    async fn test_reject_requires_reason_and_known_id() {
        let insight = sample_insight("Slow down");
        let state = state_with(&[insight.clone()]).await;

        let blank = reject(
            State(state.clone()),
            Path(insight.id.to_string()),
            Json(RejectRequest {
                reason: " ".to_string(),
            }),
        )
        .await;
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let missing = reject(
            State(state.clone()),
            Path(uuid::Uuid::new_v4().to_string()),
            Json(RejectRequest {
                reason: "vague".to_string(),
            }),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let ok = reject(
            State(state),
            Path(insight.id.to_string()),
            Json(RejectRequest {
                reason: "vague".to_string(),
            }),
        )
        .await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_json(ok).await["rejection_reason"], "vague");
    }
}
