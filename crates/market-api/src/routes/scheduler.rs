//! 스케줄러 관리 endpoint.
//!
//! - `GET /api/scheduler`: 등록된 작업과 실행 이력
//! - `POST /api/scheduler/{id}/run`: 간격과 관계없이 즉시 실행

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::error::{ApiErrorResponse, ApiResult};
use crate::state::AppState;
use crate::tasks::{SchedulerError, SchedulerStatus, TaskRun};

/// GET /api/scheduler
pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

/// POST /api/scheduler/{id}/run
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskRun>> {
    state.scheduler.run_now(&id).await.map(Json).map_err(|e| {
        let (status, code) = match e {
            SchedulerError::TaskNotFound(_) => (StatusCode::NOT_FOUND, "TASK_NOT_FOUND"),
            SchedulerError::AlreadyRunning(_) => (StatusCode::CONFLICT, "TASK_ALREADY_RUNNING"),
            SchedulerError::DuplicateTask(_) => (StatusCode::CONFLICT, "TASK_DUPLICATE"),
        };
        ApiErrorResponse::new(code, e.to_string()).into_error(status)
    })
}

pub fn scheduler_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(scheduler_status))
        .route("/{id}/run", post(run_task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{body::Body, http::Request};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        let state = create_test_state();
        state.register_default_tasks().await.unwrap();
        Router::new()
            .nest("/api/scheduler", scheduler_router())
            .with_state(Arc::new(state))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_lists_tasks() {
        let request = Request::builder().uri("/api/scheduler").body(Body::empty()).unwrap();
        let (status, body) = send(app().await, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], false);
        assert_eq!(body["tasks"][0]["id"], "market-data-refresh");
        assert_eq!(body["tasks"][0]["intervalSecs"], 86_400);
        assert!(body["tasks"][0]["lastRun"].is_null());
    }

    #[tokio::test]
    async fn test_run_now_and_history() {
        let app = app().await;
        let run = Request::builder()
            .method("POST")
            .uri("/api/scheduler/market-data-refresh/run")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app.clone(), run).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trigger"], "manual");
        assert_eq!(body["outcome"]["status"], "succeeded");

        let request = Request::builder().uri("/api/scheduler").body(Body::empty()).unwrap();
        let (_, body) = send(app, request).await;
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
        assert!(body["tasks"][0]["lastRun"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/scheduler/nope/run")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app().await, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TASK_NOT_FOUND");
        assert_eq!(body["message"], "Task with id nope not found");
    }
}
