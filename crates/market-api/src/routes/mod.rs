//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/market-data` - 시장 데이터 조회(GET) / 시뮬레이션 틱(POST)
//! - `/api/ai` - AI 시장 분석 (rate limit 적용)
//! - `/api/scheduler` - 스케줄러 상태 / 수동 실행
//! - `/api/seed` - 캐시 시드
//! - `/metrics` - Prometheus 메트릭

pub mod ai;
pub mod health;
pub mod market_data;
pub mod scheduler;
pub mod seed;

pub use ai::{ai_router, AiMessage, AiRequest, AiResponse};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use market_data::{market_data_router, ActionRequest};
pub use scheduler::scheduler_router;
pub use seed::seed_router;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::Arc;

use crate::state::AppState;

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// 전체 API 라우터 생성.
///
/// AI 라우트의 rate limit 미들웨어가 상태의 limiter를 쓰므로 상태를 받습니다.
pub fn create_api_router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/market-data", market_data_router())
        .nest("/api/ai", ai_router(state))
        .nest("/api/scheduler", scheduler_router())
        .nest("/api/seed", seed_router())
        .route("/metrics", get(metrics_handler))
}
