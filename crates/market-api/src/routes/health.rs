//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템에서 사용됩니다. 캐시 저장소 장애는
//! 서비스가 합성 데이터로 계속 응답하므로 `degraded`로만 보고합니다.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 서비스 상태 ("healthy" | "degraded")
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    /// 현재 시간 (ISO 8601)
    pub timestamp: String,
    pub components: ComponentHealth,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub cache_store: ComponentStatus,
    pub scheduler: ComponentStatus,
    pub quote_provider: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// 상태 ("up" | "down" | "not_configured")
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn up() -> Self {
        Self {
            status: "up".to_string(),
            message: None,
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn not_configured() -> Self {
        Self {
            status: "not_configured".to_string(),
            message: None,
        }
    }

    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            message: Some(message.into()),
        }
    }
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 상세 헬스 체크 (readiness probe용).
///
/// GET /health/ready
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut overall_status = "healthy";

    let cache_store = match state.market.store_backend() {
        None => ComponentStatus::not_configured(),
        Some(backend) => match state.market.ping_store().await {
            Ok(()) => ComponentStatus::up_with_info(backend),
            Err(e) => {
                overall_status = "degraded";
                ComponentStatus::down(e.to_string())
            }
        },
    };

    let scheduler = {
        let status = state.scheduler.status().await;
        let info = format!("{} tasks registered", status.tasks.len());
        if status.running {
            ComponentStatus::up_with_info(info)
        } else if state.config.scheduler.enabled {
            overall_status = "degraded";
            ComponentStatus::down(format!("not running, {}", info))
        } else {
            ComponentStatus::not_configured()
        }
    };

    let quote_provider = if state.adapter.has_provider() {
        ComponentStatus::up()
    } else {
        ComponentStatus::not_configured()
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            cache_store,
            scheduler,
            quote_provider,
        },
    };

    (StatusCode::OK, Json(response))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
