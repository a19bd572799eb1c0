//! 시장 데이터 endpoint.
//!
//! - `GET /api/market-data`: 캐시 또는 합성 데이터셋. 항상 200
//! - `POST /api/market-data`: `{ "action": "update" }`로 시뮬레이션 틱 1회
//!
//! 저장소 장애는 상태 코드가 아닌 응답 필드(`isFromRedis`, `source`,
//! `error`)로 알립니다. 숫자 필드는 응답 직전에만 소수점 2자리로 반올림합니다.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::LegacyError;
use crate::metrics::{record_market_read, record_tick};
use crate::state::AppState;

pub const UPDATE_ACTION: &str = "update";

/// 쓰기 요청 본문.
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

/// GET /api/market-data
pub async fn get_market_data(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.market.read().await;
    record_market_read(if snapshot.from_cache { "cache_hit" } else { "fallback" });

    let mut body = serde_json::to_value(snapshot.data.rounded()).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize market data");
        json!({})
    });

    if let Some(map) = body.as_object_mut() {
        let now = chrono::Utc::now().to_rfc3339();
        map.insert("isFromRedis".to_string(), Value::Bool(snapshot.from_cache));
        if snapshot.from_cache {
            map.insert("lastFetched".to_string(), Value::String(now));
        } else {
            map.insert("lastUpdated".to_string(), Value::String(now));
        }
        if let Some(error) = snapshot.error {
            map.insert("error".to_string(), Value::String(error));
        }
    }

    Json(body)
}

/// POST /api/market-data
pub async fn post_market_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<Value>, LegacyError> {
    let Json(request) = payload.map_err(|rejection| {
        LegacyError::new(StatusCode::BAD_REQUEST, "Invalid request body")
            .with_details(Value::String(rejection.body_text()))
    })?;

    if request.action != UPDATE_ACTION {
        return Err(LegacyError::new(StatusCode::BAD_REQUEST, "Invalid action"));
    }

    let outcome = state.market.update().await;
    record_tick(outcome.persisted, outcome.trends_updated);
    info!(
        persisted = outcome.persisted,
        trends_updated = outcome.trends_updated,
        source = %outcome.data.source,
        "Market data tick applied"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Market data updated successfully",
        "persisted": outcome.persisted,
        "source": outcome.data.source,
        "trendsUpdated": outcome.trends_updated,
    })))
}

pub fn market_data_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_market_data).post(post_market_data))
}
