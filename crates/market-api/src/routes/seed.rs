//! 캐시 시드 endpoint.
//!
//! `GET /api/seed`: 업스트림 pass를 한 번 실행해 짧은 TTL로 저장합니다.
//! 결과가 너무 적으면 합성 데이터셋을 대신 저장합니다. 저장 실패도 200으로
//! 응답합니다.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use market_core::{catalog, MarketData};
use market_data::FallbackGenerator;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

/// 지수 수가 `min_instruments`보다 적으면 합성 데이터셋으로 교체합니다.
///
/// 현재 어댑터는 실패한 지수도 대체 항목으로 채워 카탈로그 전체를 돌려주므로
/// 이 분기는 부분 결과를 돌려주는 어댑터를 위한 보호 장치입니다.
fn ensure_minimum(data: MarketData, min_instruments: usize) -> MarketData {
    if data.instrument_count() >= min_instruments {
        return data;
    }
    warn!(
        instruments = data.instrument_count(),
        min_instruments, "Not enough data received upstream, using fallback data"
    );
    FallbackGenerator::new().dataset(catalog(), Utc::now())
}

/// GET /api/seed
pub async fn seed(State(state): State<Arc<AppState>>) -> Json<Value> {
    let outcome = state.adapter.fetch_all(catalog()).await;
    let min_instruments = state.config.scheduler.min_instruments;

    let data = ensure_minimum(outcome.data, min_instruments);

    let ttl = state.market.config().tick_ttl_secs;
    let stored = match state.market.store_dataset(&data, ttl).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Error storing seeded data");
            false
        }
    };

    info!(source = %data.source, stored, "Market data seeded");

    Json(json!({
        "success": true,
        "message": "Market data processed successfully!",
        "timestamp": Utc::now().to_rfc3339(),
        "source": data.source,
        "stored": stored,
    }))
}

pub fn seed_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(seed))
}
