//! AI 시장 분석 endpoint.
//!
//! `POST /api/ai` 처리 순서:
//! 1. rate limit (미들웨어, 허용된 응답에도 `X-RateLimit-*` 헤더)
//! 2. Origin 허용 목록 (403)
//! 3. 본문 검증 (400 `Invalid request format`)
//! 4. 완성 제공자 호출 1회

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::ORIGIN, HeaderMap, StatusCode},
    middleware,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, warn};
use validator::Validate;

use crate::error::LegacyError;
use crate::middleware::rate_limit_middleware;
use crate::services::{system_prompt, ChatMessage, ChatRole};
use crate::state::AppState;

/// 대화 메시지 하나.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AiMessage {
    pub role: ChatRole,
    #[validate(length(max = 4000, message = "message content must be at most 4000 characters"))]
    pub content: String,
}

/// 요청 본문.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    #[validate(length(max = 20, message = "at most 20 messages are allowed"), nested)]
    pub messages: Vec<AiMessage>,
    pub market_data: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct AiResponse {
    pub role: ChatRole,
    pub content: String,
}

fn invalid_format(details: Value) -> LegacyError {
    LegacyError::new(StatusCode::BAD_REQUEST, "Invalid request format").with_details(details)
}

/// POST /api/ai
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<AiRequest>, JsonRejection>,
) -> Result<Json<AiResponse>, LegacyError> {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    if !state.is_origin_allowed(origin) {
        warn!(origin = origin.unwrap_or(""), "Rejected AI request from unauthorized origin");
        return Err(LegacyError::new(StatusCode::FORBIDDEN, "Unauthorized origin"));
    }

    let Json(request) =
        payload.map_err(|rejection| invalid_format(Value::String(rejection.body_text())))?;
    if let Err(errors) = request.validate() {
        return Err(invalid_format(
            serde_json::to_value(&errors).unwrap_or(Value::Null),
        ));
    }

    let Some(provider) = state.completion.as_ref() else {
        return Err(LegacyError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "AI provider not configured",
        ));
    };

    let context = request.market_data.map(Value::Object);
    let messages: Vec<ChatMessage> = std::iter::once(ChatMessage::system(system_prompt(context.as_ref())))
        .chain(request.messages.into_iter().map(|m| ChatMessage {
            role: m.role,
            content: m.content,
        }))
        .collect();

    match provider.complete(&messages).await {
        Ok(content) => Ok(Json(AiResponse {
            role: ChatRole::Assistant,
            content,
        })),
        Err(e) => {
            error!(provider = provider.name(), error = %e, "AI API error");
            Err(LegacyError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate AI response",
            ))
        }
    }
}

/// rate limit 미들웨어가 적용된 라우터.
pub fn ai_router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(analyze))
        .route_layer(middleware::from_fn_with_state(
            state.ai_limiter.clone(),
            rate_limit_middleware,
        ))
}
