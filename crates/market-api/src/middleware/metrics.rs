//! HTTP 요청 metrics middleware.
//!
//! 라벨은 라우터가 매칭한 경로 패턴(`/api/scheduler/{id}/run`)을 씁니다.
//! 매칭되지 않은 요청은 하나의 라벨로 묶고, 메트릭 스크레이프와 헬스 체크는
//! 집계하지 않습니다.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{record_http_duration, record_http_request, record_http_response};

/// 라우트에 매칭되지 않은 요청의 path 라벨.
pub const UNMATCHED_PATH: &str = "unmatched";

/// 집계 제외 경로인지 여부.
fn is_exempt(path: &str) -> bool {
    path == "/metrics" || path == "/health" || path.starts_with("/health/")
}

/// 요청의 path 라벨 결정. 집계 제외 경로면 `None`.
fn metric_path(matched: Option<&str>, raw: &str) -> Option<String> {
    if is_exempt(raw) {
        return None;
    }
    Some(match matched {
        Some(pattern) => pattern.to_string(),
        None => UNMATCHED_PATH.to_string(),
    })
}

/// 각 요청에 대해 `http_requests_total`, `http_responses_total`,
/// `http_request_duration_seconds`를 기록합니다.
///
/// `Router::layer`로 붙여야 [`MatchedPath`]가 채워집니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());
    let Some(path) = metric_path(matched.as_deref(), request.uri().path()) else {
        return next.run(request).await;
    };

    let start = Instant::now();
    let method = request.method().to_string();
    record_http_request(&method, &path);

    let response = next.run(request).await;

    record_http_response(&method, &path, response.status().as_u16());
    record_http_duration(&method, &path, start.elapsed().as_secs_f64());
    response
}
