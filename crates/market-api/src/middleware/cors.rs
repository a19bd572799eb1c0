//! CORS 레이어 구성.
//!
//! 허용 목록은 AI 라우트의 origin 검사(`AppState::is_origin_allowed`)와 같은
//! 설정을 씁니다. 목록이 비어 있으면 개발 모드로 모든 origin을 허용하고,
//! 목록이 설정됐지만 유효한 항목이 없으면 모든 origin을 거부합니다.

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use market_core::AppConfig;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// 설정에서 CORS 레이어를 생성합니다.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if config.is_development() {
        warn!("ALLOWED_ORIGINS not set, allowing any origin (development mode)");
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .ai
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin.escape_debug(), "Ignoring invalid allowed origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        warn!("ALLOWED_ORIGINS contains no valid origins, denying cross-origin requests");
    } else {
        info!("CORS configured with {} allowed origins", origins.len());
    }
    cors.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    async fn allow_origin_header(config: &AppConfig, origin: &str) -> Option<String> {
        let app = Router::new()
            .route("/api/market-data", get(|| async { "OK" }))
            .layer(cors_layer(config));
        let request = Request::builder()
            .uri("/api/market-data")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    fn config_with(origins: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.ai.allowed_origins = origins.iter().map(|s| s.to_string()).collect();
        config
    }

    #[tokio::test]
    async fn test_empty_list_allows_any_origin() {
        let config = config_with(&[]);
        assert_eq!(
            allow_origin_header(&config, "https://anywhere.example").await.as_deref(),
            Some("*")
        );
    }

    #[tokio::test]
    async fn test_listed_origin_only() {
        let config = config_with(&["https://dash.example"]);
        assert_eq!(
            allow_origin_header(&config, "https://dash.example").await.as_deref(),
            Some("https://dash.example")
        );
        assert_eq!(allow_origin_header(&config, "https://other.example").await, None);
    }

    #[tokio::test]
    async fn test_unparseable_list_denies_all() {
        let config = config_with(&["https://bad\norigin.example"]);
        assert!(!config.is_development());
        assert_eq!(allow_origin_header(&config, "https://dash.example").await, None);
    }
}
