//! 시장 데이터 API 서버 진입점.
//!
//! 설정 로드, 캐시 저장소 연결, 업스트림/AI 제공자 구성, 스케줄러 시작 후
//! Axum 서버를 띄웁니다. Ctrl+C 또는 SIGTERM을 받으면 스케줄러를 멈추고
//! 진행 중인 요청을 마친 뒤 종료합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, Router};
use market_core::{catalog, init_logging_from_env, AppConfig};
use market_data::{
    AlphaVantageClient, CacheStore, DataSourceAdapter, QuoteProvider, RedisCache,
};
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use market_api::metrics::setup_metrics_recorder;
use market_api::middleware::{cors_layer, metrics_layer};
use market_api::routes::create_api_router;
use market_api::services::OpenAiCompletion;
use market_api::state::AppState;

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config);

    create_api_router(&state)
        .with_state(state)
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(cors)
}

/// 캐시 저장소 연결. 실패하면 저장소 없이 동작합니다.
async fn connect_store(config: &AppConfig) -> Option<Arc<dyn CacheStore>> {
    let Some(url) = config.redis.url.as_deref() else {
        warn!("REDIS_URL not set, running without cache store");
        return None;
    };

    match RedisCache::connect(url, &config.redis).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(error = %e, "Failed to connect to Redis, running without cache store");
            None
        }
    }
}

/// 업스트림 어댑터 구성. API 키가 없으면 합성 데이터만 사용합니다.
fn build_adapter(config: &AppConfig) -> DataSourceAdapter {
    let provider = match AlphaVantageClient::from_config(&config.provider) {
        Ok(Some(client)) => Some(Arc::new(client) as Arc<dyn QuoteProvider>),
        Ok(None) => {
            warn!("ALPHA_VANTAGE_API_KEY not set, refreshes will use fallback data");
            None
        }
        Err(e) => {
            error!(error = %e, "Failed to build Alpha Vantage client");
            None
        }
    };
    DataSourceAdapter::new(provider, &config.provider)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    init_logging_from_env()?;

    info!("Starting market data API server...");

    let config = AppConfig::load_default()?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                error = %e,
                "소켓 주소 설정이 유효하지 않습니다. API_HOST, API_PORT 환경변수를 확인하세요."
            );
            e
        })?;

    let metrics_handle = setup_metrics_recorder();
    info!("Prometheus metrics recorder initialized");

    let store = connect_store(&config).await;
    let adapter = build_adapter(&config);

    let completion = match OpenAiCompletion::from_config(&config.ai) {
        Ok(provider) => provider,
        Err(e) => {
            error!(error = %e, "Failed to build AI completion client");
            None
        }
    };

    let mut state = AppState::new(config, store, adapter).with_metrics(metrics_handle);
    if let Some(provider) = completion {
        state = state.with_completion(Arc::new(provider));
    }
    let state = Arc::new(state);

    info!(
        version = %state.version,
        has_store = state.market.has_store(),
        has_provider = state.adapter.has_provider(),
        has_ai = state.completion.is_some(),
        instruments = catalog().len(),
        "Application state initialized"
    );

    // 전역 종료 토큰 (스케줄러 루프에 전파)
    let shutdown_token = CancellationToken::new();

    state.register_default_tasks().await?;
    if state.config.scheduler.enabled {
        state.scheduler.start(&shutdown_token).await;
        info!(
            tick_secs = state.config.scheduler.tick_secs,
            "Task scheduler started"
        );
    } else {
        info!("Task scheduler disabled by configuration");
    }

    let scheduler = state.scheduler.clone();
    let app = create_router(state);

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();
    scheduler.stop().await;

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
