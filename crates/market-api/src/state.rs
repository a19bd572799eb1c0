//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! 프로세스 시작 시 한 번 생성하고 Axum State extractor로 주입합니다.
//! 스케줄러와 rate limiter도 전역 변수 대신 이 상태가 소유합니다.

use chrono::{DateTime, Utc};
use market_core::AppConfig;
use market_data::{CacheStore, DataSourceAdapter, MarketDataService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::middleware::RateLimiter;
use crate::services::CompletionProvider;
use crate::tasks::{MarketRefreshJob, Scheduler, SchedulerError};

/// AI 엔드포인트 rate limit 범위.
pub const AI_SCOPE: &str = "ai";

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    /// 캐시/합성/시뮬레이션 조율
    pub market: Arc<MarketDataService>,

    /// 업스트림 어댑터 (전체 갱신, seed)
    pub adapter: DataSourceAdapter,

    pub scheduler: Arc<Scheduler>,

    /// AI 엔드포인트 rate limiter
    pub ai_limiter: Arc<RateLimiter>,

    /// 완성 제공자. 없으면 AI 엔드포인트가 503을 반환
    pub completion: Option<Arc<dyn CompletionProvider>>,

    /// Prometheus 렌더링 핸들
    pub metrics: Option<PrometheusHandle>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: DateTime<Utc>,

    pub version: String,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Option<Arc<dyn CacheStore>>,
        adapter: DataSourceAdapter,
    ) -> Self {
        let market = Arc::new(MarketDataService::new(store.clone(), config.market.clone()));
        let ai_limiter = Arc::new(RateLimiter::new(store, &config.rate_limit, AI_SCOPE));
        let scheduler = Arc::new(Scheduler::new(
            config.scheduler.tick(),
            config.scheduler.history_capacity,
        ));

        Self {
            config: Arc::new(config),
            market,
            adapter,
            scheduler,
            ai_limiter,
            completion: None,
            metrics: None,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_completion(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// 기본 작업(시장 데이터 전체 갱신)을 스케줄러에 등록합니다.
    pub async fn register_default_tasks(&self) -> Result<(), SchedulerError> {
        let job = MarketRefreshJob::new(
            self.adapter.clone(),
            self.market.clone(),
            &self.config.scheduler,
        );
        self.scheduler.register(Arc::new(job)).await
    }

    /// 요청 Origin 허용 여부. 허용 목록이 비어 있으면 개발 모드로 모두 허용합니다.
    pub fn is_origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.config.is_development() {
            return true;
        }
        origin.is_some_and(|origin| {
            self.config
                .ai
                .allowed_origins
                .iter()
                .any(|allowed| allowed == origin)
        })
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// 인메모리 저장소를 사용하는 테스트 상태.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state_with(config: AppConfig) -> (AppState, Arc<market_data::MemoryCache>) {
    let store = Arc::new(market_data::MemoryCache::new());
    let adapter = DataSourceAdapter::new(None, &config.provider);
    let state = AppState::new(config, Some(store.clone() as Arc<dyn CacheStore>), adapter);
    (state, store)
}

#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    create_test_state_with(AppConfig::default()).0
}
