//! 시장 데이터 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (시장 데이터 조회/틱, AI 분석, 스케줄러 관리)
//! - 저장소 기반 rate limiting
//! - 주기 작업 스케줄러와 시장 데이터 전체 갱신 작업
//! - 헬스 체크 엔드포인트와 Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`tasks`]: 스케줄러와 백그라운드 작업
//! - [`services`]: AI 완성 제공자
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어

pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod tasks;

pub use error::{ApiErrorResponse, ApiResult, LegacyError};
pub use metrics::setup_metrics_recorder;
pub use middleware::{cors_layer, metrics_layer, RateLimitDecision, RateLimiter};
pub use routes::create_api_router;
pub use state::AppState;
pub use tasks::{MarketRefreshJob, ScheduledJob, Scheduler, SchedulerError};

#[cfg(any(test, feature = "test-utils"))]
pub use state::{create_test_state, create_test_state_with};
