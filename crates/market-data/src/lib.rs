//! 시장 데이터 캐시, 업스트림 수집, 시뮬레이션.
//!
//! 이 crate는 다음을 제공합니다:
//! - 키별 TTL을 지원하는 캐시 저장소 추상화와 Redis 구현
//! - Alpha Vantage 시세 클라이언트와 호출 예산을 공유하는 데이터 소스 어댑터
//! - 외부 호출 없는 합성(fallback) 데이터 생성기
//! - 상관된 랜덤 워크 시뮬레이터
//! - 읽기/쓰기 경로를 조율하는 [`MarketDataService`]

pub mod error;
pub mod fallback;
pub mod provider;
pub mod service;
pub mod simulator;
pub mod storage;

pub use error::{DataError, Result};
pub use fallback::FallbackGenerator;
pub use provider::{
    AlphaVantageClient, DataSourceAdapter, FetchOutcome, FetchStats, IntradaySeries,
    ProviderError, Quote, QuoteProvider,
};
pub use service::{MarketDataService, MarketSnapshot, UpdateOutcome};
pub use simulator::{MarketSimulator, SimulationError, TickOutcome, YearStartBaselines};
pub use storage::{keys, CacheStore, CacheStoreExt, RedisCache};

#[cfg(any(test, feature = "test-utils"))]
pub use storage::MemoryCache;
