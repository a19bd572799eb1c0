//! 데이터 Provider 모듈.
//!
//! ## Alpha Vantage
//! - `AlphaVantageClient`: `GLOBAL_QUOTE`, `TIME_SERIES_INTRADAY` 클라이언트
//! - `QuoteProvider`: 시세 제공자 trait (테스트에서 교체 가능)
//!
//! ## 데이터 소스 어댑터
//! - `DataSourceAdapter`: 호출 예산 안에서 카탈로그 전체를 가져오고,
//!   실패한 지수는 합성 데이터로 대체

pub mod adapter;
pub mod alpha_vantage;

pub use adapter::{DataSourceAdapter, FetchOutcome, FetchStats};
pub use alpha_vantage::{AlphaVantageClient, IntradaySeries, ProviderError, Quote, QuoteProvider};
