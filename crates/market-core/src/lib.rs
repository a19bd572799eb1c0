//! # Market Core
//!
//! 시장 지수 대시보드 데이터 서비스의 핵심 도메인 모델을 제공합니다.
//!
//! 이 크레이트는 다음을 포함합니다:
//! - 지역(Region) 및 지수 항목(MarketItem), 데이터셋(MarketData) 타입
//! - 데이터 출처 태그(DataSource)
//! - 벤치마크 지수 카탈로그와 변동성 분류
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
