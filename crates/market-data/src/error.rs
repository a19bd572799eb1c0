//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 캐시 저장소 오류 (연결 실패 포함)
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 캐시 저장소가 설정되지 않음
    #[error("Cache store not configured")]
    CacheUnavailable,

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 타임아웃 오류
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// 데이터 가져오기 오류 (외부 소스)
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 업스트림 호출 제한
    #[error("Upstream throttled: {0}")]
    Throttled(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        DataError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else {
            DataError::FetchError(err.to_string())
        }
    }
}

impl From<market_core::CoreError> for DataError {
    fn from(err: market_core::CoreError) -> Self {
        match err {
            market_core::CoreError::Config(msg) => DataError::ConfigError(msg),
            other => DataError::InvalidData(other.to_string()),
        }
    }
}

impl DataError {
    /// 저장소 연결/응답 문제인지 여부.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            DataError::CacheError(_) | DataError::CacheUnavailable | DataError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
