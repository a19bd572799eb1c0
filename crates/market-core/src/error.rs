//! 핵심 도메인 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 알 수 없는 지역
    #[error("알 수 없는 지역: {0}")]
    UnknownRegion(String),

    /// 데이터셋 불변식 위반
    #[error("잘못된 데이터셋: {0}")]
    InvalidDataset(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 도메인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownRegion("latam".to_string());
        assert_eq!(err.to_string(), "알 수 없는 지역: latam");
    }

    #[test]
    fn test_from_serde_error() {
        let parse: Result<u32, _> = serde_json::from_str::<u32>("not a number");
        let err: CoreError = parse.unwrap_err().into();
        assert!(matches!(err, CoreError::Serialization(_)));
    }
}
