//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 캐시/스토어 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 스토어 연결 불가 (fail-open 분기용)
    #[error("Store unavailable")]
    StoreUnavailable,

    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 잘못된 캐시 정책
    #[error("Invalid cache policy: {0}")]
    InvalidPolicy(String),

    /// 계산 함수 실패 (cold path에서 호출자로 전파)
    #[error("Compute error: {0}")]
    ComputeError(String),
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

pub type Result<T> = std::result::Result<T, DataError>;
