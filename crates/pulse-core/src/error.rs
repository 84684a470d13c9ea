//! 서비스 공통 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum PulseError {
    /// 설정 에러 (기동 시 치명적)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 알 수 없는 시장 식별자
    #[error("알 수 없는 시장: {0}")]
    UnknownMarket(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type Result<T> = std::result::Result<T, PulseError>;

impl PulseError {
    /// 프로세스 기동을 중단해야 하는 에러인지 확인합니다.
    ///
    /// 설정 에러는 런타임에 복구할 수 없으므로 기동 자체를 거부합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PulseError::Config(_))
    }
}
