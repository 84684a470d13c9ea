//! 스케줄러 에러 타입.

use thiserror::Error;

/// 스케줄러 관련 에러.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// 등록되지 않은 잡 ID
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// 잡 실행 실패
    #[error("Job execution failed: {0}")]
    JobFailed(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
