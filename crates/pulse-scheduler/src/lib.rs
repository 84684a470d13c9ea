//! 거래 시간 인지 캐시 예열 스케줄러.
//!
//! 이 crate는 다음을 제공합니다:
//! - `WarmupScheduler`: 시장 주기/고정 간격/개장 전 예열 잡 구동
//! - `TradeCalendar`: 공휴일 반영 거래일 판정 (연 단위 메모이즈)
//! - `run_with_retry`: 기동 예열용 재시도 헬퍼

pub mod calendar;
pub mod error;
pub mod jobs;
pub mod retry;
pub mod scheduler;

pub use calendar::TradeCalendar;
pub use error::{Result, SchedulerError};
pub use jobs::{initial_warmup, market_warmup_fn, register_default_jobs, MarketJobSpec};
pub use retry::run_with_retry;
pub use scheduler::{JobFn, JobStatus, WarmupScheduler};
