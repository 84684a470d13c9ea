//! 시장 분석 서비스의 핵심 도메인 모듈.
//!
//! 이 crate는 다음을 제공합니다:
//! - 공통 에러 타입
//! - 환경변수 기반 설정 (TTL 테이블, 거래 시간, 갱신 주기)
//! - 거래 캘린더 및 세션 윈도우 판정
//! - 로깅 초기화
//! - API 응답 envelope

pub mod calendar;
pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;

pub use calendar::{beijing_now, Market, MarketPolicy, SessionHours};
pub use config::{CacheTtl, MarketTable, RateLimitSettings, Settings, WarmupSettings};
pub use envelope::{ApiEnvelope, CacheMeta, EnvelopeStatus};
pub use error::{PulseError, Result};
