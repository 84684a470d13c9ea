//! 업스트림 시세 소스 경계.
//!
//! 이 crate는 다음을 제공합니다:
//! - `UpstreamClient`: 헤더 프로필 주입이 가능한 JSON HTTP 클라이언트
//! - `call_with_retry`: 일시 장애 한정 재시도 (지수 백오프 + 지터)
//! - `ThrottleGate`: 업스트림 호출 최소 간격 게이트
//! - `MarketDataSource`: 지수/국채/귀금속/펀드 스냅샷 페처
//! - `TradeCalendarSource`: 연도별 거래일 캘린더 소스

pub mod calendar;
pub mod client;
pub mod error;
pub mod retry;
pub mod snapshots;
pub mod throttle;

pub use calendar::{HttpTradeCalendar, TradeCalendarSource};
pub use client::{DefaultHeaders, HeaderStrategy, UpstreamClient};
pub use error::{Result, UpstreamError};
pub use retry::{call_with_retry, RetryConfig};
pub use snapshots::{
    BondYieldSnapshot, FundRankingEntry, IndexSnapshot, MarketDataSource, MetalSpotSnapshot,
    SourceEndpoints,
};
pub use throttle::ThrottleGate;
