//! 캐시 스토어 어댑터와 stale-while-revalidate 캐시 코어.
//!
//! 이 crate는 다음을 제공합니다:
//! - `KeyValueStore` trait: Redis / 인메모리 스토어 공통 인터페이스
//! - `RedisStore`: 분산 캐시 스토어 (연결 실패 시 fail-open 저하 동작)
//! - `MemoryStore`: 단일 프로세스 폴백 스토어
//! - `SwrCache`: 논리/물리 TTL 기반 stale-while-revalidate 캐시 코어
//! - 고정 윈도우 / 슬라이딩 윈도우 레이트 리미터

pub mod error;
pub mod rate_limit;
pub mod store;
pub mod swr;

pub use error::{DataError, Result};
pub use rate_limit::{FixedWindowLimiter, RateLimitConfig, SlidingWindowLimiter};
pub use store::memory::MemoryStore;
pub use store::redis::{RedisConfig, RedisStore};
pub use store::KeyValueStore;
pub use swr::{
    CacheOutcome, CachePolicy, CachedOp, ComputeFn, Freshness, MissMode, SwrCache,
};
