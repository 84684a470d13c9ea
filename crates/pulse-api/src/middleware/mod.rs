//! API 미들웨어.

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimitState};
