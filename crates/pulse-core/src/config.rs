//! 환경변수 기반 설정 모듈.
//!
//! 캐시 TTL 테이블, 시장별 거래 세션/갱신 주기, 레이트 리밋 등
//! 프로세스 전역 설정을 기동 시 한 번 로드합니다.
//! 로드 이후에는 읽기 전용으로 취급합니다.

use crate::calendar::{Market, MarketPolicy, SessionHours};
use crate::error::{PulseError, Result};
use chrono::NaiveTime;
use std::collections::HashMap;

/// 논리 TTL 대비 물리 TTL 배율 기본값.
///
/// 물리 TTL = 논리 TTL × 배율. 주말/공휴일/업스트림 장애 동안에도
/// stale 사본이 살아남도록 충분히 길게 잡습니다.
const DEFAULT_STALE_TTL_RATIO: u64 = 24;

/// 애플리케이션 전체 설정.
#[derive(Debug, Clone)]
pub struct Settings {
    /// 캐시 키 네임스페이스 접두사
    pub cache_prefix: String,
    /// 물리 TTL 배율 (>= 1)
    pub stale_ttl_ratio: u64,
    /// Redis URL (없으면 인메모리 폴백으로 동작)
    pub redis_url: Option<String>,
    /// 리소스 카테고리별 논리 TTL 테이블
    pub cache_ttl: CacheTtl,
    /// 시장별 정책 테이블
    pub markets: MarketTable,
    /// API 레이트 리밋 설정
    pub rate_limit: RateLimitSettings,
    /// 예열 관련 설정
    pub warmup: WarmupSettings,
}

/// 리소스 카테고리별 논리 TTL (초).
#[derive(Debug, Clone)]
pub struct CacheTtl {
    pub fear_greed: u64,
    pub leaders: u64,
    pub market_heat: u64,
    pub bonds: u64,
    pub metals: u64,
    pub funds: u64,
    pub global_indices: u64,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            fear_greed: 300,     // 5분
            leaders: 60,         // 1분
            market_heat: 180,    // 3분
            bonds: 600,          // 10분
            metals: 300,         // 5분
            funds: 43200,        // 12시간
            global_indices: 300, // 5분
        }
    }
}

/// 시장별 정책 테이블.
#[derive(Debug, Clone)]
pub struct MarketTable {
    policies: HashMap<Market, MarketPolicy>,
}

impl MarketTable {
    /// 시장 정책 조회.
    pub fn policy(&self, market: Market) -> &MarketPolicy {
        // 테이블은 생성 시 전체 시장을 채우므로 항상 존재한다
        &self.policies[&market]
    }

    /// 모든 시장의 세션 경계 허용 오차를 교체합니다.
    pub fn with_edge_tolerance(mut self, minutes: i64) -> Self {
        for policy in self.policies.values_mut() {
            policy.edge_tolerance_minutes = minutes;
        }
        self
    }
}

impl Default for MarketTable {
    fn default() -> Self {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).expect("유효한 고정 시각");

        let mut policies = HashMap::new();
        policies.insert(
            Market::ChinaA,
            MarketPolicy {
                session: SessionHours::Split {
                    morning: (t(9, 30), t(11, 30)),
                    afternoon: (t(13, 0), t(15, 0)),
                },
                weekdays_only: true,
                trading_cadence_secs: 30,
                idle_cadence_secs: 1800,
                edge_tolerance_minutes: 15,
            },
        );
        policies.insert(
            Market::UsEquity,
            MarketPolicy {
                // 북경시간 21:30 ~ 익일 04:00
                session: SessionHours::Overnight {
                    open: t(21, 30),
                    close: t(4, 0),
                },
                weekdays_only: true,
                trading_cadence_secs: 60,
                idle_cadence_secs: 3600,
                edge_tolerance_minutes: 15,
            },
        );
        policies.insert(
            Market::Metals,
            MarketPolicy {
                session: SessionHours::AllDay,
                weekdays_only: false,
                trading_cadence_secs: 300,
                idle_cadence_secs: 1800,
                edge_tolerance_minutes: 15,
            },
        );

        Self { policies }
    }
}

/// API 레이트 리밋 설정.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// 공개 API 분당 허용 요청 수
    pub public_per_minute: u32,
    /// 관리용 API 분당 허용 요청 수
    pub admin_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            public_per_minute: 300,
            admin_per_minute: 10,
        }
    }
}

/// 예열(warmup) 동작 설정.
#[derive(Debug, Clone)]
pub struct WarmupSettings {
    /// 세션 경계 허용 오차 (분)
    pub tolerance_minutes: i64,
    /// 재계산 잠금 TTL (초) — 잠금 해제가 누락돼도 이 시간 뒤 풀린다
    pub lock_ttl_secs: u64,
    /// 기동 시 예열 재시도 횟수
    pub max_retries: u32,
}

impl Default for WarmupSettings {
    fn default() -> Self {
        Self {
            tolerance_minutes: 15,
            lock_ttl_secs: 60,
            max_retries: 3,
        }
    }
}

impl Settings {
    /// 환경변수에서 설정 로드.
    ///
    /// `REDIS_URL`이 없으면 경고 후 인메모리 폴백으로 동작합니다.
    /// 배율/TTL 값이 유효 범위를 벗어나면 치명적 설정 에러를 반환합니다.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let redis_url = std::env::var("REDIS_URL").ok();
        if redis_url.is_none() {
            tracing::warn!("REDIS_URL 미설정, 인메모리 스토어로 동작합니다 (단일 프로세스 전용)");
        }

        let warmup = WarmupSettings {
            tolerance_minutes: env_var_parse("WARMUP_TOLERANCE_MINUTES", 15),
            lock_ttl_secs: env_var_parse("WARMUP_LOCK_TTL_SECS", 60),
            max_retries: env_var_parse("WARMUP_MAX_RETRIES", 3),
        };

        let settings = Self {
            cache_prefix: std::env::var("CACHE_PREFIX")
                .unwrap_or_else(|_| "marketpulse".to_string()),
            stale_ttl_ratio: env_var_parse("STALE_TTL_RATIO", DEFAULT_STALE_TTL_RATIO),
            redis_url,
            cache_ttl: CacheTtl::default(),
            // 세션 경계 오차는 주기 선택에 쓰이므로 정책 테이블에 심는다
            markets: MarketTable::default().with_edge_tolerance(warmup.tolerance_minutes),
            rate_limit: RateLimitSettings {
                public_per_minute: env_var_parse("RATE_LIMIT_PUBLIC_PER_MINUTE", 300),
                admin_per_minute: env_var_parse("RATE_LIMIT_ADMIN_PER_MINUTE", 10),
            },
            warmup,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// 설정 불변식 검증. 위반 시 기동 거부.
    pub fn validate(&self) -> Result<()> {
        if self.stale_ttl_ratio < 1 {
            return Err(PulseError::Config(
                "STALE_TTL_RATIO는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.warmup.lock_ttl_secs < 1 {
            return Err(PulseError::Config(
                "WARMUP_LOCK_TTL_SECS는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.warmup.tolerance_minutes < 0 {
            return Err(PulseError::Config(
                "WARMUP_TOLERANCE_MINUTES는 0 이상이어야 합니다".to_string(),
            ));
        }

        let ttls = [
            self.cache_ttl.fear_greed,
            self.cache_ttl.leaders,
            self.cache_ttl.market_heat,
            self.cache_ttl.bonds,
            self.cache_ttl.metals,
            self.cache_ttl.funds,
            self.cache_ttl.global_indices,
        ];
        if ttls.iter().any(|ttl| *ttl < 1) {
            return Err(PulseError::Config(
                "논리 TTL은 1초 이상이어야 합니다".to_string(),
            ));
        }

        Ok(())
    }

    /// 논리 TTL에 배율을 적용한 물리 TTL (초).
    pub fn physical_ttl(&self, logical_ttl_secs: u64) -> u64 {
        logical_ttl_secs.saturating_mul(self.stale_ttl_ratio)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용).
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
