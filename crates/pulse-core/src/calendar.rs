//! 거래 캘린더 및 세션 윈도우 판정.
//!
//! 시장별 거래 세션 설정을 기반으로 현재 시각이 거래 시간인지,
//! 어떤 갱신 주기를 적용해야 하는지를 판정합니다.
//! 기준 시각은 북경시간(Asia/Shanghai)입니다.
//!
//! 공휴일 캘린더 조회(외부 소스 의존)는 스케줄러 크레이트에서 보강하며,
//! 이 모듈은 요일 게이팅과 세션 윈도우 산술만 담당합니다.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Asia::Shanghai;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 지원 시장.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    /// 중국 A주 (오전/오후 2부 세션)
    ChinaA,
    /// 미국 주식 (북경시간 기준 자정을 넘는 세션)
    UsEquity,
    /// 귀금속 현물 (24시간)
    Metals,
}

impl Market {
    /// 모든 시장 반환.
    pub fn all() -> [Market; 3] {
        [Market::ChinaA, Market::UsEquity, Market::Metals]
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Market::ChinaA => write!(f, "market_cn"),
            Market::UsEquity => write!(f, "market_us"),
            Market::Metals => write!(f, "metals"),
        }
    }
}

impl std::str::FromStr for Market {
    type Err = crate::error::PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market_cn" | "cn" => Ok(Market::ChinaA),
            "market_us" | "us" => Ok(Market::UsEquity),
            "metals" => Ok(Market::Metals),
            other => Err(crate::error::PulseError::UnknownMarket(other.to_string())),
        }
    }
}

/// 시장별 거래 세션 윈도우.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionHours {
    /// 24시간 거래
    AllDay,
    /// 당일 내 단일 세션
    Single { open: NaiveTime, close: NaiveTime },
    /// 오전 + 오후 2부 세션
    Split {
        morning: (NaiveTime, NaiveTime),
        afternoon: (NaiveTime, NaiveTime),
    },
    /// 자정을 넘는 세션 (open > close)
    Overnight { open: NaiveTime, close: NaiveTime },
}

impl SessionHours {
    /// 주어진 시각이 세션 내인지 판정합니다.
    ///
    /// 자정을 넘는 세션은 `t >= open || t <= close`로 판정합니다.
    /// 두 경계를 AND로 묶으면 빈 집합이 되므로 반드시 OR이어야 합니다.
    pub fn contains(&self, t: NaiveTime) -> bool {
        match self {
            SessionHours::AllDay => true,
            SessionHours::Single { open, close } => *open <= t && t <= *close,
            SessionHours::Split { morning, afternoon } => {
                (morning.0 <= t && t <= morning.1) || (afternoon.0 <= t && t <= afternoon.1)
            }
            SessionHours::Overnight { open, close } => t >= *open || t <= *close,
        }
    }

    /// 양쪽 경계를 `tolerance`만큼 확장한 뒤 세션 내인지 판정합니다.
    ///
    /// 스케줄러 지터로 세션 경계 직전/직후 타이밍을 놓치지 않기 위한 변형입니다.
    pub fn contains_with_tolerance(&self, t: NaiveTime, tolerance: chrono::Duration) -> bool {
        let widen = |w: (NaiveTime, NaiveTime)| -> (NaiveTime, NaiveTime) {
            // overflowing_*는 자정 래핑 시 초과분을 버리고 시각만 반환한다
            (
                w.0.overflowing_sub_signed(tolerance).0,
                w.1.overflowing_add_signed(tolerance).0,
            )
        };

        match self {
            SessionHours::AllDay => true,
            SessionHours::Single { open, close } => {
                let (o, c) = widen((*open, *close));
                if o <= c {
                    o <= t && t <= c
                } else {
                    // 확장이 자정을 넘어간 경우 overnight 규칙으로 전환
                    t >= o || t <= c
                }
            }
            SessionHours::Split { morning, afternoon } => {
                let (mo, mc) = widen(*morning);
                let (ao, ac) = widen(*afternoon);
                (mo <= t && t <= mc) || (ao <= t && t <= ac)
            }
            SessionHours::Overnight { open, close } => {
                let (o, c) = widen((*open, *close));
                t >= o || t <= c
            }
        }
    }
}

/// 시장 단위 정책: 세션 윈도우 + 갱신 주기 테이블.
#[derive(Debug, Clone)]
pub struct MarketPolicy {
    /// 거래 세션 윈도우
    pub session: SessionHours,
    /// 주중(월~금)에만 거래하는지 여부
    pub weekdays_only: bool,
    /// 거래 시간 중 갱신 주기 (초)
    pub trading_cadence_secs: u64,
    /// 비거래 시간 갱신 주기 (초)
    pub idle_cadence_secs: u64,
    /// 주기 선택 시 세션 경계에 적용할 허용 오차 (분).
    ///
    /// 스케줄러 지터로 개장 직전/마감 직후 틱이 느린 주기로 판정되는
    /// 것을 막습니다. 주말 제외 규칙은 완화하지 않습니다.
    pub edge_tolerance_minutes: i64,
}

impl MarketPolicy {
    /// 주어진 시각이 거래 시간인지 판정합니다.
    ///
    /// `weekdays_only` 시장은 토/일을 무조건 제외합니다.
    pub fn is_open_at(&self, at: DateTime<Tz>) -> bool {
        if self.weekdays_only && is_weekend(at.weekday()) {
            return false;
        }
        self.session.contains(at.time())
    }

    /// 허용 오차를 적용한 거래 시간 판정.
    ///
    /// 세션 경계만 확장하며, 주말 제외 규칙은 완화하지 않습니다.
    pub fn is_open_with_tolerance(&self, at: DateTime<Tz>, tolerance_minutes: i64) -> bool {
        if self.weekdays_only && is_weekend(at.weekday()) {
            return false;
        }
        self.session
            .contains_with_tolerance(at.time(), chrono::Duration::minutes(tolerance_minutes))
    }

    /// 현재 적용할 갱신 주기를 반환합니다.
    ///
    /// 세션 경계는 `edge_tolerance_minutes`만큼 확장해 판정하므로
    /// 개장 직전 틱부터 거래 주기가 적용됩니다.
    pub fn refresh_interval(&self, at: DateTime<Tz>) -> Duration {
        if self.is_open_with_tolerance(at, self.edge_tolerance_minutes) {
            Duration::from_secs(self.trading_cadence_secs)
        } else {
            Duration::from_secs(self.idle_cadence_secs)
        }
    }

    /// 스케줄러 트리거용 최소 주기 (분, 최소 1분).
    ///
    /// 거래/비거래 주기 중 짧은 쪽을 분 단위로 내림 변환합니다.
    /// 주기별 실행 여부 판정은 잡 본문에서 분 단위 modulo로 수행합니다.
    pub fn min_cadence_minutes(&self) -> u64 {
        let min_secs = self.trading_cadence_secs.min(self.idle_cadence_secs);
        (min_secs / 60).max(1)
    }

    /// 주어진 시각의 분(minute)이 현재 주기에 해당하는지 판정합니다.
    pub fn should_fire_at(&self, at: DateTime<Tz>) -> bool {
        let cadence_minutes = (self.refresh_interval(at).as_secs() / 60).max(1);
        u64::from(at.minute()) % cadence_minutes == 0
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// 북경시간 현재 시각.
pub fn beijing_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&Shanghai)
}
