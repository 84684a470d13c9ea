//! 거래일 판정 (공휴일 반영).
//!
//! `pulse-core`의 세션 판정은 주말만 거르므로, 공휴일은 업스트림
//! 캘린더 소스에서 연 단위로 받아와 보완합니다. 조회 실패 시
//! 평일 기준으로 저하 동작합니다 — 공휴일에 불필요한 예열이
//! 도는 쪽이 거래일에 예열이 멈추는 쪽보다 낫습니다.

use chrono::{Datelike, NaiveDate, Weekday};
use pulse_upstream::TradeCalendarSource;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// 공휴일을 반영한 거래일 캘린더.
///
/// 연도별 거래일 집합을 메모이즈하며, 조회 실패는 하루에 한 번만
/// 재시도합니다 (실패마다 업스트림을 두드리지 않도록).
pub struct TradeCalendar {
    source: Arc<dyn TradeCalendarSource>,
    years: RwLock<HashMap<i32, HashSet<NaiveDate>>>,
    last_failed_on: RwLock<Option<NaiveDate>>,
}

impl TradeCalendar {
    pub fn new(source: Arc<dyn TradeCalendarSource>) -> Self {
        Self {
            source,
            years: RwLock::new(HashMap::new()),
            last_failed_on: RwLock::new(None),
        }
    }

    /// 해당 날짜가 거래일인지 판정합니다.
    ///
    /// 주말은 무조건 거래일이 아닙니다. 평일은 캘린더가 있으면
    /// 거래일 집합 포함 여부로, 없으면 평일 기준으로 판정합니다.
    pub async fn is_trading_day(&self, date: NaiveDate) -> bool {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let year = date.year();

        if let Some(days) = self.years.read().await.get(&year) {
            return days.contains(&date);
        }

        match self.load_year(year, date).await {
            Some(days) => days.contains(&date),
            // 캘린더 없이는 평일을 거래일로 간주
            None => true,
        }
    }

    async fn load_year(&self, year: i32, today: NaiveDate) -> Option<HashSet<NaiveDate>> {
        // 오늘 이미 실패했다면 재시도하지 않는다
        if *self.last_failed_on.read().await == Some(today) {
            return None;
        }

        match self.source.trading_days(year).await {
            Ok(days) => {
                let set: HashSet<NaiveDate> = days.into_iter().collect();
                info!(year, count = set.len(), "거래일 캘린더 적재");
                self.years.write().await.insert(year, set.clone());
                Some(set)
            }
            Err(e) => {
                warn!(year, "거래일 캘린더 조회 실패, 평일 기준으로 저하: {}", e);
                *self.last_failed_on.write().await = Some(today);
                None
            }
        }
    }
}
