//! 거래일 캘린더 소스.

use crate::client::UpstreamClient;
use crate::error::{Result, UpstreamError};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::Value;

/// 연도별 거래일 목록 소스.
///
/// 스케줄러의 공휴일 판정에 쓰입니다. 조회 실패 시 상위 레이어가
/// 평일 기준으로 저하 동작하므로 구현이 항상 가용할 필요는 없습니다.
#[async_trait]
pub trait TradeCalendarSource: Send + Sync {
    /// 해당 연도의 거래일 목록.
    async fn trading_days(&self, year: i32) -> Result<Vec<NaiveDate>>;
}

/// HTTP 거래일 캘린더.
///
/// `{"data": ["2026-01-05", ...]}` 형태의 응답을 기대합니다.
pub struct HttpTradeCalendar {
    client: UpstreamClient,
    url: String,
}

impl HttpTradeCalendar {
    pub fn new(client: UpstreamClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TradeCalendarSource for HttpTradeCalendar {
    async fn trading_days(&self, year: i32) -> Result<Vec<NaiveDate>> {
        let year_str = year.to_string();
        let value = self
            .client
            .get_json(&self.url, &[("year", year_str.as_str())])
            .await?;

        let rows = value
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| UpstreamError::MissingField("data".to_string()))?;

        let days = rows
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .filter(|d| d.year() == year)
            .collect();

        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trading_days_parses_and_filters_year() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendar")
            .match_query(mockito::Matcher::UrlEncoded("year".into(), "2026".into()))
            .with_body(r#"{"data": ["2026-01-05", "2026-01-06", "2025-12-31", "not-a-date"]}"#)
            .create_async()
            .await;

        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();
        let calendar = HttpTradeCalendar::new(client, format!("{}/calendar", server.url()));

        let days = calendar.trading_days(2026).await.unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    }
}
