//! 업스트림 스냅샷 페처.
//!
//! 지수/국채/귀금속/펀드 엔드포인트의 JSON 응답을 타입으로 정리합니다.
//! 얇은 형태 변환만 수행하며, 지표 계산은 여기서 하지 않습니다.
//!
//! 업스트림 응답은 `{"data": [...]}` 형태의 행 배열이고 필드 키는
//! 중국어 컬럼명을 그대로 씁니다 (最新价, 涨跌幅 등).

use crate::client::UpstreamClient;
use crate::error::{Result, UpstreamError};
use crate::retry::{call_with_retry, RetryConfig};
use crate::throttle::ThrottleGate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// 데이터셋별 엔드포인트 URL.
#[derive(Debug, Clone)]
pub struct SourceEndpoints {
    pub index_spot: String,
    pub bond_yields: String,
    pub metals_spot: String,
    pub fund_rankings: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            index_spot: "https://quote.eastmoney.com/api/global/indices".to_string(),
            bond_yields: "https://quote.eastmoney.com/api/bond/cn_rates".to_string(),
            metals_spot: "https://quote.sge.com.cn/api/quotations".to_string(),
            fund_rankings: "https://fund.eastmoney.com/api/rank/open".to_string(),
        }
    }
}

/// 글로벌 지수 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub name: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_pct: Decimal,
    pub update_time: String,
}

/// 국채 수익률 스냅샷 (만기별).
///
/// 업스트림은 중국/미국 국채를 한 테이블로 내려주므로 `series`
/// (品种, 예: "中国国债" / "美国国债")로 시장을 구분합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondYieldSnapshot {
    pub series: String,
    pub tenor: String,
    pub yield_pct: Decimal,
    pub change_bp: Decimal,
}

/// 귀금속 현물 호가 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetalSpotSnapshot {
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub change_pct: Decimal,
    pub unit: String,
}

/// 펀드 순위 항목.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRankingEntry {
    pub code: String,
    pub name: String,
    pub nav: Decimal,
    pub daily_change_pct: Decimal,
}

/// 업스트림 시세 소스.
///
/// 모든 페처가 같은 재시도 정책과 호출 간격 게이트를 공유합니다.
#[derive(Clone)]
pub struct MarketDataSource {
    client: UpstreamClient,
    endpoints: SourceEndpoints,
    retry: RetryConfig,
    throttle: Option<Arc<ThrottleGate>>,
}

impl MarketDataSource {
    pub fn new(client: UpstreamClient, endpoints: SourceEndpoints) -> Self {
        Self {
            client,
            endpoints,
            retry: RetryConfig::default(),
            throttle: None,
        }
    }

    /// 호출 간격 게이트 장착.
    pub fn with_throttle(mut self, gate: Arc<ThrottleGate>) -> Self {
        self.throttle = Some(gate);
        self
    }

    /// 재시도 정책 교체.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_rows(&self, name: &str, url: &str, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let value = call_with_retry(name, &self.retry, self.throttle.as_deref(), || {
            self.client.get_json(url, query)
        })
        .await?;

        let rows = value
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| UpstreamError::MissingField("data".to_string()))?;

        Ok(rows.clone())
    }

    /// 글로벌 지수 현재가.
    pub async fn index_spot(&self) -> Result<Vec<IndexSnapshot>> {
        let rows = self
            .fetch_rows("index_spot", &self.endpoints.index_spot, &[])
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(IndexSnapshot {
                    name: row.get("名称")?.as_str()?.to_string(),
                    price: decimal_field(row, "最新价")?,
                    change: decimal_field(row, "涨跌额").unwrap_or_default(),
                    change_pct: decimal_field(row, "涨跌幅").unwrap_or_default(),
                    update_time: row
                        .get("最新行情时间")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect())
    }

    /// 국채 수익률 곡선 (중국/미국 합본, 만기별 수익률과 전일 대비 변화).
    pub async fn bond_yields(&self) -> Result<Vec<BondYieldSnapshot>> {
        let rows = self
            .fetch_rows("bond_yields", &self.endpoints.bond_yields, &[])
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(BondYieldSnapshot {
                    series: row.get("品种")?.as_str()?.to_string(),
                    tenor: row.get("期限")?.as_str()?.to_string(),
                    yield_pct: decimal_field(row, "收益率")?,
                    change_bp: decimal_field(row, "变动BP").unwrap_or_default(),
                })
            })
            .collect())
    }

    /// 귀금속 현물 호가 (SGE 품목 기준).
    pub async fn metals_spot(&self, symbols: &[&str]) -> Result<Vec<MetalSpotSnapshot>> {
        let joined = symbols.join(",");
        let rows = self
            .fetch_rows(
                "metals_spot",
                &self.endpoints.metals_spot,
                &[("symbols", joined.as_str())],
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(MetalSpotSnapshot {
                    symbol: row.get("代码")?.as_str()?.to_string(),
                    name: row.get("品种")?.as_str()?.to_string(),
                    price: decimal_field(row, "现价")?,
                    change_pct: decimal_field(row, "涨跌幅").unwrap_or_default(),
                    unit: row
                        .get("单位")
                        .and_then(Value::as_str)
                        .unwrap_or("元/克")
                        .to_string(),
                })
            })
            .collect())
    }

    /// 공모펀드 순위 상위 N건.
    pub async fn fund_rankings(&self, limit: usize) -> Result<Vec<FundRankingEntry>> {
        let rows = self
            .fetch_rows("fund_rankings", &self.endpoints.fund_rankings, &[])
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(FundRankingEntry {
                    code: row.get("基金代码")?.as_str()?.to_string(),
                    name: row.get("基金简称")?.as_str()?.to_string(),
                    nav: decimal_field(row, "单位净值")?,
                    daily_change_pct: decimal_field(row, "日增长率").unwrap_or_default(),
                })
            })
            .take(limit)
            .collect())
    }
}

/// 숫자 필드를 Decimal로 변환. 문자열로 온 숫자도 허용합니다.
fn decimal_field(row: &Value, key: &str) -> Option<Decimal> {
    match row.get(key)? {
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn source(server: &mockito::ServerGuard) -> MarketDataSource {
        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();
        let endpoints = SourceEndpoints {
            index_spot: format!("{}/indices", server.url()),
            bond_yields: format!("{}/bonds", server.url()),
            metals_spot: format!("{}/metals", server.url()),
            fund_rankings: format!("{}/funds", server.url()),
        };
        MarketDataSource::new(client, endpoints)
    }

    #[tokio::test]
    async fn test_index_spot_shapes_rows() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/indices")
            .with_body(
                r#"{"data": [
                    {"名称": "上证指数", "最新价": 3250.12, "涨跌额": 12.3, "涨跌幅": 0.38, "最新行情时间": "15:00:00"},
                    {"名称": "纳斯达克", "最新价": "18200.5", "涨跌幅": -1.2}
                ]}"#,
            )
            .create_async()
            .await;

        let snapshots = source(&server).index_spot().await.unwrap();

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].name, "上证指数");
        assert_eq!(snapshots[0].update_time, "15:00:00");
        // 문자열로 온 가격도 파싱된다
        assert_eq!(snapshots[1].price.to_string(), "18200.5");
        // 누락 필드는 0으로 채운다
        assert_eq!(snapshots[1].change, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_rows_missing_required_fields_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/metals")
            .match_query(mockito::Matcher::Any)
            .with_body(
                r#"{"data": [
                    {"代码": "Au99.99", "品种": "黄金9999", "现价": 618.5},
                    {"代码": "Ag(T+D)", "品种": "白银T+D"}
                ]}"#,
            )
            .create_async()
            .await;

        let snapshots = source(&server)
            .metals_spot(&["Au99.99", "Ag(T+D)"])
            .await
            .unwrap();

        // 현가 없는 행은 버린다
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].symbol, "Au99.99");
        assert_eq!(snapshots[0].unit, "元/克");
    }

    #[tokio::test]
    async fn test_bond_yields_keep_series_column() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/bonds")
            .with_body(
                r#"{"data": [
                    {"品种": "中国国债", "期限": "10年", "收益率": 2.15, "变动BP": -1.2},
                    {"品种": "美国国债", "期限": "10年", "收益率": 4.25, "变动BP": 3.0},
                    {"期限": "2年", "收益率": 1.8}
                ]}"#,
            )
            .create_async()
            .await;

        let snapshots = source(&server).bond_yields().await.unwrap();

        // 品种 없는 행은 시장을 알 수 없으므로 버린다
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].series, "中国国债");
        assert_eq!(snapshots[1].series, "美国国债");
        assert_eq!(snapshots[1].tenor, "10年");
    }

    #[tokio::test]
    async fn test_missing_data_field_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/bonds")
            .with_body(r#"{"rc": 0}"#)
            .create_async()
            .await;

        let err = source(&server).bond_yields().await.unwrap_err();
        assert!(matches!(err, UpstreamError::MissingField(_)));
    }

    #[tokio::test]
    async fn test_fund_rankings_respects_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/funds")
            .with_body(
                r#"{"data": [
                    {"基金代码": "000001", "基金简称": "A", "单位净值": 1.5, "日增长率": 2.1},
                    {"基金代码": "000002", "基金简称": "B", "单位净值": 2.5, "日增长率": 1.1},
                    {"基金代码": "000003", "基金简称": "C", "单位净值": 3.5, "日增长率": 0.1}
                ]}"#,
            )
            .create_async()
            .await;

        let entries = source(&server).fund_rankings(2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, "000001");
    }
}
