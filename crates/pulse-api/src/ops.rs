//! 캐시 연산 카탈로그.
//!
//! 모든 데이터 엔드포인트의 계산 함수를 캐시 정책과 함께 묶어
//! `CachedOp`로 만듭니다. 라우트 핸들러와 예열 스케줄러가 같은
//! 핸들을 공유하므로 single-flight 프로토콜도 공유됩니다.
//!
//! 계산 함수는 업스트림 스냅샷의 얇은 형태 변환만 수행합니다.
//! 지표 계산은 하지 않습니다.

use pulse_core::config::Settings;
use pulse_data::{CachePolicy, CachedOp, ComputeFn, DataError, SwrCache};
use pulse_upstream::{
    BondYieldSnapshot, FundRankingEntry, IndexSnapshot, MarketDataSource, UpstreamError,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

/// 중국 본토 시장 지수.
const CN_SENTIMENT_INDICES: &[&str] = &["上证指数", "深证成指", "沪深300"];
const CN_LEADER_INDICES: &[&str] = &["上证50", "创业板指", "科创50"];

/// 미국 시장 지수.
const US_HEAT_INDICES: &[&str] = &["纳斯达克", "标普500", "道琼斯"];
const US_LEADER_INDICES: &[&str] = &["纳斯达克100", "罗素2000", "费城半导体"];

/// 국채 수익률 테이블의 시장별 품종 구분.
const CN_BOND_SERIES: &str = "中国国债";
const US_BOND_SERIES: &str = "美国国债";

/// 귀금속 현물 품목 (SGE).
const METAL_SYMBOLS: &[&str] = &["Au99.99", "Au(T+D)", "mAu(T+D)", "Ag(T+D)"];

/// 펀드 순위 적재 건수 (UI 요청량보다 여유 있게).
const FUND_TOP_N: usize = 50;

/// 전체 캐시 연산 카탈로그.
pub struct OpsCatalog {
    pub cn_fear_greed: CachedOp,
    pub cn_leaders: CachedOp,
    pub cn_bonds: CachedOp,
    pub us_heat: CachedOp,
    pub us_leaders: CachedOp,
    pub us_treasury: CachedOp,
    pub metals_spot: CachedOp,
    pub gold_silver_ratio: CachedOp,
    pub funds_top: CachedOp,
    pub global_indices: CachedOp,
}

impl OpsCatalog {
    /// 설정된 TTL 테이블로 카탈로그를 조립합니다.
    pub fn build(
        cache: &SwrCache,
        settings: &Settings,
        source: Arc<MarketDataSource>,
    ) -> Result<Self, DataError> {
        let ratio = settings.stale_ttl_ratio;
        let ttl = &settings.cache_ttl;

        let policy = |logical: u64| CachePolicy::with_ratio(logical, ratio);

        let src = Arc::clone(&source);
        let cn_fear_greed = cache.wrap(
            "market_cn:fear_greed",
            policy(ttl.fear_greed)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move {
                    let snapshots = src.index_spot().await?;
                    Ok(sentiment_payload(&snapshots, CN_SENTIMENT_INDICES))
                }
            }),
        );

        let src = Arc::clone(&source);
        let cn_leaders = cache.wrap(
            "market_cn:leaders",
            policy(ttl.leaders)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move {
                    let snapshots = src.index_spot().await?;
                    Ok(indices_payload(&snapshots, CN_LEADER_INDICES))
                }
            }),
        );

        let src = Arc::clone(&source);
        let cn_bonds = cache.wrap(
            "market_cn:bonds",
            policy(ttl.bonds)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move { Ok(bond_payload(&src.bond_yields().await?, CN_BOND_SERIES)) }
            }),
        );

        let src = Arc::clone(&source);
        let us_heat = cache.wrap(
            "market_us:heat",
            policy(ttl.market_heat)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move {
                    let snapshots = src.index_spot().await?;
                    Ok(sentiment_payload(&snapshots, US_HEAT_INDICES))
                }
            }),
        );

        let src = Arc::clone(&source);
        let us_leaders = cache.wrap(
            "market_us:leaders",
            policy(ttl.leaders)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move {
                    let snapshots = src.index_spot().await?;
                    Ok(indices_payload(&snapshots, US_LEADER_INDICES))
                }
            }),
        );

        let src = Arc::clone(&source);
        let us_treasury = cache.wrap(
            "market_us:treasury",
            policy(ttl.bonds)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move { Ok(treasury_payload(&src.bond_yields().await?)) }
            }),
        );

        let src = Arc::clone(&source);
        let metals_spot = cache.wrap(
            "metals:spot_price",
            policy(ttl.metals)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move {
                    let snapshots = src.metals_spot(METAL_SYMBOLS).await?;
                    Ok(json!({
                        "prices": snapshots,
                        "updated_at": pulse_core::calendar::beijing_now().to_rfc3339(),
                    }))
                }
            }),
        );

        let src = Arc::clone(&source);
        let gold_silver_ratio = cache.wrap(
            "metals:gold_silver_ratio",
            policy(ttl.metals)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move {
                    let snapshots = src.metals_spot(&["Au99.99", "Ag(T+D)"]).await?;
                    ratio_payload(&snapshots)
                }
            }),
        );

        let src = Arc::clone(&source);
        let funds_top = cache.wrap(
            "funds:top",
            policy(ttl.funds)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move { Ok(fund_payload(src.fund_rankings(FUND_TOP_N).await?)) }
            }),
        );

        let src = Arc::clone(&source);
        let global_indices = cache.wrap(
            "global:indices",
            policy(ttl.global_indices)?,
            compute(move || {
                let src = Arc::clone(&src);
                async move {
                    let snapshots = src.index_spot().await?;
                    Ok(json!({
                        "indices": snapshots,
                        "updated_at": pulse_core::calendar::beijing_now().to_rfc3339(),
                    }))
                }
            }),
        );

        Ok(Self {
            cn_fear_greed,
            cn_leaders,
            cn_bonds,
            us_heat,
            us_leaders,
            us_treasury,
            metals_spot,
            gold_silver_ratio,
            funds_top,
            global_indices,
        })
    }

    /// 중국 시장 예열 대상.
    pub fn cn_ops(&self) -> Vec<CachedOp> {
        vec![
            self.cn_fear_greed.clone(),
            self.cn_leaders.clone(),
            self.cn_bonds.clone(),
        ]
    }

    /// 미국 시장 예열 대상.
    pub fn us_ops(&self) -> Vec<CachedOp> {
        vec![
            self.us_heat.clone(),
            self.us_leaders.clone(),
            self.us_treasury.clone(),
        ]
    }

    /// 귀금속 예열 대상.
    pub fn metals_ops(&self) -> Vec<CachedOp> {
        vec![self.metals_spot.clone(), self.gold_silver_ratio.clone()]
    }

    /// 전체 연산 (초기 예열용).
    pub fn all(&self) -> Vec<CachedOp> {
        let mut ops = self.cn_ops();
        ops.extend(self.us_ops());
        ops.extend(self.metals_ops());
        ops.push(self.funds_top.clone());
        ops.push(self.global_indices.clone());
        ops
    }
}

/// 업스트림 계산을 캐시 코어의 `ComputeFn`으로 변환합니다.
///
/// 업스트림 에러는 `ComputeError`로 접어 전달합니다 — 캐시 코어는
/// 실패 payload를 저장하지 않고 에러 채널로만 인지합니다.
fn compute<F, Fut>(f: F) -> ComputeFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, UpstreamError>> + Send + 'static,
{
    Arc::new(move || {
        let fut = f();
        Box::pin(async move { fut.await.map_err(|e| DataError::ComputeError(e.to_string())) })
    })
}

/// 이름 목록 순서대로 지수를 추립니다.
fn select_indices<'a>(snapshots: &'a [IndexSnapshot], names: &[&str]) -> Vec<&'a IndexSnapshot> {
    names
        .iter()
        .filter_map(|name| snapshots.iter().find(|s| s.name == *name))
        .collect()
}

fn indices_payload(snapshots: &[IndexSnapshot], names: &[&str]) -> Value {
    json!({
        "indices": select_indices(snapshots, names),
        "updated_at": pulse_core::calendar::beijing_now().to_rfc3339(),
    })
}

/// 지수 스냅샷 기반 시장 분위기 payload.
///
/// 등락률 단순 평균만 덧붙입니다. 지표 공식은 다루지 않습니다.
fn sentiment_payload(snapshots: &[IndexSnapshot], names: &[&str]) -> Value {
    let selected = select_indices(snapshots, names);

    let avg_change_pct = if selected.is_empty() {
        Decimal::ZERO
    } else {
        let sum: Decimal = selected.iter().map(|s| s.change_pct).sum();
        sum / Decimal::from(selected.len() as u64)
    };

    json!({
        "indices": selected,
        "avg_change_pct": avg_change_pct,
        "updated_at": pulse_core::calendar::beijing_now().to_rfc3339(),
    })
}

/// 합본 테이블에서 한 시장(品种)의 수익률 곡선만 추립니다.
fn bond_payload(snapshots: &[BondYieldSnapshot], series: &str) -> Value {
    let selected: Vec<_> = snapshots.iter().filter(|s| s.series == series).collect();

    let yield_curve: serde_json::Map<String, Value> = selected
        .iter()
        .map(|s| (s.tenor.clone(), json!(s.yield_pct)))
        .collect();
    let changes_bp: serde_json::Map<String, Value> = selected
        .iter()
        .map(|s| (s.tenor.clone(), json!(s.change_bp)))
        .collect();

    json!({
        "yield_curve": yield_curve,
        "changes_bp": changes_bp,
        "updated_at": pulse_core::calendar::beijing_now().to_rfc3339(),
    })
}

/// 미국 국채 payload: 수익률 곡선 + 10년-2년 역전 스프레드.
///
/// 두 만기 중 하나라도 없으면 스프레드는 null로 내립니다.
fn treasury_payload(snapshots: &[BondYieldSnapshot]) -> Value {
    let tenor_yield = |tenor: &str| {
        snapshots
            .iter()
            .find(|s| s.series == US_BOND_SERIES && s.tenor == tenor)
            .map(|s| s.yield_pct)
    };
    let spread_10y_2y = match (tenor_yield("10年"), tenor_yield("2年")) {
        (Some(long), Some(short)) => Some(long - short),
        _ => None,
    };

    let mut payload = bond_payload(snapshots, US_BOND_SERIES);
    payload["spread_10y_2y"] = json!(spread_10y_2y);
    payload
}

/// 금/은 비율 payload.
///
/// SGE 호가는 금이 元/克, 은이 元/千克이므로 은을 그램 단위로
/// 환산한 뒤 나눕니다.
fn ratio_payload(
    snapshots: &[pulse_upstream::MetalSpotSnapshot],
) -> Result<Value, UpstreamError> {
    let gold = snapshots
        .iter()
        .find(|s| s.symbol == "Au99.99")
        .ok_or_else(|| UpstreamError::MissingField("Au99.99".to_string()))?;
    let silver = snapshots
        .iter()
        .find(|s| s.symbol == "Ag(T+D)")
        .ok_or_else(|| UpstreamError::MissingField("Ag(T+D)".to_string()))?;

    let silver_per_gram = silver.price / Decimal::from(1000u64);
    if silver_per_gram.is_zero() {
        return Err(UpstreamError::MissingField("은 가격이 0".to_string()));
    }

    Ok(json!({
        "gold_price": gold.price,
        "silver_price": silver.price,
        "ratio": gold.price / silver_per_gram,
        "updated_at": pulse_core::calendar::beijing_now().to_rfc3339(),
    }))
}

fn fund_payload(mut entries: Vec<FundRankingEntry>) -> Value {
    entries.sort_by(|a, b| b.daily_change_pct.cmp(&a.daily_change_pct));
    let gainers: Vec<_> = entries.iter().take(20).collect();
    let losers: Vec<_> = entries.iter().rev().take(20).collect();

    json!({
        "gainers": gainers,
        "losers": losers,
        "updated_at": pulse_core::calendar::beijing_now().to_rfc3339(),
    })
}
