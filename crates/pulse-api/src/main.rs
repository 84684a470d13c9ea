//! 시장 데이터 집계 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다. 캐시 스토어 연결,
//! 업스트림 소스/캐시 연산 카탈로그 조립, 예열 스케줄러 등록,
//! graceful shutdown까지의 배선을 담당합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pulse_api::server::{create_router, shutdown_signal};
use pulse_api::{AppState, OpsCatalog};
use pulse_core::config::Settings;
use pulse_core::logging::{init_logging, LogConfig};
use pulse_core::Market;
use pulse_data::{KeyValueStore, MemoryStore, RedisConfig, RedisStore, SwrCache};
use pulse_scheduler::{
    initial_warmup, market_warmup_fn, register_default_jobs, MarketJobSpec, TradeCalendar,
    WarmupScheduler,
};
use pulse_upstream::{
    HttpTradeCalendar, MarketDataSource, SourceEndpoints, ThrottleGate, UpstreamClient,
};

/// 개장 전 예열 시각 (북경시간). A주 오전 세션 개장 15분 전.
const PREMARKET_WARMUP: (u32, u32) = (9, 15);

/// 서버 설정 구조체.
struct ServerConfig {
    /// 바인딩할 호스트 주소
    host: String,
    /// 바인딩할 포트
    port: u16,
}

impl ServerConfig {
    /// 환경 변수에서 설정 로드.
    fn from_env() -> Self {
        let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        Self { host, port }
    }

    /// 소켓 주소 반환.
    ///
    /// # Errors
    /// `host:port` 형식이 유효하지 않으면 `AddrParseError`를 반환합니다.
    fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// 캐시 스토어 선택.
///
/// `REDIS_URL`이 있으면 공유 스토어에 연결합니다 (연결 실패 시
/// 오프라인 스토어로 저하, fail-open). 없으면 단일 프로세스용
/// 인메모리 스토어를 사용합니다.
async fn create_store(settings: &Settings) -> Arc<dyn KeyValueStore> {
    match &settings.redis_url {
        Some(url) => {
            let store = RedisStore::connect(&RedisConfig { url: url.clone() }).await;
            Arc::new(store)
        }
        None => {
            warn!("인메모리 스토어로 동작합니다. 레이트 리밋과 캐시는 인스턴스 간 공유되지 않습니다");
            Arc::new(MemoryStore::new())
        }
    }
}

/// 업스트림 시세 소스 조립.
///
/// 모든 페처가 하나의 호출 간격 게이트를 공유해 업스트림에 대한
/// 최소 호출 간격을 보장합니다.
fn create_market_source() -> Result<MarketDataSource, pulse_upstream::UpstreamError> {
    let timeout_secs = env_var_parse("UPSTREAM_TIMEOUT_SECS", 20u64);
    let min_interval_ms = env_var_parse("UPSTREAM_MIN_INTERVAL_MS", 200u64);

    let client = UpstreamClient::new(Duration::from_secs(timeout_secs))?;
    let source = MarketDataSource::new(client, SourceEndpoints::default())
        .with_throttle(Arc::new(ThrottleGate::new(min_interval_ms)));

    Ok(source)
}

/// 거래일 캘린더 조립.
fn create_trade_calendar() -> Result<TradeCalendar, pulse_upstream::UpstreamError> {
    let url = std::env::var("TRADE_CALENDAR_URL")
        .unwrap_or_else(|_| "https://quote.eastmoney.com/api/trade_calendar".to_string());
    let client = UpstreamClient::new(Duration::from_secs(20))?;

    Ok(TradeCalendar::new(Arc::new(HttpTradeCalendar::new(
        client, url,
    ))))
}

/// 시장별 예열 잡과 주기 잡을 스케줄러에 등록합니다.
async fn register_warmup_jobs(
    scheduler: &WarmupScheduler,
    settings: &Settings,
    ops: &OpsCatalog,
    calendar: Arc<TradeCalendar>,
) {
    let specs = vec![
        MarketJobSpec {
            job_id: "market_cn_warmup".to_string(),
            policy: settings.markets.policy(Market::ChinaA).clone(),
            ops: ops.cn_ops(),
        },
        MarketJobSpec {
            job_id: "market_us_warmup".to_string(),
            policy: settings.markets.policy(Market::UsEquity).clone(),
            ops: ops.us_ops(),
        },
        MarketJobSpec {
            job_id: "metals_warmup".to_string(),
            policy: settings.markets.policy(Market::Metals).clone(),
            ops: ops.metals_ops(),
        },
    ];

    // 세션 개념이 없는 데이터셋은 논리 TTL에 맞춘 고정 주기로 돈다
    let funds_minutes = (settings.cache_ttl.funds / 60).max(1);
    let global_minutes = (settings.cache_ttl.global_indices / 60).max(1);

    scheduler
        .register_interval_job(
            "funds_top_refresh",
            funds_minutes,
            market_warmup_fn(vec![ops.funds_top.clone()]),
        )
        .await;
    scheduler
        .register_interval_job(
            "global_indices_refresh",
            global_minutes,
            market_warmup_fn(vec![ops.global_indices.clone()]),
        )
        .await;

    let premarket_at = NaiveTime::from_hms_opt(PREMARKET_WARMUP.0, PREMARKET_WARMUP.1, 0)
        .unwrap_or(NaiveTime::MIN);
    register_default_jobs(scheduler, specs, calendar, premarket_at).await;
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용).
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // tracing 초기화
    init_logging(LogConfig::from_env())?;

    info!("Starting MarketPulse API server...");

    // 설정 로드 — 유효하지 않으면 기동 거부
    let settings = Settings::from_env().map_err(|e| {
        error!("설정이 유효하지 않습니다: {}", e);
        e
    })?;

    let config = ServerConfig::from_env();
    let addr = config.socket_addr().map_err(|e| {
        error!(
            host = %config.host,
            port = config.port,
            error = %e,
            "소켓 주소 설정이 유효하지 않습니다. API_HOST, API_PORT 환경변수를 확인하세요."
        );
        e
    })?;

    // 캐시 스토어 (연결 실패 시 fail-open으로 저하)
    let store = create_store(&settings).await;
    info!(connected = store.is_connected(), "Cache store initialized");

    // 업스트림 소스 + 캐시 연산 카탈로그
    let source = Arc::new(create_market_source()?);
    let cache = SwrCache::new(
        Arc::clone(&store),
        settings.cache_prefix.clone(),
        settings.warmup.lock_ttl_secs,
    );
    let ops = OpsCatalog::build(&cache, &settings, source)?;

    // 예열 스케줄러 등록
    let scheduler = Arc::new(WarmupScheduler::new());
    let calendar = Arc::new(create_trade_calendar()?);
    register_warmup_jobs(&scheduler, &settings, &ops, calendar).await;
    info!(
        jobs = scheduler.status().await.len(),
        "Warmup scheduler initialized"
    );

    // 초기 예열은 기동을 막지 않도록 백그라운드에서 수행
    let warm_ops = ops.all();
    let max_retries = settings.warmup.max_retries;
    tokio::spawn(async move {
        initial_warmup(&warm_ops, max_retries).await;
    });

    // 애플리케이션 상태 + 라우터
    let state = Arc::new(AppState::new(
        settings,
        store,
        ops,
        Arc::clone(&scheduler),
    ));
    let app = create_router(state);

    // 서버 시작
    info!(%addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_token = CancellationToken::new();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    // 종료 시그널 받은 후 정리 작업
    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();
    scheduler.shutdown().await;

    info!("Server stopped gracefully");
    Ok(())
}
