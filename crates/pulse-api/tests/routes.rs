//! 라우터 통합 테스트.
//!
//! 실제 서비스와 같은 라우터 조립(`create_router`)에 인메모리
//! 스토어와 스텁 계산 함수를 붙여 요청을 흘려봅니다.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use pulse_api::ops::OpsCatalog;
use pulse_api::server::create_router;
use pulse_api::state::AppState;
use pulse_core::config::{
    CacheTtl, MarketTable, RateLimitSettings, Settings, WarmupSettings,
};
use pulse_data::{
    CachePolicy, ComputeFn, DataError, KeyValueStore, MemoryStore, RedisStore, SwrCache,
};
use pulse_scheduler::{market_warmup_fn, WarmupScheduler};

fn test_settings() -> Settings {
    Settings {
        cache_prefix: "test".to_string(),
        stale_ttl_ratio: 24,
        redis_url: None,
        cache_ttl: CacheTtl::default(),
        markets: MarketTable::default(),
        rate_limit: RateLimitSettings {
            public_per_minute: 100,
            admin_per_minute: 100,
        },
        warmup: WarmupSettings::default(),
    }
}

fn ok_compute(value: Value) -> ComputeFn {
    Arc::new(move || {
        let value = value.clone();
        Box::pin(async move { Ok(value) })
    })
}

fn failing_compute() -> ComputeFn {
    Arc::new(|| {
        Box::pin(async { Err(DataError::ComputeError("업스트림 연결 실패".to_string())) })
    })
}

/// 모든 연산이 같은 payload를 반환하는 스텁 카탈로그.
fn stub_catalog(cache: &SwrCache, compute: ComputeFn) -> OpsCatalog {
    let policy = || CachePolicy::new(300, 7200).unwrap();
    OpsCatalog {
        cn_fear_greed: cache.wrap("market_cn:fear_greed", policy(), compute.clone()),
        cn_leaders: cache.wrap("market_cn:leaders", policy(), compute.clone()),
        cn_bonds: cache.wrap("market_cn:bonds", policy(), compute.clone()),
        us_heat: cache.wrap("market_us:heat", policy(), compute.clone()),
        us_leaders: cache.wrap("market_us:leaders", policy(), compute.clone()),
        us_treasury: cache.wrap("market_us:treasury", policy(), compute.clone()),
        metals_spot: cache.wrap("metals:spot_price", policy(), compute.clone()),
        gold_silver_ratio: cache.wrap("metals:gold_silver_ratio", policy(), compute.clone()),
        funds_top: cache.wrap("funds:top", policy(), compute.clone()),
        global_indices: cache.wrap("global:indices", policy(), compute),
    }
}

async fn build_app(
    store: Arc<dyn KeyValueStore>,
    compute: ComputeFn,
    settings: Settings,
) -> (Router, Arc<WarmupScheduler>) {
    let cache = SwrCache::new(Arc::clone(&store), "test", 60);
    let ops = stub_catalog(&cache, compute);
    let scheduler = Arc::new(WarmupScheduler::new());

    let state = Arc::new(AppState::new(settings, store, ops, Arc::clone(&scheduler)));
    (create_router(state), scheduler)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).to_string(),
        ))
    };
    (status, body)
}

#[tokio::test]
async fn test_data_route_returns_ok_envelope_with_cache_meta() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, _) = build_app(store, ok_compute(json!({"value": 42})), test_settings()).await;

    let (status, body) = get(&app, "/api/cn/fear-greed").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["value"], 42);
    assert_eq!(body["cache"]["state"], "fresh");
    assert!(body["cache"]["computed_at"].is_i64());
}

#[tokio::test]
async fn test_funds_cold_miss_returns_warming_up() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, _) = build_app(store, ok_compute(json!({"funds": []})), test_settings()).await;

    // 펀드 경로는 논블로킹: cold miss는 기다리지 않고 warming_up
    let (status, body) = get(&app, "/api/funds/top").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "warming_up");
    assert!(body.get("data").is_none());
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_failed_compute_maps_to_error_envelope() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, _) = build_app(store, failing_compute(), test_settings()).await;

    let (status, body) = get(&app, "/api/cn/bonds").await;

    // 호출자는 원시 에러를 보지 않는다
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["message"].is_string());
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_liveness_probe() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, _) = build_app(store, ok_compute(json!({})), test_settings()).await;

    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_readiness_reports_degraded_when_store_offline() {
    let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::offline());
    let (app, scheduler) = build_app(store, ok_compute(json!({})), test_settings()).await;
    scheduler
        .register_interval_job("noop", 60, market_warmup_fn(vec![]))
        .await;

    let (status, body) = get(&app, "/health/ready").await;

    // 스토어가 죽어도 fail-open으로 서비스는 살아 있으므로 200
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["components"]["store"]["status"], "down");
    assert_eq!(body["components"]["scheduler"]["status"], "up");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_readiness_healthy_with_memory_store() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, scheduler) = build_app(store, ok_compute(json!({})), test_settings()).await;
    scheduler
        .register_interval_job("noop", 60, market_warmup_fn(vec![]))
        .await;

    let (status, body) = get(&app, "/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["store"]["status"], "up");
}

#[tokio::test]
async fn test_admin_scheduler_status_and_run() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, scheduler) = build_app(store, ok_compute(json!({})), test_settings()).await;
    scheduler
        .register_interval_job("funds_top_refresh", 720, market_warmup_fn(vec![]))
        .await;

    let (status, body) = get(&app, "/api/admin/scheduler/status").await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body.as_array().unwrap();
    assert!(jobs.iter().any(|j| j["job_id"] == "funds_top_refresh"));

    // 등록된 잡 즉시 실행
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/scheduler/run/funds_top_refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 없는 잡은 404
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/scheduler/run/no_such_job")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_rate_limit_boundary() {
    let mut settings = test_settings();
    settings.rate_limit.public_per_minute = 2;
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, _) = build_app(store, ok_compute(json!({})), settings).await;

    // 한도까지 허용
    for _ in 0..2 {
        let (status, _) = get(&app, "/api/cn/fear-greed").await;
        assert_eq!(status, StatusCode::OK);
    }

    // N+1번째는 거부 + Retry-After 헤더
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/cn/fear-greed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn test_admin_limiter_is_independent_of_public() {
    let mut settings = test_settings();
    settings.rate_limit.public_per_minute = 1;
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, scheduler) = build_app(store, ok_compute(json!({})), settings).await;
    scheduler
        .register_interval_job("noop", 60, market_warmup_fn(vec![]))
        .await;

    let (status, _) = get(&app, "/api/cn/fear-greed").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app, "/api/cn/leaders").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // 공개 한도를 소진해도 관리 경로는 별도 네임스페이스
    let (status, _) = get(&app, "/api/admin/scheduler/status").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_routes_skip_rate_limiting() {
    let mut settings = test_settings();
    settings.rate_limit.public_per_minute = 1;
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let (app, _) = build_app(store, ok_compute(json!({})), settings).await;

    let (status, _) = get(&app, "/api/cn/fear-greed").await;
    assert_eq!(status, StatusCode::OK);

    // 프로브는 한도를 소모하지도, 한도에 걸리지도 않는다
    for _ in 0..5 {
        let (status, _) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}
