//! 라우터 조립과 서버 수명주기 보조.
//!
//! 공개 데이터 경로와 관리 경로에 서로 다른 네임스페이스의
//! 레이트 리미터를 적용합니다. 리미터는 캐시와 같은 스토어를
//! 공유하므로 다중 인스턴스 배포에서도 한도가 합산됩니다.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use pulse_data::{FixedWindowLimiter, RateLimitConfig};

use crate::middleware::{rate_limit_middleware, RateLimitState};
use crate::routes;
use crate::state::AppState;

/// 전체 라우터 생성.
///
/// `/health*`는 리미터 밖에 두어 오케스트레이션 프로브가 한도를
/// 소모하지 않게 합니다.
pub fn create_router(state: Arc<AppState>) -> Router {
    let public_limiter = RateLimitState::new(FixedWindowLimiter::new(
        Arc::clone(&state.store),
        RateLimitConfig::new("public", state.settings.rate_limit.public_per_minute),
    ));
    let admin_limiter = RateLimitState::new(FixedWindowLimiter::new(
        Arc::clone(&state.store),
        RateLimitConfig::new("admin", state.settings.rate_limit.admin_per_minute),
    ));

    // 레이어는 이미 등록된 라우트에만 적용되므로, 관리 라우터는
    // 자체 리미터를 먼저 입힌 뒤에 중첩한다.
    let data_router = routes::create_api_router().layer(axum::middleware::from_fn_with_state(
        public_limiter,
        rate_limit_middleware,
    ));
    let admin_router = routes::admin::admin_router().layer(axum::middleware::from_fn_with_state(
        admin_limiter,
        rate_limit_middleware,
    ));

    Router::new()
        .merge(routes::health_router())
        .nest("/api", data_router.nest("/admin", admin_router))
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
        .with_state(state)
}

/// CORS 미들웨어 구성.
///
/// `CORS_ORIGINS` 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
pub fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소해
/// 백그라운드 태스크에도 종료를 전파합니다.
pub async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C 핸들러 설치 실패: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM 핸들러 설치 실패: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
