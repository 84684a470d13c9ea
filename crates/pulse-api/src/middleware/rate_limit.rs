//! Rate limiting 미들웨어.
//!
//! 공유 스토어 기반 고정 윈도우 리미터를 사용합니다. 여러 인스턴스가
//! 같은 스토어를 쓰면 한도도 인스턴스 간에 공유됩니다. 스토어가
//! 오프라인이면 전부 허용합니다 (fail open).

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use pulse_data::FixedWindowLimiter;

/// 윈도우 경과 후 재시도 안내 (초).
const RETRY_AFTER_SECS: u64 = 60;

/// Rate limit 미들웨어 상태.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: FixedWindowLimiter,
}

impl RateLimitState {
    pub fn new(limiter: FixedWindowLimiter) -> Self {
        Self { limiter }
    }
}

/// Rate limiting 미들웨어 함수.
///
/// 클라이언트 식별자(IP) 단위로 분당 한도를 적용합니다.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let client = extract_client_ip(&request);

    if state.limiter.is_allowed(&client).await {
        counter!("rate_limit_requests_total", "status" => "allowed").increment(1);
        return next.run(request).await;
    }

    counter!("rate_limit_requests_total", "status" => "limited").increment(1);
    tracing::warn!(client = %client, "Rate limit exceeded");

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        serde_json::json!({
            "status": "error",
            "message": "요청 한도를 초과했습니다. 잠시 후 다시 시도하세요",
            "retry_after": RETRY_AFTER_SECS
        })
        .to_string(),
    )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&RETRY_AFTER_SECS.to_string()) {
        response
            .headers_mut()
            .insert(axum::http::header::RETRY_AFTER, value);
    }

    response
}

/// 요청에서 클라이언트 IP 추출.
///
/// 프록시/로드밸런서 뒤에 있을 경우를 위해 X-Forwarded-For,
/// X-Real-IP 헤더를 우선 확인합니다.
fn extract_client_ip(request: &Request) -> String {
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            // 첫 번째 IP가 클라이언트 원본
            if let Some(ip) = value.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            let ip = value.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    "127.0.0.1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_header(name: &str, value: &str) -> Request {
        Request::builder()
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_forwarded_for_takes_first_ip() {
        let request = request_with_header("x-forwarded-for", "203.0.113.7, 10.0.0.1");
        assert_eq!(extract_client_ip(&request), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let request = request_with_header("x-real-ip", "198.51.100.3");
        assert_eq!(extract_client_ip(&request), "198.51.100.3");
    }

    #[test]
    fn test_default_when_no_headers() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&request), "127.0.0.1");
    }
}
