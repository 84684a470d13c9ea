//! 업스트림 HTTP 클라이언트.
//!
//! 공개 시세 엔드포인트에 대한 JSON GET을 담당합니다. 요청 헤더는
//! [`HeaderStrategy`]로 분리되어 있어 소스별 프로필을 주입할 수 있습니다.

use crate::error::{Result, UpstreamError};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 요청 헤더 프로필.
///
/// 일부 업스트림은 기본 reqwest UA를 차단하므로, 소스별로 헤더
/// 구성을 바꿔 끼울 수 있게 trait으로 분리합니다.
pub trait HeaderStrategy: Send + Sync {
    fn apply(&self, req: RequestBuilder) -> RequestBuilder;
}

/// 브라우저 유사 기본 헤더 프로필.
pub struct DefaultHeaders;

impl HeaderStrategy for DefaultHeaders {
    fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        )
        .header("Accept", "application/json, text/plain, */*")
        .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
    }
}

/// 업스트림 JSON 클라이언트.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    headers: Arc<dyn HeaderStrategy>,
}

impl UpstreamClient {
    /// 기본 헤더 프로필과 타임아웃으로 생성.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_headers(timeout, Arc::new(DefaultHeaders))
    }

    /// 커스텀 헤더 프로필로 생성.
    pub fn with_headers(timeout: Duration, headers: Arc<dyn HeaderStrategy>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unknown(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { http, headers })
    }

    /// JSON GET 요청.
    ///
    /// 2xx가 아닌 상태 코드는 본문을 읽지 않고 [`UpstreamError::Status`]로
    /// 반환합니다. 본문 파싱 실패는 `Parse`가 됩니다.
    pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        debug!(url, "업스트림 GET");

        let req = self.headers.apply(self.http.get(url).query(query));
        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_json_parses_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_query(mockito::Matcher::UrlEncoded("symbol".into(), "XAU".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"price": 2650.5}]}"#)
            .create_async()
            .await;

        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();
        let url = format!("{}/quote", server.url());
        let value = client.get_json(&url, &[("symbol", "XAU")]).await.unwrap();

        assert_eq!(value["data"][0]["price"], 2650.5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .with_status(503)
            .create_async()
            .await;

        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();
        let url = format!("{}/quote", server.url());
        let err = client.get_json(&url, &[]).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Status { code: 503, .. }));
    }

    #[tokio::test]
    async fn test_truncated_body_is_transient_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .with_body(r#"{"data": [{"price""#)
            .create_async()
            .await;

        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();
        let url = format!("{}/quote", server.url());
        let err = client.get_json(&url, &[]).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Parse(_)));
        assert!(err.is_transient());
    }
}
