//! 업스트림 에러 타입.

use thiserror::Error;

/// 업스트림 호출 에러.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// HTTP 상태 코드 에러
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// 응답 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 응답에 기대한 필드가 없음
    #[error("Missing field in response: {0}")]
    MissingField(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// 잘린/비정상 응답을 가리키는 파싱 에러 키워드.
///
/// 업스트림이 과부하일 때 빈 본문이나 잘린 JSON을 돌려주는 경우가
/// 있어, 이런 파싱 실패는 일시 장애로 간주하고 재시도합니다.
const TRANSIENT_PARSE_KEYWORDS: &[&str] = &[
    "eof while parsing",
    "expected value",
    "unexpected end",
    "recursion limit",
];

impl UpstreamError {
    /// 재시도할 가치가 있는 일시적 에러인지 확인.
    ///
    /// 연결 끊김/타임아웃과 잘린 응답으로 인한 파싱 실패만 해당합니다.
    /// HTTP 4xx/5xx와 필드 누락은 재시도해도 결과가 같으므로 제외합니다.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Network(_) | UpstreamError::Timeout(_) => true,
            UpstreamError::Parse(msg) => {
                let msg = msg.to_lowercase();
                TRANSIENT_PARSE_KEYWORDS.iter().any(|kw| msg.contains(kw))
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(err.to_string())
        } else if err.is_connect() {
            UpstreamError::Network(err.to_string())
        } else if err.is_decode() {
            UpstreamError::Parse(err.to_string())
        } else {
            UpstreamError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;
