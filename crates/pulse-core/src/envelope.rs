//! API 응답 envelope.
//!
//! 모든 데이터 엔드포인트는 이 envelope로 감싸 응답합니다.
//! 호출자는 캐시 레이어의 원시 에러를 절대 보지 않습니다:
//! 정상 데이터, stale 라벨이 붙은 데이터, 혹은 명시적
//! `warming_up`/`error` 상태 중 하나만 받습니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 응답 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    /// 정상 응답 (fresh 또는 stale 데이터 포함)
    Ok,
    /// 계산 실패
    Error,
    /// 캐시 미스 + 재계산 진행 중 (데이터 없음)
    WarmingUp,
}

/// 캐시 메타 정보.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    /// 캐시 상태 ("fresh" | "stale")
    pub state: String,
    /// 마지막 성공 계산 시각 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<i64>,
}

/// 통합 응답 envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// 응답 상태
    pub status: EnvelopeStatus,
    /// 응답 데이터 (status == ok일 때만 존재)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// 사람이 읽을 수 있는 메시지 (error/warming_up)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 캐시 메타 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheMeta>,
}

impl ApiEnvelope {
    /// 정상 응답 (캐시 메타 없음).
    pub fn ok(data: Value) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            data: Some(data),
            message: None,
            cache: None,
        }
    }

    /// 캐시를 거친 정상 응답.
    pub fn ok_cached(data: Value, state: impl Into<String>, computed_at: Option<i64>) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            data: Some(data),
            message: None,
            cache: Some(CacheMeta {
                state: state.into(),
                computed_at,
            }),
        }
    }

    /// 에러 응답.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            data: None,
            message: Some(message.into()),
            cache: None,
        }
    }

    /// 예열 진행 중 응답.
    pub fn warming_up() -> Self {
        Self {
            status: EnvelopeStatus::WarmingUp,
            data: None,
            message: Some("데이터 준비 중입니다. 잠시 후 다시 시도하세요".to_string()),
            cache: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_envelope_shape() {
        let envelope = ApiEnvelope::ok_cached(json!({"x": 1}), "stale", Some(1_700_000_000));
        let encoded = serde_json::to_value(&envelope).unwrap();

        assert_eq!(encoded["status"], "ok");
        assert_eq!(encoded["data"]["x"], 1);
        assert_eq!(encoded["cache"]["state"], "stale");
        assert_eq!(encoded["cache"]["computed_at"], 1_700_000_000);
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let encoded = serde_json::to_value(ApiEnvelope::error("업스트림 실패")).unwrap();

        assert_eq!(encoded["status"], "error");
        assert!(encoded.get("data").is_none());
        assert!(encoded.get("cache").is_none());
    }

    #[test]
    fn test_warming_up_status_tag() {
        let encoded = serde_json::to_value(ApiEnvelope::warming_up()).unwrap();
        assert_eq!(encoded["status"], "warming_up");
    }
}
