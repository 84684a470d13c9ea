//! 키-값 스토어 어댑터.
//!
//! 캐시 코어와 레이트 리미터가 요구하는 최소 프로토콜을
//! trait으로 고정하고, Redis 구현과 인메모리 구현을 제공합니다.
//! 스토어 교체가 가능해야 테스트에서 프로세스 외부 의존 없이
//! 캐시 불변식을 검증할 수 있습니다.

pub mod memory;
pub mod redis;

use crate::error::Result;
use async_trait::async_trait;

/// 키-값 스토어 공통 인터페이스.
///
/// 모든 값은 JSON 문자열로 직렬화되어 저장됩니다.
/// 구현체는 TTL 만료를 스스로 책임집니다.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 스토어 연결 상태. fail-open 분기의 기준이 됩니다.
    fn is_connected(&self) -> bool;

    /// 값을 가져옵니다. 키가 없거나 만료되면 None.
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// TTL과 함께 값을 저장합니다.
    async fn set_raw(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// 키를 삭제합니다. 삭제된 키가 있으면 true.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// 키 존재 여부.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 카운터를 원자적으로 증가시키고 만료를 갱신합니다.
    ///
    /// 증가와 만료 설정은 하나의 원자 단위로 적용되어야 하며,
    /// 증가 후의 카운트를 반환합니다.
    async fn incr_with_expire(&self, key: &str, expire_secs: u64) -> Result<i64>;

    /// 잠금을 획득합니다 (SET NX EX 의미론).
    ///
    /// 이미 잠금이 잡혀 있으면 false. TTL은 잠금 해제가 누락됐을 때의
    /// 데드락 안전장치입니다.
    async fn acquire_lock(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// 잠금을 해제합니다.
    async fn release_lock(&self, key: &str) -> Result<bool>;
}
