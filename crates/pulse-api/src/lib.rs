//! 시장 데이터 집계 REST API 서버 라이브러리.
//!
//! 바이너리(`main.rs`)는 설정 로드와 배선만 담당하고, 라우터 조립과
//! 핸들러는 여기서 제공합니다. 통합 테스트는 `server::create_router`로
//! 실제 서비스 구성 그대로 요청을 흘려볼 수 있습니다.

pub mod middleware;
pub mod ops;
pub mod routes;
pub mod server;
pub mod state;

pub use ops::OpsCatalog;
pub use server::create_router;
pub use state::AppState;
