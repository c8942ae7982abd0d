//! 저장소와 원격 데이터 소스 경계.
//!
//! 이 crate는 수집 엔진이 의존하는 외부 협력자의 인터페이스와 구현을 제공합니다:
//! - `IngestStore`: 레코드 upsert, 커서 조회/갱신, 데이터셋 삭제
//! - `FetchClient`: 종목·기간 단위 원격 조회
//! - 메모리 저장소, PostgreSQL 저장소, HTTP 조회 클라이언트

pub mod error;
pub mod provider;
pub mod store;

pub use error::{Result, StoreError};
pub use provider::{FetchClient, HttpFetchClient, SourceConfig};
pub use store::memory::MemoryStore;
pub use store::postgres::{DatabaseConfig, PgIngestStore};
pub use store::{DeleteStats, IngestStore, UniverseSyncStats};
