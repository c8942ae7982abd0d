//! 에러 타입 정의.
//!
//! 작업 단위(WorkItem) 에러는 디스패처 경계에서 `RunSummary`로 접히며,
//! 호출자에게 전파되는 것은 `CollectorError`뿐입니다.

use ingest_data::StoreError;
use thiserror::Error;

/// 호출자에게 전파되는 수집기 에러.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 재구축 확인 누락
    #[error("Rebuild of {0} requires explicit confirmation")]
    ConfirmationRequired(String),

    /// 저장소 전체 사용 불가 (실행 중단)
    #[error("Store unavailable, run aborted: {0}")]
    FatalStoreUnavailable(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 저장소 에러 (계획 단계 등 작업 단위 밖에서 발생)
    #[error("Store error: {0}")]
    Store(#[source] StoreError),

    /// 백그라운드 태스크 에러
    #[error("Task error: {0}")]
    Task(String),
}

impl From<StoreError> for CollectorError {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            Self::FatalStoreUnavailable(err.to_string())
        } else {
            Self::Store(err)
        }
    }
}

impl From<config::ConfigError> for CollectorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// 배치 저장 에러. 해당 작업 단위에만 영향을 줍니다.
#[derive(Debug, Error)]
pub enum PersistError {
    /// upsert 트랜잭션 실패 (롤백됨)
    #[error("Upsert failed: {0}")]
    Upsert(#[source] StoreError),

    /// 커밋 후 커서 갱신 실패 (다음 실행에서 같은 범위를 다시 조회)
    #[error("Cursor update failed: {0}")]
    Cursor(#[source] StoreError),
}

impl PersistError {
    /// 저장소 전체가 사용 불가능해서 실패했는지 확인합니다.
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            PersistError::Upsert(e) | PersistError::Cursor(e) => e.is_unavailable(),
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
