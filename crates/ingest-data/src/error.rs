//! 저장소 오류 타입.

use thiserror::Error;

/// 저장소 관련 오류.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// 저장소에 접근할 수 없음 (연결 실패, 풀 고갈, 연결 종료)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    Query(String),

    /// 트랜잭션 시작/커밋 실패 (롤백됨)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// 데이터셋과 맞지 않는 레코드 등 잘못된 입력
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// 저장소 전체가 사용 불가능한 상태인지 확인합니다.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(db_err) => StoreError::Query(db_err.message().to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
