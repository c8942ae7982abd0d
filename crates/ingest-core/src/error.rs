//! 수집 엔진의 공통 에러 타입.
//!
//! 원격 소스 조회 실패는 재시도 가능 여부에 따라 두 가지로만 분류합니다.

use std::time::Duration;
use thiserror::Error;

/// 조회(fetch) 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 재시도 가능한 에러 (타임아웃, 5xx, 요청 제한)
    #[error("일시적 조회 에러: {0}")]
    Transient(String),

    /// 재시도해도 소용없는 에러 (잘못된 종목 식별자, 잘못된 요청, 4xx)
    #[error("영구 조회 에러: {0}")]
    Permanent(String),
}

/// 조회 작업을 위한 Result 타입.
pub type FetchResult<T> = Result<T, FetchError>;

impl FetchError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// HTTP 상태 코드로 에러를 분류합니다.
    ///
    /// 408, 429, 5xx는 일시적, 그 외 4xx는 영구 에러입니다.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = format!("HTTP {}: {}", status, message.into());
        match status {
            408 | 425 | 429 | 500..=599 => FetchError::Transient(message),
            _ => FetchError::Permanent(message),
        }
    }

    /// 요청 타임아웃 에러.
    pub fn timeout(after: Duration) -> Self {
        FetchError::Transient(format!("요청 타임아웃 ({:.1}s)", after.as_secs_f64()))
    }

    /// 에러 메시지.
    pub fn message(&self) -> &str {
        match self {
            FetchError::Transient(msg) | FetchError::Permanent(msg) => msg,
        }
    }
}
