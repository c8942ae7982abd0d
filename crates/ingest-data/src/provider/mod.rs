//! 원격 데이터 소스 추상화.
//!
//! 엔진은 전송 방식에 관여하지 않습니다. 아래 계약과 에러 분류
//! (`FetchError::Transient` / `FetchError::Permanent`)를 지키는 구현이면 무엇이든 됩니다.

pub mod http;

use async_trait::async_trait;
use ingest_core::{
    DatasetKind, DateRange, FetchError, FetchResult, Instrument, Record, Universe, UniverseEntry,
};

pub use http::{HttpFetchClient, SourceConfig};

/// 종목·기간 단위 조회 trait.
///
/// # 구현 예시
///
/// ```ignore
/// struct ScraperClient { /* ... */ }
///
/// #[async_trait]
/// impl FetchClient for ScraperClient {
///     async fn fetch(&self, instrument: &Instrument, dataset: DatasetKind, range: DateRange)
///         -> FetchResult<Vec<Record>> {
///         // 원격 응답을 가져와 레코드로 변환
///     }
/// }
/// ```
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// `range` 기간의 레코드를 조회합니다.
    ///
    /// 반환되는 레코드의 variant는 `dataset`과 일치해야 합니다.
    /// 데이터가 없는 기간(휴장일)은 빈 벡터로 반환합니다.
    ///
    /// # Errors
    ///
    /// - `FetchError::Transient`: 타임아웃, 5xx, 요청 제한 등 재시도 가능한 실패
    /// - `FetchError::Permanent`: 잘못된 식별자, 잘못된 요청 등 재시도 불가능한 실패
    async fn fetch(
        &self,
        instrument: &Instrument,
        dataset: DatasetKind,
        range: DateRange,
    ) -> FetchResult<Vec<Record>>;

    /// 유니버스의 현재 종목 목록을 조회합니다.
    ///
    /// 목록 조회를 지원하지 않는 소스는 기본 구현대로 `Permanent`를 반환하며,
    /// 엔진은 해당 유니버스 갱신을 건너뜁니다.
    async fn list_universe(&self, universe: Universe) -> FetchResult<Vec<UniverseEntry>> {
        Err(FetchError::Permanent(format!(
            "universe listing not supported: {}",
            universe
        )))
    }
}
