//! 수집 저장소 추상화.
//!
//! 엔진은 저장 엔진의 세부 사항을 알지 못하며 이 trait에 정의된 연산만 사용합니다.
//! 각 연산은 구현체가 보장하는 트랜잭션 범위 안에서 실행됩니다.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{DatasetKind, Instrument, InstrumentId, Record, Universe, UniverseEntry};
use serde::Serialize;
use std::collections::HashMap;

use crate::Result;

/// 데이터셋 삭제 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteStats {
    /// 삭제된 레코드 수
    pub records: u64,
    /// 삭제된 커서 수
    pub cursors: u64,
}

/// 유니버스 동기화 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UniverseSyncStats {
    /// 새로 등록된 종목 수
    pub inserted: u64,
    /// 기존 종목 중 목록에 다시 나타난 수
    pub updated: u64,
    /// 목록에서 빠져 비활성화된 종목 수
    pub deactivated: u64,
}

/// 수집 저장소 trait.
///
/// # 구현 규칙
///
/// - `upsert_batch`는 한 트랜잭션으로 전부 커밋되거나 전부 롤백되어야 합니다.
/// - 같은 `(instrument_id, date)` 키는 덮어쓰며 중복 키 에러가 발생하지 않아야 합니다.
/// - `sync_universe`는 한 트랜잭션으로 실행되며 종목 ID를 바꾸지 않습니다.
/// - `set_cursor`는 커서를 앞으로만 이동시킵니다. 뒤로 돌리는 유일한 방법은
///   `delete_dataset`입니다.
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// 저장소 연결 상태를 확인합니다.
    async fn health_check(&self) -> Result<()>;

    /// 데이터셋의 종목 유니버스를 조회합니다 (비활성 종목 포함).
    async fn list_instruments(&self, dataset: DatasetKind) -> Result<Vec<Instrument>>;

    /// 원격 유니버스 목록을 종목 테이블에 반영합니다.
    ///
    /// `(universe, web_id)`로 기존 종목과 맞춰, 새 항목은 새 ID로 등록하고
    /// 기존 항목은 활성화하면서 티커를 갱신합니다. 업종과 상장일은 값이 있을 때만
    /// 덮어씁니다. 목록에 없는 활성 종목은 비활성화합니다.
    /// `entries`의 `web_id`는 서로 달라야 합니다.
    async fn sync_universe(
        &self,
        universe: Universe,
        entries: &[UniverseEntry],
    ) -> Result<UniverseSyncStats>;

    /// 레코드를 `(instrument_id, date)` 키로 upsert하고 기록된 행 수를 반환합니다.
    async fn upsert_batch(
        &self,
        dataset: DatasetKind,
        instrument_id: InstrumentId,
        records: &[Record],
    ) -> Result<usize>;

    /// 마지막 동기화 날짜를 조회합니다.
    async fn get_cursor(
        &self,
        instrument_id: InstrumentId,
        dataset: DatasetKind,
    ) -> Result<Option<NaiveDate>>;

    /// 데이터셋의 모든 커서를 조회합니다.
    async fn list_cursors(&self, dataset: DatasetKind) -> Result<HashMap<InstrumentId, NaiveDate>>;

    /// 커서를 전진시킵니다 (현재 값보다 이전 날짜는 무시).
    async fn set_cursor(
        &self,
        instrument_id: InstrumentId,
        dataset: DatasetKind,
        date: NaiveDate,
    ) -> Result<()>;

    /// 데이터셋의 모든 레코드와 커서를 삭제합니다.
    async fn delete_dataset(&self, dataset: DatasetKind) -> Result<DeleteStats>;
}
