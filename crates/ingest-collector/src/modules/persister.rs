//! 배치 저장.
//!
//! 조회된 레코드를 정리한 뒤 `persist_batch_size` 단위 트랜잭션으로 upsert하고,
//! 각 트랜잭션이 커밋된 후에만 커서를 전진시킵니다.
//!
//! # 커서 규칙
//!
//! - 배치 커밋 후: 해당 배치의 마지막 날짜로 전진
//! - 모든 배치 완료 후: 작업 단위의 `range.end`로 전진 (휴장일 구간 포함)
//! - 배치 실패 시: 커서는 마지막으로 커밋된 배치 위치에 남음

use chrono::NaiveDate;
use ingest_core::{Record, WorkItem};
use ingest_data::IngestStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::PersistError;

/// 배치 저장기.
pub struct BatchPersister {
    store: Arc<dyn IngestStore>,
    batch_size: usize,
}

impl BatchPersister {
    pub fn new(store: Arc<dyn IngestStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// 레코드를 저장하고 기록된 행 수를 반환합니다.
    ///
    /// `today` 이후 날짜의 레코드는 저장하지 않습니다.
    pub async fn persist(
        &self,
        item: &WorkItem,
        records: Vec<Record>,
        today: NaiveDate,
    ) -> Result<usize, PersistError> {
        let records = sanitize(item, records, today);
        let mut written = 0;

        for batch in records.chunks(self.batch_size) {
            let Some(last_date) = batch.last().map(Record::date) else {
                continue;
            };

            written += self
                .store
                .upsert_batch(item.dataset, item.instrument.id, batch)
                .await
                .map_err(PersistError::Upsert)?;

            self.store
                .set_cursor(item.instrument.id, item.dataset, last_date)
                .await
                .map_err(PersistError::Cursor)?;
        }

        self.store
            .set_cursor(item.instrument.id, item.dataset, item.range.end)
            .await
            .map_err(PersistError::Cursor)?;

        debug!(item = %item, written = written, "작업 단위 저장 완료");
        Ok(written)
    }
}

/// 범위 밖/미래/다른 데이터셋 레코드를 제거하고 날짜순으로 정렬합니다.
///
/// 같은 날짜가 여러 번 오면 마지막 레코드를 사용합니다.
fn sanitize(item: &WorkItem, records: Vec<Record>, today: NaiveDate) -> Vec<Record> {
    let received = records.len();
    let mut by_date = BTreeMap::new();

    for record in records {
        let date = record.date();
        if record.kind() != item.dataset || !item.range.contains(date) || date > today {
            continue;
        }
        by_date.insert(date, record);
    }

    let kept = by_date.len();
    if kept < received {
        warn!(
            item = %item,
            received = received,
            kept = kept,
            "범위 밖 또는 중복 레코드 제외"
        );
    }
    by_date.into_values().collect()
}
