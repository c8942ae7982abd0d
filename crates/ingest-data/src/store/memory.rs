//! 메모리 기반 저장소.
//!
//! 테스트와 dry-run에서 사용합니다. 데이터셋별로 `BTreeMap<날짜, 레코드>`를
//! 유지하므로 같은 키의 재기록은 항상 덮어쓰기가 됩니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{DatasetKind, Instrument, InstrumentId, Record, Universe, UniverseEntry};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{DeleteStats, IngestStore, UniverseSyncStats};
use crate::{Result, StoreError};

#[derive(Debug, Default)]
struct Inner {
    available: bool,
    instruments: HashMap<Universe, Vec<Instrument>>,
    records: HashMap<(DatasetKind, InstrumentId), BTreeMap<NaiveDate, Record>>,
    cursors: HashMap<(DatasetKind, InstrumentId), NaiveDate>,
    failing_upserts: HashSet<(DatasetKind, InstrumentId)>,
    upsert_log: Vec<UpsertEntry>,
}

/// upsert 호출 기록 (순서 검증용).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertEntry {
    pub dataset: DatasetKind,
    pub instrument_id: InstrumentId,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub rows: usize,
}

/// 메모리 저장소.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                available: true,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("메모리 저장소 뮤텍스 poison 상태, 복구합니다");
            poisoned.into_inner()
        })
    }

    fn ensure_available(inner: &Inner) -> Result<()> {
        if inner.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    /// 유니버스에 종목을 등록합니다. 같은 ID가 있으면 교체합니다.
    pub fn add_instrument(&self, universe: Universe, instrument: Instrument) {
        let mut inner = self.lock();
        let list = inner.instruments.entry(universe).or_default();
        list.retain(|i| i.id != instrument.id);
        list.push(instrument);
        list.sort_by_key(|i| i.id);
    }

    /// 유니버스의 종목 목록 (ID순).
    pub fn instruments(&self, universe: Universe) -> Vec<Instrument> {
        self.lock()
            .instruments
            .get(&universe)
            .cloned()
            .unwrap_or_default()
    }

    /// 저장소 가용 여부를 설정합니다. `false`이면 모든 연산이 `Unavailable`을 반환합니다.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// 특정 종목·데이터셋의 upsert를 실패하게 만듭니다.
    pub fn fail_upserts_for(&self, dataset: DatasetKind, instrument_id: InstrumentId) {
        self.lock().failing_upserts.insert((dataset, instrument_id));
    }

    /// upsert 실패 설정을 해제합니다.
    pub fn clear_upsert_failures(&self) {
        self.lock().failing_upserts.clear();
    }

    /// 저장된 레코드를 날짜순으로 반환합니다.
    pub fn records(&self, dataset: DatasetKind, instrument_id: InstrumentId) -> Vec<Record> {
        self.lock()
            .records
            .get(&(dataset, instrument_id))
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 데이터셋의 전체 레코드 수.
    pub fn record_count(&self, dataset: DatasetKind) -> usize {
        self.lock()
            .records
            .iter()
            .filter(|((kind, _), _)| *kind == dataset)
            .map(|(_, m)| m.len())
            .sum()
    }

    /// 데이터셋의 커서 수.
    pub fn cursor_count(&self, dataset: DatasetKind) -> usize {
        self.lock()
            .cursors
            .keys()
            .filter(|(kind, _)| *kind == dataset)
            .count()
    }

    /// 지금까지의 upsert 호출 기록.
    pub fn upsert_log(&self) -> Vec<UpsertEntry> {
        self.lock().upsert_log.clone()
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    async fn health_check(&self) -> Result<()> {
        Self::ensure_available(&self.lock())
    }

    async fn list_instruments(&self, dataset: DatasetKind) -> Result<Vec<Instrument>> {
        let inner = self.lock();
        Self::ensure_available(&inner)?;
        Ok(inner
            .instruments
            .get(&dataset.universe())
            .cloned()
            .unwrap_or_default())
    }

    async fn sync_universe(
        &self,
        universe: Universe,
        entries: &[UniverseEntry],
    ) -> Result<UniverseSyncStats> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;

        let list = inner.instruments.entry(universe).or_default();
        let mut next_id = list.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        let listed: HashSet<&str> = entries.iter().map(|e| e.web_id.as_str()).collect();
        let mut stats = UniverseSyncStats::default();

        for entry in entries {
            match list.iter_mut().find(|i| i.web_id == entry.web_id) {
                Some(existing) => {
                    existing.ticker = entry.ticker.clone();
                    existing.is_active = true;
                    existing.sector_id = entry.sector_id.or(existing.sector_id);
                    existing.listing_date = entry.listing_date.or(existing.listing_date);
                    stats.updated += 1;
                }
                None => {
                    list.push(Instrument {
                        id: next_id,
                        ticker: entry.ticker.clone(),
                        web_id: entry.web_id.clone(),
                        is_active: true,
                        sector_id: entry.sector_id,
                        listing_date: entry.listing_date,
                    });
                    next_id += 1;
                    stats.inserted += 1;
                }
            }
        }

        for instrument in list.iter_mut() {
            if instrument.is_active && !listed.contains(instrument.web_id.as_str()) {
                instrument.is_active = false;
                stats.deactivated += 1;
            }
        }

        debug!(universe = %universe, ?stats, "메모리 유니버스 동기화");
        Ok(stats)
    }

    async fn upsert_batch(
        &self,
        dataset: DatasetKind,
        instrument_id: InstrumentId,
        records: &[Record],
    ) -> Result<usize> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;

        if inner.failing_upserts.contains(&(dataset, instrument_id)) {
            return Err(StoreError::Transaction(format!(
                "injected upsert failure for {} #{}",
                dataset, instrument_id
            )));
        }
        if let Some(bad) = records.iter().find(|r| r.kind() != dataset) {
            return Err(StoreError::InvalidData(format!(
                "{} record in {} batch",
                bad.kind(),
                dataset
            )));
        }

        let table = inner.records.entry((dataset, instrument_id)).or_default();
        for record in records {
            table.insert(record.date(), record.clone());
        }

        inner.upsert_log.push(UpsertEntry {
            dataset,
            instrument_id,
            first_date: records.first().map(Record::date),
            last_date: records.last().map(Record::date),
            rows: records.len(),
        });
        debug!(dataset = %dataset, instrument_id, rows = records.len(), "메모리 upsert");
        Ok(records.len())
    }

    async fn get_cursor(
        &self,
        instrument_id: InstrumentId,
        dataset: DatasetKind,
    ) -> Result<Option<NaiveDate>> {
        let inner = self.lock();
        Self::ensure_available(&inner)?;
        Ok(inner.cursors.get(&(dataset, instrument_id)).copied())
    }

    async fn list_cursors(&self, dataset: DatasetKind) -> Result<HashMap<InstrumentId, NaiveDate>> {
        let inner = self.lock();
        Self::ensure_available(&inner)?;
        Ok(inner
            .cursors
            .iter()
            .filter(|((kind, _), _)| *kind == dataset)
            .map(|((_, id), date)| (*id, *date))
            .collect())
    }

    async fn set_cursor(
        &self,
        instrument_id: InstrumentId,
        dataset: DatasetKind,
        date: NaiveDate,
    ) -> Result<()> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;
        let cursor = inner.cursors.entry((dataset, instrument_id)).or_insert(date);
        if date > *cursor {
            *cursor = date;
        }
        Ok(())
    }

    async fn delete_dataset(&self, dataset: DatasetKind) -> Result<DeleteStats> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;

        let mut stats = DeleteStats::default();
        inner.records.retain(|(kind, _), rows| {
            if *kind == dataset {
                stats.records += rows.len() as u64;
                false
            } else {
                true
            }
        });
        inner.cursors.retain(|(kind, _), _| {
            if *kind == dataset {
                stats.cursors += 1;
                false
            } else {
                true
            }
        });
        Ok(stats)
    }
}
