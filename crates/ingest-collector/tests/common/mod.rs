//! 통합 테스트 공통 도구.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use ingest_collector::{IngestConfig, IngestEngine};
use ingest_core::{
    DatasetKind, DateRange, FetchError, FetchResult, IndexLevel, Instrument, InstrumentId,
    InvestorFlow, PriceBar, Record, Universe, UniverseEntry,
};
use ingest_data::{FetchClient, MemoryStore};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// 조회 호출 기록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub instrument_id: InstrumentId,
    pub dataset: DatasetKind,
    pub range: DateRange,
}

#[derive(Default)]
struct Script {
    /// 다음 호출들에서 순서대로 반환할 에러
    next_errors: HashMap<(InstrumentId, DatasetKind), VecDeque<FetchError>>,
    /// 항상 반환할 에러
    always: HashMap<(InstrumentId, DatasetKind), FetchError>,
    /// 특정 구간 시작일에 항상 반환할 에러
    chunk_errors: HashMap<(InstrumentId, DatasetKind, NaiveDate), FetchError>,
    /// 유니버스 목록 (없으면 목록 조회 미지원)
    universes: HashMap<Universe, Vec<UniverseEntry>>,
    calls: Vec<Call>,
}

/// 기간 안의 모든 날짜에 대해 레코드를 만들어 주는 가짜 조회 클라이언트.
///
/// 금요일은 휴장일로 취급해 레코드를 만들지 않습니다.
#[derive(Default)]
pub struct ScriptedFetchClient {
    script: Mutex<Script>,
}

impl ScriptedFetchClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, id: InstrumentId, dataset: DatasetKind, errors: Vec<FetchError>) {
        self.script
            .lock()
            .unwrap()
            .next_errors
            .entry((id, dataset))
            .or_default()
            .extend(errors);
    }

    pub fn fail_always(&self, id: InstrumentId, dataset: DatasetKind, error: FetchError) {
        self.script
            .lock()
            .unwrap()
            .always
            .insert((id, dataset), error);
    }

    pub fn fail_chunk(
        &self,
        id: InstrumentId,
        dataset: DatasetKind,
        start: NaiveDate,
        error: FetchError,
    ) {
        self.script
            .lock()
            .unwrap()
            .chunk_errors
            .insert((id, dataset, start), error);
    }

    pub fn set_universe(&self, universe: Universe, entries: Vec<UniverseEntry>) {
        self.script
            .lock()
            .unwrap()
            .universes
            .insert(universe, entries);
    }

    pub fn heal(&self) {
        let mut script = self.script.lock().unwrap();
        script.next_errors.clear();
        script.always.clear();
        script.chunk_errors.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, id: InstrumentId, dataset: DatasetKind) -> Vec<DateRange> {
        self.calls()
            .into_iter()
            .filter(|c| c.instrument_id == id && c.dataset == dataset)
            .map(|c| c.range)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.script.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl FetchClient for ScriptedFetchClient {
    async fn fetch(
        &self,
        instrument: &Instrument,
        dataset: DatasetKind,
        range: DateRange,
    ) -> FetchResult<Vec<Record>> {
        {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Call {
                instrument_id: instrument.id,
                dataset,
                range,
            });

            let key = (instrument.id, dataset);
            if let Some(err) = script.always.get(&key) {
                return Err(err.clone());
            }
            if let Some(err) = script.chunk_errors.get(&(instrument.id, dataset, range.start)) {
                return Err(err.clone());
            }
            if let Some(err) = script.next_errors.get_mut(&key).and_then(VecDeque::pop_front) {
                return Err(err);
            }
        }

        Ok(trading_days(range)
            .map(|date| record(dataset, date))
            .collect())
    }

    async fn list_universe(&self, universe: Universe) -> FetchResult<Vec<UniverseEntry>> {
        self.script
            .lock()
            .unwrap()
            .universes
            .get(&universe)
            .cloned()
            .ok_or_else(|| FetchError::Permanent(format!("no listing for {universe}")))
    }
}

/// 기간 안의 거래일 (금요일 제외).
pub fn trading_days(range: DateRange) -> impl Iterator<Item = NaiveDate> {
    range
        .start
        .iter_days()
        .take_while(move |date| *date <= range.end)
        .filter(|date| date.weekday() != chrono::Weekday::Fri)
}

pub fn trading_day_count(start: NaiveDate, end: NaiveDate) -> usize {
    trading_days(DateRange::new(start, end).unwrap()).count()
}

/// 날짜로부터 결정적인 값을 가진 레코드.
pub fn record(dataset: DatasetKind, date: NaiveDate) -> Record {
    let base = i64::from(date.ordinal()) * 10;
    match dataset {
        DatasetKind::Prices => Record::Price(PriceBar {
            date,
            open: base,
            high: base + 5,
            low: base - 5,
            close: base + 1,
            final_price: base + 2,
            volume: 1_000,
            value: (base + 2) * 1_000,
            trade_count: 10,
            adjusted_open: None,
            adjusted_high: None,
            adjusted_low: None,
            adjusted_close: None,
            adjusted_final: Some(base + 2),
            adjusted_volume: None,
        }),
        DatasetKind::InvestorFlows => Record::InvestorFlow(InvestorFlow {
            date,
            individual_buy_count: 12,
            institutional_buy_count: 3,
            individual_sell_count: 9,
            institutional_sell_count: 4,
            individual_buy_volume: base * 100,
            institutional_buy_volume: base * 50,
            individual_sell_volume: base * 90,
            institutional_sell_volume: base * 60,
            individual_buy_value: base * 1_000,
            institutional_buy_value: base * 500,
            individual_sell_value: base * 900,
            institutional_sell_value: base * 600,
        }),
        DatasetKind::IndexLevels | DatasetKind::SectorIndexLevels => {
            let level = IndexLevel {
                date,
                open: Decimal::from(base),
                high: Decimal::from(base + 5),
                low: Decimal::from(base - 5),
                close: Decimal::from(base + 1),
                adjusted_close: None,
                volume: Some(1_000),
            };
            if dataset == DatasetKind::IndexLevels {
                Record::IndexLevel(level)
            } else {
                Record::SectorIndexLevel(level)
            }
        }
    }
}

/// 테스트용 엔진 설정: 빠른 속도 제한, 짧은 백오프, 지터 없음.
pub fn test_config() -> IngestConfig {
    IngestConfig {
        rate_limit_per_second: 1_000.0,
        rate_limit_burst: 1_000,
        backoff_base_delay_ms: 10,
        backoff_max_delay_ms: 100,
        backoff_jitter: false,
        concurrency: 4,
        refresh_universe: false,
        ..Default::default()
    }
}

/// `count`개 주식 종목(ID 1..=count)을 등록합니다.
pub fn seed_stocks(store: &MemoryStore, count: i64, listing: NaiveDate) {
    for id in 1..=count {
        store.add_instrument(
            Universe::Stocks,
            Instrument::new(id, format!("STK{id}"), format!("IRO1STK{id:05}")).with_listing_date(listing),
        );
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub client: Arc<ScriptedFetchClient>,
    pub engine: IngestEngine,
}

pub fn harness(config: IngestConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let client = ScriptedFetchClient::new();
    let engine = IngestEngine::new(store.clone(), client.clone(), config).unwrap();
    Harness {
        store,
        client,
        engine,
    }
}
