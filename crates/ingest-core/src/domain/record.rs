//! 데이터셋별 레코드 형태.
//!
//! 각 데이터셋은 고정된 필드 집합을 가진 별도의 variant로 표현되며,
//! 모든 레코드는 `(instrument_id, date)` 키로 유일하게 식별됩니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DatasetKind;

/// 일별 가격 데이터.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBar {
    /// 거래일
    pub date: NaiveDate,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    /// 마지막 체결가
    pub close: i64,
    /// 최종가 (가중 평균 종가)
    pub final_price: i64,
    pub volume: i64,
    /// 거래대금
    pub value: i64,
    /// 체결 건수
    pub trade_count: i32,
    #[serde(default)]
    pub adjusted_open: Option<i64>,
    #[serde(default)]
    pub adjusted_high: Option<i64>,
    #[serde(default)]
    pub adjusted_low: Option<i64>,
    #[serde(default)]
    pub adjusted_close: Option<i64>,
    #[serde(default)]
    pub adjusted_final: Option<i64>,
    /// 수정 거래량 (없으면 `adjusted_final * volume / final_price`로 계산)
    #[serde(default)]
    pub adjusted_volume: Option<i64>,
}

impl PriceBar {
    /// 수정 거래량을 반환합니다.
    pub fn adjusted_volume(&self) -> Option<i64> {
        if self.adjusted_volume.is_some() {
            return self.adjusted_volume;
        }
        let adjusted_final = self.adjusted_final?;
        if self.final_price == 0 {
            return None;
        }
        let volume = i128::from(adjusted_final) * i128::from(self.volume)
            / i128::from(self.final_price);
        i64::try_from(volume).ok()
    }
}

/// 투자자 유형별(개인/기관) 일별 매매동향.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorFlow {
    /// 거래일
    pub date: NaiveDate,
    pub individual_buy_count: i32,
    pub institutional_buy_count: i32,
    pub individual_sell_count: i32,
    pub institutional_sell_count: i32,
    pub individual_buy_volume: i64,
    pub institutional_buy_volume: i64,
    pub individual_sell_volume: i64,
    pub institutional_sell_volume: i64,
    pub individual_buy_value: i64,
    pub institutional_buy_value: i64,
    pub individual_sell_value: i64,
    pub institutional_sell_value: i64,
}

/// 일별 지수 (시장 지수, 업종 지수 공용).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLevel {
    /// 거래일
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub adjusted_close: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<i64>,
}

/// 데이터셋 종류로 구분되는 수집 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dataset", content = "record", rename_all = "snake_case")]
pub enum Record {
    Price(PriceBar),
    InvestorFlow(InvestorFlow),
    IndexLevel(IndexLevel),
    SectorIndexLevel(IndexLevel),
}

impl Record {
    /// 레코드의 거래일.
    pub fn date(&self) -> NaiveDate {
        match self {
            Record::Price(r) => r.date,
            Record::InvestorFlow(r) => r.date,
            Record::IndexLevel(r) | Record::SectorIndexLevel(r) => r.date,
        }
    }

    /// 레코드가 속한 데이터셋.
    pub fn kind(&self) -> DatasetKind {
        match self {
            Record::Price(_) => DatasetKind::Prices,
            Record::InvestorFlow(_) => DatasetKind::InvestorFlows,
            Record::IndexLevel(_) => DatasetKind::IndexLevels,
            Record::SectorIndexLevel(_) => DatasetKind::SectorIndexLevels,
        }
    }
}
