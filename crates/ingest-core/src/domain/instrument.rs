//! 수집 대상 종목.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Universe;

/// 저장소가 부여한 종목 식별자.
pub type InstrumentId = i64;

/// 수집 대상 종목 (주식, 지수 또는 업종).
///
/// 식별 정보는 생성 후 변경되지 않으며, `is_active`만 주기적인
/// 유니버스 갱신으로 바뀝니다. 엔진은 계획 수립에 필요한 정보만 보유합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// 저장소 ID
    pub id: InstrumentId,
    /// 티커/심볼
    pub ticker: String,
    /// 원격 소스에서 사용하는 웹 식별자
    pub web_id: String,
    /// 활성 여부 (비활성 종목은 수집하지 않음)
    pub is_active: bool,
    /// 업종 참조
    pub sector_id: Option<i64>,
    /// 상장일 (알 수 없으면 설정의 기본값 사용)
    pub listing_date: Option<NaiveDate>,
}

impl Instrument {
    /// 활성 종목을 생성합니다.
    pub fn new(id: InstrumentId, ticker: impl Into<String>, web_id: impl Into<String>) -> Self {
        Self {
            id,
            ticker: ticker.into(),
            web_id: web_id.into(),
            is_active: true,
            sector_id: None,
            listing_date: None,
        }
    }

    /// 상장일을 설정합니다.
    pub fn with_listing_date(mut self, date: NaiveDate) -> Self {
        self.listing_date = Some(date);
        self
    }

    /// 업종을 설정합니다.
    pub fn with_sector(mut self, sector_id: i64) -> Self {
        self.sector_id = Some(sector_id);
        self
    }

    /// 활성 여부를 설정합니다.
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.ticker, self.id)
    }
}

/// 원격 소스가 제공하는 유니버스 목록의 한 항목.
///
/// 저장소 ID는 아직 없으며, 저장소가 `(universe, web_id)`로 기존 종목과 맞춰
/// ID를 부여합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    /// 티커/심볼
    pub ticker: String,
    /// 원격 소스에서 사용하는 웹 식별자
    pub web_id: String,
    /// 업종 참조
    #[serde(default)]
    pub sector_id: Option<i64>,
    /// 상장일
    #[serde(default)]
    pub listing_date: Option<NaiveDate>,
}

impl UniverseEntry {
    pub fn new(ticker: impl Into<String>, web_id: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            web_id: web_id.into(),
            sector_id: None,
            listing_date: None,
        }
    }

    /// 상장일을 설정합니다.
    pub fn with_listing_date(mut self, date: NaiveDate) -> Self {
        self.listing_date = Some(date);
        self
    }
}

/// 유니버스를 포함한 종목 키.
///
/// 지수와 주식은 서로 다른 테이블에서 ID를 부여받으므로
/// 실행 범위 상태(서킷 브레이커 등)는 이 키로 구분합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentKey {
    pub universe: Universe,
    pub id: InstrumentId,
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.universe, self.id)
    }
}
