//! 데이터셋 종류 정의.
//!
//! 데이터셋 종류는 커서 네임스페이스와 레코드 형태를 결정합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 수집 대상 데이터셋.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// 일별 가격 (시가/고가/저가/종가/최종가, 수정주가 포함)
    Prices,
    /// 투자자 유형별(개인/기관) 매매동향
    InvestorFlows,
    /// 시장 지수
    IndexLevels,
    /// 업종 지수
    SectorIndexLevels,
}

/// 데이터셋이 속한 종목 유니버스.
///
/// 같은 유니버스 안에서만 종목 ID가 유일합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Universe {
    /// 상장 종목
    Stocks,
    /// 시장 지수
    Indices,
    /// 업종
    Sectors,
}

impl DatasetKind {
    /// 전체 데이터셋 목록.
    pub const ALL: [DatasetKind; 4] = [
        DatasetKind::Prices,
        DatasetKind::InvestorFlows,
        DatasetKind::IndexLevels,
        DatasetKind::SectorIndexLevels,
    ];

    /// 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Prices => "prices",
            DatasetKind::InvestorFlows => "investor_flows",
            DatasetKind::IndexLevels => "index_levels",
            DatasetKind::SectorIndexLevels => "sector_index_levels",
        }
    }

    /// 이 데이터셋의 종목 유니버스를 반환합니다.
    pub fn universe(&self) -> Universe {
        match self {
            DatasetKind::Prices | DatasetKind::InvestorFlows => Universe::Stocks,
            DatasetKind::IndexLevels => Universe::Indices,
            DatasetKind::SectorIndexLevels => Universe::Sectors,
        }
    }

    /// 쉼표로 구분된 목록을 파싱합니다 (예: "prices,investor_flows").
    pub fn parse_list(s: &str) -> Result<Vec<DatasetKind>, String> {
        let mut kinds = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind: DatasetKind = part.parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl Universe {
    /// 전체 유니버스 목록.
    pub const ALL: [Universe; 3] = [Universe::Stocks, Universe::Indices, Universe::Sectors];

    /// 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Universe::Stocks => "stocks",
            Universe::Indices => "indices",
            Universe::Sectors => "sectors",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "prices" | "price" => Ok(DatasetKind::Prices),
            "investor_flows" | "ri" => Ok(DatasetKind::InvestorFlows),
            "index_levels" | "indices" => Ok(DatasetKind::IndexLevels),
            "sector_index_levels" | "sectors" => Ok(DatasetKind::SectorIndexLevels),
            _ => Err(format!("Unknown dataset: {}", s)),
        }
    }
}

impl FromStr for Universe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stocks" | "stock" => Ok(Universe::Stocks),
            "indices" | "index" => Ok(Universe::Indices),
            "sectors" | "sector" => Ok(Universe::Sectors),
            _ => Err(format!("Unknown universe: {}", s)),
        }
    }
}
