//! HTTP 조회 클라이언트.
//!
//! 정형화된 레코드를 JSON 배열로 제공하는 게이트웨이를 호출합니다:
//!
//! ```text
//! GET {base_url}/{dataset}/{web_id}?from=YYYY-MM-DD&to=YYYY-MM-DD
//! GET {base_url}/universe/{universe}
//! ```
//!
//! HTML 스크래핑과 파싱은 게이트웨이 쪽 책임입니다.

use async_trait::async_trait;
use ingest_core::{
    DatasetKind, DateRange, FetchError, FetchResult, IndexLevel, Instrument, InvestorFlow,
    PriceBar, Record, Universe, UniverseEntry,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::FetchClient;

/// 원격 소스 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// 게이트웨이 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User-Agent 헤더
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string()
}

impl SourceConfig {
    /// 기본 URL만 지정합니다.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// reqwest 기반 조회 클라이언트.
#[derive(Debug, Clone)]
pub struct HttpFetchClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetchClient {
    /// 새 클라이언트를 생성합니다.
    pub fn new(config: &SourceConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Permanent(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, instrument: &Instrument, dataset: DatasetKind) -> String {
        format!("{}/{}/{}", self.base_url, dataset.as_str(), instrument.web_id)
    }
}

/// 응답을 받아 본문을 반환합니다. 실패 상태 코드는 분류해서 돌려줍니다.
async fn send(request: reqwest::RequestBuilder) -> FetchResult<String> {
    let response = request.send().await.map_err(classify)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::from_status(status.as_u16(), body));
    }

    response.text().await.map_err(classify)
}

fn classify(err: reqwest::Error) -> FetchError {
    if let Some(status) = err.status() {
        return FetchError::from_status(status.as_u16(), err.to_string());
    }
    if err.is_decode() || err.is_builder() {
        FetchError::Permanent(err.to_string())
    } else {
        // 타임아웃, 연결 실패, 요청 중 끊김
        FetchError::Transient(err.to_string())
    }
}

fn decode(dataset: DatasetKind, body: &str) -> FetchResult<Vec<Record>> {
    let malformed = |e: serde_json::Error| FetchError::Permanent(format!("malformed payload: {}", e));
    let records = match dataset {
        DatasetKind::Prices => serde_json::from_str::<Vec<PriceBar>>(body)
            .map_err(malformed)?
            .into_iter()
            .map(Record::Price)
            .collect(),
        DatasetKind::InvestorFlows => serde_json::from_str::<Vec<InvestorFlow>>(body)
            .map_err(malformed)?
            .into_iter()
            .map(Record::InvestorFlow)
            .collect(),
        DatasetKind::IndexLevels => serde_json::from_str::<Vec<IndexLevel>>(body)
            .map_err(malformed)?
            .into_iter()
            .map(Record::IndexLevel)
            .collect(),
        DatasetKind::SectorIndexLevels => serde_json::from_str::<Vec<IndexLevel>>(body)
            .map_err(malformed)?
            .into_iter()
            .map(Record::SectorIndexLevel)
            .collect(),
    };
    Ok(records)
}

#[async_trait]
impl FetchClient for HttpFetchClient {
    async fn fetch(
        &self,
        instrument: &Instrument,
        dataset: DatasetKind,
        range: DateRange,
    ) -> FetchResult<Vec<Record>> {
        let url = self.url(instrument, dataset);
        let from = range.start.format("%Y-%m-%d").to_string();
        let to = range.end.format("%Y-%m-%d").to_string();

        let body = send(
            self.client
                .get(&url)
                .query(&[("from", from.as_str()), ("to", to.as_str())]),
        )
        .await?;
        let records = decode(dataset, &body)?;

        debug!(
            url = %url,
            instrument = %instrument,
            range = %range,
            records = records.len(),
            "원격 조회 완료"
        );
        Ok(records)
    }

    async fn list_universe(&self, universe: Universe) -> FetchResult<Vec<UniverseEntry>> {
        let url = format!("{}/universe/{}", self.base_url, universe.as_str());
        let body = send(self.client.get(&url)).await?;
        let entries: Vec<UniverseEntry> = serde_json::from_str(&body)
            .map_err(|e| FetchError::Permanent(format!("malformed universe payload: {}", e)))?;

        debug!(url = %url, entries = entries.len(), "유니버스 목록 조회 완료");
        Ok(entries)
    }
}
