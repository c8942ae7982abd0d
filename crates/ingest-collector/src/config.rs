//! 수집 엔진 설정.
//!
//! 엔진은 전역 상태를 읽지 않고 생성 시 전달받은 `IngestConfig`만 사용합니다.
//! 설정은 `IngestConfig::load` 하나로 만들며 기본값, TOML 파일, `INGEST_*`
//! 환경변수 순서로 덮어씁니다.

use chrono::NaiveDate;
use chrono_tz::Tz;
use ingest_core::DatasetKind;
use serde::{Deserialize, Serialize};
use config::builder::DefaultState;
use config::ConfigBuilder;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::CollectorError;
use crate::Result;

/// 엔진 설정 환경변수 접두사
const ENV_PREFIX: &str = "INGEST";

/// 허용하는 최소 초당 요청 수 (1000초에 1회)
pub const MIN_RATE_PER_SECOND: f64 = 0.001;

/// 허용하는 최대 작업 단위 일 수 (약 100년)
pub const MAX_CHUNK_DAYS: u32 = 36_600;

/// 엔진 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 작업 단위 하나가 담는 최대 일 수
    pub max_chunk_days: u32,
    /// 동시에 처리하는 최대 작업 단위 수
    pub concurrency: usize,
    /// 초당 원격 요청 수 (전체 워커 공유)
    pub rate_limit_per_second: f64,
    /// 순간 허용 요청 수 (1이면 고정 간격)
    pub rate_limit_burst: u32,
    /// 일시적 에러에 대한 최대 시도 횟수 (첫 시도 포함)
    pub retry_max_attempts: u32,
    /// 백오프 기본 지연 (밀리초)
    pub backoff_base_delay_ms: u64,
    /// 백오프 최대 지연 (밀리초)
    pub backoff_max_delay_ms: u64,
    /// 백오프 지연에 ±25% 지터 적용
    pub backoff_jitter: bool,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 종목별 연속 실패 허용 횟수 (0이면 서킷 브레이커 비활성)
    pub circuit_breaker_threshold: u32,
    /// 트랜잭션당 최대 레코드 수
    pub persist_batch_size: usize,
    /// 연속 실행 주기 (초)
    pub continuous_interval_secs: u64,
    /// 상장일을 모르는 종목의 수집 시작일
    pub default_listing_date: NaiveDate,
    /// "오늘"을 계산할 시장 시간대
    pub market_timezone: String,
    /// 기본 수집 대상 데이터셋
    pub datasets: Vec<DatasetKind>,
    /// 실행마다 계획 전에 원격 종목 목록으로 유니버스를 동기화
    pub refresh_universe: bool,
}

fn default_listing_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2001, 3, 25).unwrap_or(NaiveDate::MIN)
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chunk_days: 90,
            concurrency: 8,
            rate_limit_per_second: 5.0,
            rate_limit_burst: 1,
            retry_max_attempts: 3,
            backoff_base_delay_ms: 1_000,
            backoff_max_delay_ms: 30_000,
            backoff_jitter: true,
            request_timeout_secs: 30,
            circuit_breaker_threshold: 3,
            persist_batch_size: 100,
            continuous_interval_secs: 24 * 60 * 60,
            default_listing_date: default_listing_date(),
            market_timezone: "Asia/Tehran".to_string(),
            datasets: DatasetKind::ALL.to_vec(),
            refresh_universe: true,
        }
    }
}

impl IngestConfig {
    /// 설정을 로드합니다.
    ///
    /// 기본값 위에 TOML 파일(있으면), 그 위에 `INGEST_*` 환경변수를 덮어씁니다.
    /// `.env` 파일이 있으면 먼저 읽습니다. 예: `INGEST_MAX_CHUNK_DAYS=30`,
    /// `INGEST_DATASETS=prices,index_levels`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_sources(path, None)
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경변수 무시).
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        Self::build(builder, Some(HashMap::new()))
    }

    /// `env`가 `None`이면 프로세스 환경변수를 사용합니다.
    fn from_sources(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        Self::build(builder, env)
    }

    fn build(
        builder: ConfigBuilder<DefaultState>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("datasets")
                    .source(env),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(CollectorError::Config(msg.to_string()));

        if self.max_chunk_days == 0 || self.max_chunk_days > MAX_CHUNK_DAYS {
            return Err(CollectorError::Config(format!(
                "max_chunk_days must be between 1 and {}",
                MAX_CHUNK_DAYS
            )));
        }
        if self.concurrency == 0 {
            return fail("concurrency must be at least 1");
        }
        if !(self.rate_limit_per_second.is_finite()
            && self.rate_limit_per_second >= MIN_RATE_PER_SECOND)
        {
            return Err(CollectorError::Config(format!(
                "rate_limit_per_second must be a finite value of at least {}",
                MIN_RATE_PER_SECOND
            )));
        }
        if self.rate_limit_burst == 0 {
            return fail("rate_limit_burst must be at least 1");
        }
        if self.retry_max_attempts == 0 {
            return fail("retry_max_attempts must be at least 1");
        }
        if self.persist_batch_size == 0 {
            return fail("persist_batch_size must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            return fail("request_timeout_secs must be at least 1");
        }
        self.timezone()?;
        Ok(())
    }

    /// 시장 시간대.
    pub fn timezone(&self) -> Result<Tz> {
        self.market_timezone
            .parse::<Tz>()
            .map_err(|e| CollectorError::Config(format!("market_timezone: {}", e)))
    }

    /// 백오프 기본 지연.
    pub fn backoff_base_delay(&self) -> Duration {
        Duration::from_millis(self.backoff_base_delay_ms)
    }

    /// 백오프 최대 지연.
    pub fn backoff_max_delay(&self) -> Duration {
        Duration::from_millis(self.backoff_max_delay_ms)
    }

    /// 요청 타임아웃.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 연속 실행 주기.
    pub fn continuous_interval(&self) -> Duration {
        Duration::from_secs(self.continuous_interval_secs)
    }
}

/// 바이너리 실행 설정 (엔진 설정 + 협력자 연결 정보).
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 원격 데이터 게이트웨이 URL
    pub source_base_url: String,
    /// 엔진 설정
    pub ingest: IngestConfig,
}

impl CollectorConfig {
    /// 설정 파일(선택)과 환경변수에서 설정 로드.
    ///
    /// `DATABASE_URL`과 `SOURCE_BASE_URL`은 환경변수로만 받습니다.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let ingest = IngestConfig::load(path)?;

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;
        let source_base_url = std::env::var("SOURCE_BASE_URL").map_err(|_| {
            CollectorError::Config("SOURCE_BASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        Ok(Self {
            database_url,
            source_base_url,
            ingest,
        })
    }
}
