//! Standalone ingestion collector CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ingest_collector::{CollectorConfig, IngestEngine, RunSummary};
use ingest_core::logging::{init_logging, LogConfig, LogFormat};
use ingest_core::{DatasetKind, Universe};
use ingest_data::{DatabaseConfig, HttpFetchClient, PgIngestStore, SourceConfig};

#[derive(Parser)]
#[command(name = "ingest-collector")]
#[command(about = "Incremental Market Data Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 엔진 설정 파일 (TOML). `INGEST_*` 환경변수가 파일 값을 덮어씀
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, default_value = "pretty", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// 빠진 구간을 한 번 수집
    RunOnce {
        /// 수집할 데이터셋 (쉼표로 구분, 예: "prices,index_levels")
        #[arg(long, value_delimiter = ',')]
        datasets: Vec<DatasetKind>,

        /// 수집 목표일 (YYYY-MM-DD, 기본: 오늘)
        #[arg(long)]
        target_date: Option<NaiveDate>,
    },

    /// 데몬 모드: 주기적으로 수집
    Daemon {
        /// 수집할 데이터셋 (쉼표로 구분)
        #[arg(long, value_delimiter = ',')]
        datasets: Vec<DatasetKind>,

        /// 실행 주기 (초, 기본: 설정값)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// 데이터셋을 비우고 처음부터 다시 수집 (파괴적)
    Rebuild {
        /// 대상 데이터셋
        dataset: DatasetKind,

        /// 삭제 확인
        #[arg(long)]
        yes: bool,
    },

    /// 원격 종목 목록으로 유니버스 동기화 (신규 등록, 빠진 종목 비활성화)
    SyncUniverse {
        /// 대상 유니버스 (쉼표로 구분, 기본: 전체)
        #[arg(long, value_delimiter = ',')]
        universes: Vec<Universe>,
    },

    /// 데이터셋의 커서 목록 출력
    Cursors {
        /// 대상 데이터셋
        dataset: DatasetKind,
    },

    /// 데이터베이스 마이그레이션 실행
    Migrate,
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(summary: &RunSummary, operation: &str) -> anyhow::Result<()> {
    summary.log_summary(operation);
    print_json(summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    init_logging(
        LogConfig::new(format!(
            "ingest_collector={level},ingest_data={level}",
            level = cli.log_level
        ))
        .with_format(cli.log_format),
    )
    .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("Ingest Collector 시작");

    // 설정 로드
    let config = CollectorConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("설정 로드 실패: {}", path.display()),
        None => "설정 로드 실패".to_string(),
    })?;
    tracing::debug!(database_url = %config.database_url, "설정 로드 완료");

    // DB 연결
    let store = Arc::new(PgIngestStore::connect(&DatabaseConfig::new(&config.database_url)).await?);
    tracing::info!("데이터베이스 연결 성공");

    if let Commands::Migrate = cli.command {
        store.migrate().await?;
        tracing::info!("마이그레이션 완료");
        store.close().await;
        return Ok(());
    }

    let client = Arc::new(HttpFetchClient::new(&SourceConfig {
        timeout_secs: config.ingest.request_timeout_secs,
        ..SourceConfig::new(&config.source_base_url)
    })?);
    let engine = IngestEngine::new(store.clone(), client, config.ingest.clone())?;

    // 명령 실행
    match cli.command {
        Commands::RunOnce {
            datasets,
            target_date,
        } => {
            let summary = engine.run_once(&datasets, target_date).await?;
            report(&summary, "단일 수집")?;
        }
        Commands::Daemon {
            datasets,
            interval_secs,
        } => {
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| engine.config().continuous_interval());
            tracing::info!("=== 데몬 모드 시작 (주기: {}초) ===", interval.as_secs());

            let handle = engine.run_continuous(datasets, interval);
            tokio::signal::ctrl_c().await?;
            tracing::info!("종료 신호 수신, 진행 중인 실행 완료 후 종료합니다...");

            let runner_report = handle.shutdown().await?;
            print_json(&runner_report)?;
        }
        Commands::Rebuild { dataset, yes } => {
            tracing::warn!(dataset = %dataset, "데이터셋 재구축 요청");
            let summary = engine.rebuild(dataset, yes).await?;
            report(&summary, "재구축")?;
        }
        Commands::SyncUniverse { universes } => {
            let reports = engine.sync_universe(&universes).await?;
            for r in &reports {
                tracing::info!(
                    universe = %r.universe,
                    fetched = r.fetched,
                    inserted = r.inserted,
                    updated = r.updated,
                    deactivated = r.deactivated,
                    "유니버스 동기화 결과"
                );
            }
            print_json(&reports)?;
        }
        Commands::Cursors { dataset } => {
            let cursors = engine.list_cursors(dataset).await?;
            let mut rows: Vec<_> = cursors.into_iter().collect();
            rows.sort();
            print_json(&rows)?;
        }
        Commands::Migrate => {}
    }

    store.close().await;
    tracing::info!("Ingest Collector 종료");

    Ok(())
}
