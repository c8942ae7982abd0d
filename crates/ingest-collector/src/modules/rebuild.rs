//! 데이터셋 재구축.
//!
//! 데이터셋의 모든 레코드와 커서를 삭제합니다. 삭제 후의 전체 재수집은
//! `IngestEngine::rebuild`가 빈 커서 상태에서 계획을 다시 세워 수행합니다.
//!
//! 재구축은 중간에 재개할 수 없습니다. 도중에 중단되면 데이터셋이 일부만
//! 채워진 상태로 남으므로 처음부터 다시 실행해야 합니다.

use ingest_core::DatasetKind;
use ingest_data::{DeleteStats, IngestStore};
use tracing::warn;

use crate::error::CollectorError;
use crate::Result;

/// 확인 후 데이터셋을 비웁니다.
///
/// `confirmed`가 `false`이면 아무것도 삭제하지 않고 `ConfirmationRequired`를 반환합니다.
pub async fn reset_dataset(
    store: &dyn IngestStore,
    dataset: DatasetKind,
    confirmed: bool,
) -> Result<DeleteStats> {
    if !confirmed {
        return Err(CollectorError::ConfirmationRequired(dataset.to_string()));
    }

    let stats = store.delete_dataset(dataset).await?;
    warn!(
        dataset = %dataset,
        records = stats.records,
        cursors = stats.cursors,
        "데이터셋 삭제 완료"
    );
    Ok(stats)
}
