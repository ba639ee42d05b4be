//! 증분 업데이트 모듈.
//!
//! 캔들 컬렉션은 마지막 캔들 이후만 받아 저장합니다. 보조 데이터셋
//! 컬렉션(`instrument.HPR` 등)은 기본 기간을 다시 받아 덮어씁니다.

use std::time::Instant;

use market_core::{parse_collection_key, CollectionKind};
use market_data::{DataError, ReadRequest, Result as DataResult, WorkerPool};
use tracing::{info, instrument, warn};

use super::history_sync::{HistoryCollector, HistoryTask, SaveSummary};
use crate::{CollectionStats, Result};

/// 컬렉션 하나의 업데이트 작업.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTask {
    pub collection: String,
}

impl HistoryCollector {
    /// 컬렉션을 갱신합니다.
    ///
    /// 컬렉션이 없거나 비어 있으면 `MissingCollection`입니다.
    #[instrument(skip(self))]
    pub async fn update(&self, collection: &str) -> DataResult<SaveSummary> {
        let kind = parse_collection_key(collection)?;

        let request = ReadRequest::new(collection)
            .with_db(self.db().map(str::to_string))
            .with_limit(Some(1));
        let last = self
            .store()
            .read_records(&request)
            .await?
            .pop()
            .ok_or_else(|| DataError::MissingCollection(collection.to_string()))?;

        match kind {
            CollectionKind::Candles(instrument, granularity) => {
                let task = HistoryTask::new(instrument, granularity)
                    .with_range(Some(last.datetime), None)
                    .with_include_first(false);
                self.save_history(&task).await
            }
            CollectionKind::Dataset(instrument, dataset) => {
                self.save(dataset, &instrument, None).await
            }
        }
    }

    /// 여러 컬렉션을 갱신합니다.
    ///
    /// 목록이 비어 있으면 db의 모든 컬렉션이 대상입니다.
    pub async fn update_many(&self, collections: &[String]) -> Result<CollectionStats> {
        let started = Instant::now();
        let collections = if collections.is_empty() {
            self.store().table_names(self.db()).await?
        } else {
            collections.to_vec()
        };

        if collections.is_empty() {
            warn!("업데이트할 컬렉션이 없습니다");
            return Ok(CollectionStats::new());
        }

        info!(collections = collections.len(), workers = self.workers(), "업데이트 시작");
        let mut pool = WorkerPool::new(self.workers());
        for collection in collections {
            pool.put(UpdateTask { collection })?;
        }

        let collector = self.clone();
        pool.start(move |task: UpdateTask| {
            let collector = collector.clone();
            async move { collector.update(&task.collection).await.map(|s| s.count) }
        })?;
        pool.stop();
        let report = pool.join().await;

        Ok(CollectionStats::from_report(report, started.elapsed()))
    }
}
