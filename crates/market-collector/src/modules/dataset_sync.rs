//! 보조 데이터셋(HPR, CLD, COT) 수집 모듈.
//!
//! 데이터셋은 최근 `period`초 구간을 한 번에 받아 `instrument.{HPR|CLD|COT}`
//! 컬렉션에 시간 기준으로 덮어씁니다. 페이지 나눔은 없습니다.

use std::time::Instant;

use market_core::{
    dataset_collection_key, market_span, Dataset, Instrument, DEFAULT_DATASET_PERIOD,
};
use market_data::{DataError, Result as DataResult, WorkerPool};
use tracing::{debug, info, instrument, warn, Instrument as _};

use super::history_sync::{HistoryCollector, SaveSummary};
use crate::{CollectionStats, Result};

/// 데이터셋 하나의 수집 작업.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetTask {
    pub instrument: Instrument,
    pub dataset: Dataset,
    pub period: Option<u64>,
}

impl HistoryCollector {
    /// 데이터셋을 받아 저장합니다.
    ///
    /// `period`가 없으면 1년입니다. 받은 레코드가 없으면 아무것도 쓰지 않습니다.
    #[instrument(skip_all, fields(instrument = %instrument, dataset = %dataset))]
    pub async fn save(
        &self,
        dataset: Dataset,
        instrument: &Instrument,
        period: Option<u64>,
    ) -> DataResult<SaveSummary> {
        let source = self.datasets().ok_or_else(|| {
            DataError::ConfigError("dataset source is not configured".to_string())
        })?;

        let period = period.unwrap_or(DEFAULT_DATASET_PERIOD);
        let records = source.get_dataset(dataset, instrument, period).await?;
        if records.is_empty() {
            debug!("수집된 데이터 없음");
            return Ok(SaveSummary::default());
        }

        let collection = dataset_collection_key(instrument, dataset);
        self.store()
            .inplace(&records, &collection, self.db())
            .await?;

        let summary = SaveSummary::from_records(&records);
        info!(collection = %collection, count = summary.count, "데이터셋 저장 완료");
        Ok(summary)
    }

    /// 종목 × 데이터셋 전체를 수집합니다. 실패한 작업은 통계에 기록됩니다.
    pub async fn save_datasets(
        &self,
        instruments: &[Instrument],
        datasets: &[Dataset],
        period: Option<u64>,
    ) -> Result<CollectionStats> {
        let started = Instant::now();
        let tasks: Vec<DatasetTask> = instruments
            .iter()
            .flat_map(|instrument| {
                datasets.iter().map(move |&dataset| DatasetTask {
                    instrument: instrument.clone(),
                    dataset,
                    period,
                })
            })
            .collect();

        if tasks.is_empty() {
            warn!("수집할 종목/데이터셋이 없습니다");
            return Ok(CollectionStats::new());
        }

        info!(tasks = tasks.len(), workers = self.workers(), "데이터셋 수집 시작");
        let mut pool = WorkerPool::new(self.workers());
        for task in tasks {
            pool.put(task)?;
        }

        let collector = self.clone();
        pool.start(move |task: DatasetTask| {
            let collector = collector.clone();
            let span = market_span!("dataset_task", task.instrument, task.dataset);
            async move {
                collector
                    .save(task.dataset, &task.instrument, task.period)
                    .await
                    .map(|s| s.count)
            }
            .instrument(span)
        })?;
        pool.stop();
        let report = pool.join().await;

        Ok(CollectionStats::from_report(report, started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{day, DailySource};
    use market_data::{DocumentStore, MemoryStore, ReadRequest};
    use std::sync::Arc;

    fn collector(source: Arc<DailySource>) -> (HistoryCollector, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("oanda"));
        let collector = HistoryCollector::new(source.clone(), store.clone())
            .with_datasets(source)
            .with_workers(2);
        (collector, store)
    }

    #[tokio::test]
    async fn test_save_dataset_writes_collection() {
        let source = Arc::new(DailySource::new(6));
        let (collector, store) = collector(source.clone());

        let summary = collector
            .save(Dataset::PositionRatios, &Instrument::from("EUR_USD"), None)
            .await
            .unwrap();

        assert_eq!(summary.count, 6);
        assert_eq!(summary.first, Some(day(0)));
        assert_eq!(store.count("EUR_USD.HPR", None).await, 6);
        assert_eq!(
            source.last_dataset_query(),
            Some((Dataset::PositionRatios, Instrument::from("EUR_USD"), DEFAULT_DATASET_PERIOD))
        );

        // 같은 구간을 다시 받아도 중복 없음
        collector
            .save(Dataset::PositionRatios, &Instrument::from("EUR_USD"), Some(86_400))
            .await
            .unwrap();
        assert_eq!(store.count("EUR_USD.HPR", None).await, 6);

        let records = store
            .read_records(&ReadRequest::new("EUR_USD.HPR").with_limit(Some(1)))
            .await
            .unwrap();
        assert!(records[0].get("long_position_ratio").is_some());
    }

    #[tokio::test]
    async fn test_save_dataset_without_source() {
        let source = Arc::new(DailySource::new(6));
        let store = Arc::new(MemoryStore::new("oanda"));
        let collector = HistoryCollector::new(source, store);

        let err = collector
            .save(Dataset::Calendar, &Instrument::from("EUR_USD"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::ConfigError(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_save_datasets_reports_failures() {
        let source = Arc::new(DailySource::new(4).failing_for("USD_JPY"));
        let (collector, store) = collector(source);

        let instruments = vec![Instrument::from("EUR_USD"), Instrument::from("USD_JPY")];
        let stats = collector
            .save_datasets(&instruments, &[Dataset::Calendar, Dataset::CommitmentsOfTraders], None)
            .await
            .unwrap();

        assert_eq!(stats.total, 4);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.errors, 2);
        assert_eq!(store.count("EUR_USD.CLD", None).await, 4);
        assert_eq!(store.count("EUR_USD.COT", None).await, 4);
    }
}
