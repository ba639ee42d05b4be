//! 과거 캔들 수집 모듈.
//!
//! API에서 페이지 단위로 캔들을 받아 `instrument.granularity` 컬렉션에
//! 시간 기준으로 덮어씁니다. 여러 종목/주기는 워커 풀로 병렬 처리합니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use market_core::{collection_key, market_span, Granularity, Instrument, Record};
use market_data::{
    DatasetSource, DocumentStore, HistoryQuery, HistorySource, OandaClient, PaginatedFetcher,
    Result as DataResult, WorkerPool,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn, Instrument as _};

use crate::{CollectionStats, CollectorConfig, Result};

/// 주요 통화쌍
pub const MAIN_CURRENCIES: [&str; 6] = [
    "EUR_USD", "AUD_USD", "NZD_USD", "GBP_USD", "USD_CAD", "USD_JPY",
];

/// 기본 수집 주기
pub const DEFAULT_GRANULARITIES: [Granularity; 6] = [
    Granularity::M15,
    Granularity::M30,
    Granularity::H1,
    Granularity::H4,
    Granularity::D,
    Granularity::M,
];

/// `save_main`의 기본 시작 시점 (2010-01-01 UTC)
pub fn default_main_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// 종목/주기 하나의 수집 작업.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTask {
    pub instrument: Instrument,
    pub granularity: Granularity,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub include_first: Option<bool>,
}

impl HistoryTask {
    pub fn new(instrument: Instrument, granularity: Granularity) -> Self {
        Self {
            instrument,
            granularity,
            start: None,
            end: None,
            include_first: None,
        }
    }

    pub fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_include_first(mut self, include_first: bool) -> Self {
        self.include_first = Some(include_first);
        self
    }

    /// 저장 컬렉션 이름
    pub fn collection(&self) -> String {
        collection_key(&self.instrument, self.granularity)
    }

    fn query(&self) -> HistoryQuery {
        let mut query = HistoryQuery::new(self.instrument.clone(), self.granularity);
        query.start = self.start;
        query.end = self.end;
        query.include_first = self.include_first;
        query
    }
}

/// 저장 결과 요약.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaveSummary {
    /// 첫 캔들 시간
    pub first: Option<DateTime<Utc>>,
    /// 마지막 캔들 시간
    pub last: Option<DateTime<Utc>>,
    /// 저장한 캔들 수
    pub count: usize,
}

impl SaveSummary {
    pub(crate) fn from_records(records: &[Record]) -> Self {
        Self {
            first: records.first().map(|r| r.datetime),
            last: records.last().map(|r| r.datetime),
            count: records.len(),
        }
    }
}

/// 과거 캔들 수집기.
///
/// 워커들이 복제본을 나눠 가지며 저장소 클라이언트를 공유합니다.
#[derive(Clone)]
pub struct HistoryCollector {
    fetcher: Arc<PaginatedFetcher>,
    datasets: Option<Arc<dyn DatasetSource>>,
    store: Arc<dyn DocumentStore>,
    db: Option<String>,
    workers: usize,
}

impl HistoryCollector {
    /// 기본 페이지 설정으로 생성
    pub fn new(source: Arc<dyn HistorySource>, store: Arc<dyn DocumentStore>) -> Self {
        Self::with_fetcher(PaginatedFetcher::new(source), store)
    }

    /// 페이지 조회기를 지정해 생성
    pub fn with_fetcher(fetcher: PaginatedFetcher, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            datasets: None,
            store,
            db: None,
            workers: 5,
        }
    }

    /// 설정과 OANDA 클라이언트로 생성 (캔들과 보조 데이터셋 모두 사용)
    pub fn from_config(
        config: &CollectorConfig,
        client: Arc<OandaClient>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self::with_fetcher(config.fetcher(client.clone()), store)
            .with_datasets(client)
            .with_db(config.db())
            .with_workers(config.workers)
    }

    /// 보조 데이터셋 소스 설정
    pub fn with_datasets(mut self, source: Arc<dyn DatasetSource>) -> Self {
        self.datasets = Some(source);
        self
    }

    pub fn with_db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) fn db(&self) -> Option<&str> {
        self.db.as_deref()
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }

    pub(crate) fn datasets(&self) -> Option<&Arc<dyn DatasetSource>> {
        self.datasets.as_ref()
    }

    /// 작업 하나를 수집해 저장합니다.
    ///
    /// 받은 캔들이 없으면 아무것도 쓰지 않고 `count = 0`을 반환합니다.
    #[instrument(skip(self), fields(collection = %task.collection()))]
    pub async fn save_history(&self, task: &HistoryTask) -> DataResult<SaveSummary> {
        let records = self.fetcher.fetch(&task.query()).await?;
        if records.is_empty() {
            debug!("수집된 캔들 없음");
            return Ok(SaveSummary::default());
        }
        let summary = SaveSummary::from_records(&records);

        self.store
            .inplace(&records, &task.collection(), self.db.as_deref())
            .await?;

        info!(
            count = summary.count,
            first = ?summary.first,
            last = ?summary.last,
            "캔들 저장 완료"
        );
        Ok(summary)
    }

    /// 종목 × 주기 전체를 수집합니다.
    ///
    /// 조합이 하나면 바로 실행하고 에러를 그대로 반환합니다. 여러 개면 워커
    /// 풀로 실행하며 실패한 작업은 통계에 기록됩니다.
    pub async fn save_many(
        &self,
        instruments: &[Instrument],
        granularities: &[Granularity],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<CollectionStats> {
        let started = Instant::now();
        let tasks: Vec<HistoryTask> = instruments
            .iter()
            .flat_map(|instrument| {
                granularities.iter().map(move |&granularity| {
                    HistoryTask::new(instrument.clone(), granularity).with_range(start, end)
                })
            })
            .collect();

        match tasks.len() {
            0 => {
                warn!("수집할 종목/주기가 없습니다");
                Ok(CollectionStats::new())
            }
            1 => {
                let summary = self.save_history(&tasks[0]).await?;
                let mut stats = CollectionStats::new();
                stats.record_success(summary.count);
                stats.elapsed = started.elapsed();
                Ok(stats)
            }
            count => {
                info!(tasks = count, workers = self.workers, "과거 캔들 수집 시작");
                let mut pool = WorkerPool::new(self.workers);
                for task in tasks {
                    pool.put(task)?;
                }

                let collector = self.clone();
                pool.start(move |task: HistoryTask| {
                    let collector = collector.clone();
                    let span = market_span!("save_task", task.instrument, task.granularity);
                    async move { collector.save_history(&task).await.map(|s| s.count) }
                        .instrument(span)
                })?;
                pool.stop();
                let report = pool.join().await;

                Ok(CollectionStats::from_report(report, started.elapsed()))
            }
        }
    }

    /// 주요 통화쌍 × 기본 주기를 수집합니다.
    pub async fn save_main(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<CollectionStats> {
        let instruments: Vec<Instrument> =
            MAIN_CURRENCIES.iter().copied().map(Instrument::from).collect();
        let start = start.unwrap_or_else(default_main_start);

        self.save_many(&instruments, &DEFAULT_GRANULARITIES, Some(start), end)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{day, DailySource};
    use market_data::{DataError, MemoryStore};

    fn collector(source: Arc<DailySource>) -> (HistoryCollector, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("oanda"));
        let collector = HistoryCollector::new(source, store.clone()).with_workers(3);
        (collector, store)
    }

    #[tokio::test]
    async fn test_save_history_writes_collection() {
        let source = Arc::new(DailySource::new(30));
        let (collector, store) = collector(source);

        let task = HistoryTask::new(Instrument::from("EUR_USD"), Granularity::D)
            .with_range(Some(day(5)), Some(day(9)));
        let summary = collector.save_history(&task).await.unwrap();

        assert_eq!(summary.count, 5);
        assert_eq!(summary.first, Some(day(5)));
        assert_eq!(summary.last, Some(day(9)));
        assert_eq!(store.count("EUR_USD.D", None).await, 5);
    }

    #[tokio::test]
    async fn test_save_history_is_idempotent() {
        let source = Arc::new(DailySource::new(10));
        let (collector, store) = collector(source);

        let task = HistoryTask::new(Instrument::from("EUR_USD"), Granularity::D)
            .with_range(Some(day(0)), Some(day(9)));
        collector.save_history(&task).await.unwrap();
        collector.save_history(&task).await.unwrap();

        assert_eq!(store.count("EUR_USD.D", None).await, 10);
    }

    #[tokio::test]
    async fn test_empty_fetch_writes_nothing() {
        let source = Arc::new(DailySource::new(10));
        let (collector, store) = collector(source);

        let task = HistoryTask::new(Instrument::from("EUR_USD"), Granularity::D)
            .with_range(Some(day(50)), Some(day(60)));
        let summary = collector.save_history(&task).await.unwrap();

        assert_eq!(summary, SaveSummary::default());
        assert!(store.table_names(None).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_save_many_cross_product() {
        let source = Arc::new(DailySource::new(20));
        let (collector, store) = collector(source.clone());

        let instruments = vec![Instrument::from("EUR_USD"), Instrument::from("USD_JPY")];
        let granularities = vec![Granularity::H4, Granularity::D];
        let stats = collector
            .save_many(&instruments, &granularities, Some(day(0)), Some(day(9)))
            .await
            .unwrap();

        assert_eq!(stats.total, 4);
        assert_eq!(stats.success, 4);
        assert_eq!(stats.total_candles, 40);
        assert_eq!(
            store.table_names(None).await.unwrap(),
            vec!["EUR_USD.D", "EUR_USD.H4", "USD_JPY.D", "USD_JPY.H4"]
        );
        // 작업당 한 번씩 호출
        assert_eq!(source.call_count(), 4);
    }

    #[tokio::test]
    async fn test_save_many_failures_reported() {
        let source = Arc::new(DailySource::new(20).failing_for("USD_JPY"));
        let (collector, store) = collector(source);

        let instruments = vec![Instrument::from("EUR_USD"), Instrument::from("USD_JPY")];
        let stats = collector
            .save_many(&instruments, &[Granularity::D], Some(day(0)), Some(day(4)))
            .await
            .unwrap();

        assert_eq!(stats.success, 1);
        assert_eq!(stats.errors, 1);
        assert!(stats.failures[0].0.contains("USD_JPY"));
        assert_eq!(store.count("EUR_USD.D", None).await, 5);
    }

    #[tokio::test]
    async fn test_single_pair_runs_inline() {
        let source = Arc::new(DailySource::new(20).failing_for("USD_JPY"));
        let (collector, _store) = collector(source);

        let err = collector
            .save_many(&[Instrument::from("USD_JPY")], &[Granularity::D], Some(day(0)), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::CollectorError::Data(DataError::Api(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_save_main_covers_major_pairs() {
        let source = Arc::new(DailySource::new(3));
        let (collector, store) = collector(source);

        let stats = collector.save_main(Some(day(0)), None).await.unwrap();

        assert_eq!(stats.total, 36);
        assert_eq!(stats.errors, 0);
        let names = store.table_names(None).await.unwrap();
        assert_eq!(names.len(), 36);
        assert!(names.contains(&"USD_CAD.M".to_string()));
    }
}
