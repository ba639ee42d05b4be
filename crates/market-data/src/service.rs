//! 시장 데이터 조회 서비스.
//!
//! 캐시를 먼저 조회하고 미스이면 저장소에서 읽습니다. 저장소 조회의 끝 시간은
//! `as_of`로 제한되므로 같은 요청에 대해 캐시와 저장소가 같은 결과를 냅니다.
//!
//! ```rust,ignore
//! let service = MarketDataService::new(store, mappers).with_as_of(now);
//! service.init(&instruments, Granularity::D, Some(start), None, None).await?;
//!
//! let panel = service
//!     .history(HistoryRequest::new().with_length(20).with_fields(["close"]))
//!     .await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use market_core::{collection_key, Granularity, Instrument, MultiTable, Row, DEFAULT_FIELDS};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheEntry, WindowCache};
use crate::error::{DataError, Result};
use crate::fallback::{default_fields, FieldMappers, StoreReader};
use crate::storage::DocumentStore;

/// 윈도우 조회 요청.
///
/// 비어 있는 항목은 마지막 `init`의 값(주기, 종목, db)을 사용합니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryRequest {
    pub instruments: Option<Vec<Instrument>>,
    pub frequency: Option<Granularity>,
    pub fields: Option<Vec<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub length: Option<usize>,
    pub db: Option<String>,
}

impl HistoryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instruments(mut self, instruments: Vec<Instrument>) -> Self {
        self.instruments = Some(instruments);
        self
    }

    pub fn with_frequency(mut self, frequency: Granularity) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }
}

#[derive(Debug)]
struct ServiceState {
    as_of: DateTime<Utc>,
    frequency: Option<Granularity>,
    db: Option<String>,
}

/// 캐시 + 저장소 조회 서비스.
pub struct MarketDataService {
    cache: WindowCache,
    reader: StoreReader,
    state: RwLock<ServiceState>,
}

impl MarketDataService {
    /// 새 서비스를 생성합니다. 기준 시각은 생성 시각입니다.
    pub fn new(store: Arc<dyn DocumentStore>, mappers: FieldMappers) -> Self {
        Self {
            cache: WindowCache::new(),
            reader: StoreReader::new(store, mappers),
            state: RwLock::new(ServiceState {
                as_of: Utc::now(),
                frequency: None,
                db: None,
            }),
        }
    }

    /// 기준 시각을 설정합니다.
    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.state.get_mut().as_of = as_of;
        self
    }

    /// 기준 시각을 변경합니다 (백테스트 등에서 시간을 진행할 때).
    pub async fn set_as_of(&self, as_of: DateTime<Utc>) {
        self.state.write().await.as_of = as_of;
    }

    /// 현재 기준 시각.
    pub async fn as_of(&self) -> DateTime<Utc> {
        self.state.read().await.as_of
    }

    /// 캐시.
    pub fn cache(&self) -> &WindowCache {
        &self.cache
    }

    /// 저장소 구간을 읽어 주기의 캐시 스냅샷을 교체합니다.
    ///
    /// 주기와 db는 이후 조회의 기본값이 됩니다.
    #[instrument(skip(self, instruments), fields(count = instruments.len()))]
    pub async fn init(
        &self,
        instruments: &[Instrument],
        frequency: Granularity,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        db: Option<&str>,
    ) -> Result<Arc<CacheEntry>> {
        let db = db
            .unwrap_or_else(|| self.reader.store().default_db())
            .to_string();
        let as_of = self.as_of().await;

        let panel = self
            .reader
            .read(instruments, frequency, &default_fields(), start, end, None, Some(&db))
            .await?;

        // 끝을 지정하지 않으면 지금까지 저장된 전부를 읽은 것
        let loaded_end = end.unwrap_or_else(|| Utc::now().max(as_of));
        let entry = CacheEntry::new(panel, db.clone(), start, loaded_end)?;
        let entry = self.cache.install(entry).await;

        {
            let mut state = self.state.write().await;
            state.frequency = Some(frequency);
            state.db = Some(db);
        }

        info!(
            frequency = %frequency,
            instruments = entry.instruments().len(),
            bars = entry.axis().len(),
            "캐시 초기화 완료"
        );
        Ok(entry)
    }

    /// 기준 시각의 종목별 마지막 봉.
    ///
    /// 종목을 지정하지 않으면 캐시된 종목 전체입니다.
    pub async fn current(
        &self,
        instruments: Option<&[Instrument]>,
    ) -> Result<BTreeMap<Instrument, Row>> {
        self.current_for(instruments, None).await
    }

    /// 주기를 지정한 `current`. 주기가 없으면 마지막 `init`의 주기입니다.
    pub async fn current_for(
        &self,
        instruments: Option<&[Instrument]>,
        frequency: Option<Granularity>,
    ) -> Result<BTreeMap<Instrument, Row>> {
        let (as_of, frequency, db) = self.defaults(frequency, None).await?;
        let snapshot = self.cache.snapshot(frequency).await;
        let instruments = self.resolve_instruments(instruments, snapshot.as_deref())?;

        if let Some(entry) = snapshot.as_ref().filter(|e| e.db() == db) {
            match entry.current(&instruments, as_of) {
                Ok(rows) => {
                    debug!(frequency = %frequency, "캐시 적중 (current)");
                    return Ok(rows);
                }
                Err(e) => debug!(reason = %e, "캐시 미스 (current)"),
            }
        }

        let fields: Vec<String> = DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect();
        let panel = self
            .reader
            .read(&instruments, frequency, &fields, None, Some(as_of), Some(1), Some(&db))
            .await?;

        let mut rows = BTreeMap::new();
        for (instrument, table) in &panel {
            let row = table.last_row().ok_or_else(|| {
                DataError::NotFound(collection_key(instrument, frequency))
            })?;
            rows.insert(instrument.clone(), row);
        }
        Ok(rows)
    }

    /// 윈도우 조회.
    ///
    /// 캐시가 요청 모양을 정확히 만족하지 못하면 같은 조건으로 저장소를 읽습니다.
    /// `start` 없이 `length`를 지정했는데 저장소에도 그만큼 없으면
    /// `InsufficientHistory`입니다.
    pub async fn history(&self, request: HistoryRequest) -> Result<MultiTable> {
        let (as_of, frequency, db) = self
            .defaults(request.frequency, request.db.as_deref())
            .await?;
        let snapshot = self.cache.snapshot(frequency).await;
        let instruments =
            self.resolve_instruments(request.instruments.as_deref(), snapshot.as_deref())?;
        let fields: Vec<String> = request
            .fields
            .clone()
            .unwrap_or_else(|| DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect());

        if let Some(entry) = snapshot.as_ref().filter(|e| e.db() == db) {
            match entry.history(
                &instruments,
                &fields,
                request.start,
                request.end,
                request.length,
                as_of,
            ) {
                Ok(panel) => {
                    debug!(frequency = %frequency, "캐시 적중 (history)");
                    return Ok(panel);
                }
                Err(e) => debug!(reason = %e, "캐시 미스 (history)"),
            }
        }

        let end = request.end.map_or(as_of, |end| end.min(as_of));
        warn!(frequency = %frequency, db = %db, "저장소 조회로 대체");
        let panel = self
            .reader
            .read(
                &instruments,
                frequency,
                &fields,
                request.start,
                Some(end),
                request.length,
                Some(&db),
            )
            .await?;

        if let (Some(length), None) = (request.length, request.start) {
            for (instrument, table) in &panel {
                if table.len() < length {
                    return Err(DataError::InsufficientHistory {
                        instrument: instrument.clone(),
                        requested: length,
                        available: table.len(),
                    });
                }
            }
        }

        Ok(panel)
    }

    async fn defaults(
        &self,
        frequency: Option<Granularity>,
        db: Option<&str>,
    ) -> Result<(DateTime<Utc>, Granularity, String)> {
        let state = self.state.read().await;
        let frequency = frequency
            .or(state.frequency)
            .ok_or(DataError::NotInitialized)?;
        let db = db
            .map(str::to_string)
            .or_else(|| state.db.clone())
            .unwrap_or_else(|| self.reader.store().default_db().to_string());

        Ok((state.as_of, frequency, db))
    }

    fn resolve_instruments(
        &self,
        instruments: Option<&[Instrument]>,
        snapshot: Option<&CacheEntry>,
    ) -> Result<Vec<Instrument>> {
        match (instruments, snapshot) {
            (Some(instruments), _) => Ok(instruments.to_vec()),
            (None, Some(entry)) => Ok(entry.instruments()),
            (None, None) => Err(DataError::NotInitialized),
        }
    }
}
