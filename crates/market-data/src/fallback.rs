//! 저장소 조회 경로.
//!
//! 캐시 미스 시 종목마다 `instrument.frequency` 컬렉션을 읽습니다. db별
//! 필드 매퍼가 있으면 표준 필드 이름을 벤더 이름으로 바꿔 조회하고 결과
//! 컬럼 이름을 다시 표준 이름으로 돌려놓습니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use market_core::{
    collection_key, Granularity, Instrument, MultiTable, DEFAULT_FIELDS, TIME_FIELD,
};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::storage::{DocumentStore, ReadRequest};

/// 표준 필드 ↔ 벤더 필드 매핑.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMapper {
    forward: BTreeMap<String, String>,
    inverse: BTreeMap<String, String>,
}

impl FieldMapper {
    /// 표준 이름 → 벤더 이름 매핑으로 생성합니다.
    pub fn new(forward: BTreeMap<String, String>) -> Self {
        let inverse = forward
            .iter()
            .map(|(canonical, vendor)| (vendor.clone(), canonical.clone()))
            .collect();
        Self { forward, inverse }
    }

    /// OANDA 중간가 필드 매핑.
    pub fn oanda() -> Self {
        Self::new(
            [
                ("open", "openMid"),
                ("high", "highMid"),
                ("low", "lowMid"),
                ("close", "closeMid"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        )
    }

    /// 표준 이름을 벤더 이름으로 바꿉니다. 매핑이 없으면 그대로입니다.
    pub fn to_vendor(&self, field: &str) -> String {
        self.forward
            .get(field)
            .cloned()
            .unwrap_or_else(|| field.to_string())
    }

    /// 벤더 → 표준 매핑.
    pub fn inverse(&self) -> &BTreeMap<String, String> {
        &self.inverse
    }
}

/// db 식별자별 필드 매퍼.
#[derive(Debug, Clone, Default)]
pub struct FieldMappers {
    mappers: HashMap<String, FieldMapper>,
}

impl FieldMappers {
    pub fn new() -> Self {
        Self::default()
    }

    /// db에 매퍼를 등록합니다.
    pub fn with(mut self, db: impl Into<String>, mapper: FieldMapper) -> Self {
        self.mappers.insert(db.into(), mapper);
        self
    }

    /// 설정(`field_mappers` 섹션)에서 생성합니다.
    pub fn from_config(config: &HashMap<String, BTreeMap<String, String>>) -> Self {
        Self {
            mappers: config
                .iter()
                .map(|(db, map)| (db.clone(), FieldMapper::new(map.clone())))
                .collect(),
        }
    }

    pub fn get(&self, db: &str) -> Option<&FieldMapper> {
        self.mappers.get(db)
    }
}

/// 기본 조회 필드 (시간축 포함).
pub fn default_fields() -> Vec<String> {
    std::iter::once(TIME_FIELD)
        .chain(DEFAULT_FIELDS)
        .map(str::to_string)
        .collect()
}

/// 저장소 조회기.
#[derive(Clone)]
pub struct StoreReader {
    store: Arc<dyn DocumentStore>,
    mappers: FieldMappers,
}

impl StoreReader {
    pub fn new(store: Arc<dyn DocumentStore>, mappers: FieldMappers) -> Self {
        Self { store, mappers }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// 종목별로 저장소를 조회해 패널로 묶습니다.
    ///
    /// `fields`가 비어 있으면 기본 필드를 사용합니다. 재시도는 하지 않습니다.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, instruments, fields), fields(count = instruments.len()))]
    pub async fn read(
        &self,
        instruments: &[Instrument],
        frequency: Granularity,
        fields: &[String],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        length: Option<usize>,
        db: Option<&str>,
    ) -> Result<MultiTable> {
        let db = db.unwrap_or_else(|| self.store.default_db()).to_string();
        let mapper = self.mappers.get(&db);

        let mut projection: Vec<String> = if fields.is_empty() {
            default_fields()
        } else {
            fields.to_vec()
        };
        if !projection.iter().any(|f| f == TIME_FIELD) {
            projection.insert(0, TIME_FIELD.to_string());
        }
        if let Some(mapper) = mapper {
            projection = projection.iter().map(|f| mapper.to_vendor(f)).collect();
        }

        let mut panel = MultiTable::new(frequency);
        for instrument in instruments {
            let request = ReadRequest::new(collection_key(instrument, frequency))
                .with_db(Some(db.clone()))
                .with_fields(projection.clone())
                .with_start(start)
                .with_end(end)
                .with_limit(length);

            let mut table = self.store.read(&request).await?;
            if let Some(mapper) = mapper {
                table = table.rename_columns(mapper.inverse());
            }

            debug!(instrument = %instrument, rows = table.len(), "저장소 조회");
            panel.insert(instrument.clone(), table);
        }

        Ok(panel)
    }
}
