//! 인메모리 문서 저장소.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::Record;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DocumentStore, ReadRequest};
use crate::error::{DataError, Result};

type Collection = BTreeMap<DateTime<Utc>, Record>;

/// 인메모리 문서 저장소.
///
/// `(db, collection)`별로 시간 순 레코드를 보관합니다.
pub struct MemoryStore {
    default_db: String,
    collections: RwLock<HashMap<(String, String), Collection>>,
}

impl MemoryStore {
    /// 새 저장소를 생성합니다.
    pub fn new(default_db: impl Into<String>) -> Self {
        Self {
            default_db: default_db.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn key(&self, collection: &str, db: Option<&str>) -> (String, String) {
        (
            db.unwrap_or(&self.default_db).to_string(),
            collection.to_string(),
        )
    }

    /// 컬렉션의 레코드 수를 반환합니다.
    pub async fn count(&self, collection: &str, db: Option<&str>) -> usize {
        self.collections
            .read()
            .await
            .get(&self.key(collection, db))
            .map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("oanda")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn default_db(&self) -> &str {
        &self.default_db
    }

    async fn read_records(&self, request: &ReadRequest) -> Result<Vec<Record>> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&self.key(&request.collection, request.db.as_deref()))
        else {
            return Ok(Vec::new());
        };

        let in_range = collection.values().filter(|r| {
            request.start.map_or(true, |s| r.datetime >= s)
                && request.end.map_or(true, |e| r.datetime <= e)
        });

        let records: Vec<Record> = match (request.start, request.limit) {
            (Some(_), Some(limit)) => in_range.take(limit).cloned().collect(),
            (None, Some(limit)) => {
                let mut tail: Vec<Record> = in_range.rev().take(limit).cloned().collect();
                tail.reverse();
                tail
            }
            (_, None) => in_range.cloned().collect(),
        };

        debug!(
            collection = %request.collection,
            count = records.len(),
            "메모리 저장소 조회"
        );

        Ok(records)
    }

    async fn write(&self, records: &[Record], collection: &str, db: Option<&str>) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(self.key(collection, db)).or_default();

        if let Some(dup) = records.iter().find(|r| entry.contains_key(&r.datetime)) {
            return Err(DataError::DuplicateError(format!(
                "{} @ {}",
                collection, dup.datetime
            )));
        }

        for record in records {
            entry.insert(record.datetime, record.clone());
        }
        Ok(records.len())
    }

    async fn inplace(
        &self,
        records: &[Record],
        collection: &str,
        db: Option<&str>,
    ) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(self.key(collection, db)).or_default();

        for record in records {
            entry.insert(record.datetime, record.clone());
        }
        Ok(records.len())
    }

    async fn table_names(&self, db: Option<&str>) -> Result<Vec<String>> {
        let db = db.unwrap_or(&self.default_db);
        let mut names: Vec<String> = self
            .collections
            .read()
            .await
            .iter()
            .filter(|((d, _), c)| d == db && !c.is_empty())
            .map(|((_, name), _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
