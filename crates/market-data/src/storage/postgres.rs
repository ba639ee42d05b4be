//! PostgreSQL 문서 저장소.
//!
//! `market_documents(db, collection, datetime, document JSONB)` 테이블에
//! 캔들 문서를 보관합니다. `(db, collection, datetime)`이 기본 키입니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{Record, StoreConfig, TIME_FIELD};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};

use super::{DocumentStore, ReadRequest};
use crate::error::{DataError, Result};

/// 일괄 삽입 청크 크기.
const INSERT_CHUNK: usize = 500;

/// PostgreSQL 문서 저장소.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    default_db: String,
}

impl PgDocumentStore {
    /// 설정으로 연결합니다.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!(db = %config.db, "Database connection established");

        Ok(Self::from_pool(pool, config.db.clone()))
    }

    /// 기존 연결 풀에서 생성합니다.
    pub fn from_pool(pool: PgPool, default_db: impl Into<String>) -> Self {
        Self {
            pool,
            default_db: default_db.into(),
        }
    }

    /// 내부 연결 풀을 반환합니다.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");

        sqlx::migrate!("../../migrations").run(&self.pool).await?;

        info!("Database migrations completed");
        Ok(())
    }

    fn db<'a>(&'a self, db: Option<&'a str>) -> &'a str {
        db.unwrap_or(&self.default_db)
    }

    async fn insert_chunks(
        &self,
        records: &[Record],
        collection: &str,
        db: &str,
        upsert: bool,
    ) -> Result<usize> {
        let sql = if upsert {
            r#"
            INSERT INTO market_documents (db, collection, datetime, document)
            SELECT $1::text, $2::text, * FROM UNNEST($3::timestamptz[], $4::jsonb[])
            ON CONFLICT (db, collection, datetime) DO UPDATE SET
                document = EXCLUDED.document
            "#
        } else {
            r#"
            INSERT INTO market_documents (db, collection, datetime, document)
            SELECT $1::text, $2::text, * FROM UNNEST($3::timestamptz[], $4::jsonb[])
            "#
        };

        // 중복 거부 시 전체가 하나의 트랜잭션이어야 부분 삽입이 남지 않음
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for chunk in records.chunks(INSERT_CHUNK) {
            let datetimes: Vec<DateTime<Utc>> = chunk.iter().map(|r| r.datetime).collect();
            let documents: Vec<Value> = chunk
                .iter()
                .map(|r| r.to_document())
                .collect::<std::result::Result<_, _>>()?;

            let result = sqlx::query(sql)
                .bind(db)
                .bind(collection)
                .bind(&datetimes)
                .bind(&documents)
                .execute(&mut *tx)
                .await?;

            written += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(written)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn default_db(&self) -> &str {
        &self.default_db
    }

    #[instrument(skip(self), fields(collection = %request.collection))]
    async fn read_records(&self, request: &ReadRequest) -> Result<Vec<Record>> {
        let db = self.db(request.db.as_deref());
        let limit = request.limit.map(|l| l as i64);

        let documents: Vec<(Value,)> = match request.start {
            Some(start) => {
                sqlx::query_as(
                    r#"
                    SELECT document
                    FROM market_documents
                    WHERE db = $1 AND collection = $2
                      AND datetime >= $3
                      AND ($4::timestamptz IS NULL OR datetime <= $4)
                    ORDER BY datetime ASC
                    LIMIT $5
                    "#,
                )
                .bind(db)
                .bind(&request.collection)
                .bind(start)
                .bind(request.end)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                let mut tail: Vec<(Value,)> = sqlx::query_as(
                    r#"
                    SELECT document
                    FROM market_documents
                    WHERE db = $1 AND collection = $2
                      AND ($3::timestamptz IS NULL OR datetime <= $3)
                    ORDER BY datetime DESC
                    LIMIT $4
                    "#,
                )
                .bind(db)
                .bind(&request.collection)
                .bind(request.end)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

                // 시간순 정렬 (오래된 것부터)
                tail.reverse();
                tail
            }
        };

        let records = documents
            .into_iter()
            .map(|(doc,)| Record::from_document(doc, TIME_FIELD))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(db, count = records.len(), "저장소에서 문서 조회");
        Ok(records)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn write(&self, records: &[Record], collection: &str, db: Option<&str>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.insert_chunks(records, collection, self.db(db), false).await
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn inplace(
        &self,
        records: &[Record],
        collection: &str,
        db: Option<&str>,
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.insert_chunks(records, collection, self.db(db), true).await
    }

    async fn table_names(&self, db: Option<&str>) -> Result<Vec<String>> {
        let names: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT collection
            FROM market_documents
            WHERE db = $1
            ORDER BY collection
            "#,
        )
        .bind(self.db(db))
        .fetch_all(&self.pool)
        .await?;

        Ok(names.into_iter().map(|(name,)| name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    #[ignore] // 실제 PostgreSQL 필요 (DATABASE_URL)
    async fn test_roundtrip_against_database() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let config = StoreConfig {
            url,
            db: "fxdata_test".to_string(),
            ..Default::default()
        };
        let store = PgDocumentStore::connect(&config).await.unwrap();
        store.migrate().await.unwrap();

        let dt = Utc.with_ymd_and_hms(2016, 1, 4, 0, 0, 0).unwrap();
        let records = vec![Record::new(dt).with_value("closeMid", 1.08)];
        store.inplace(&records, "EUR_USD.D", None).await.unwrap();
        assert!(store.write(&records, "EUR_USD.D", None).await.is_err());

        let table = store
            .read(&ReadRequest::new("EUR_USD.D").with_limit(Some(1)))
            .await
            .unwrap();
        assert_eq!(table.last_datetime(), Some(dt));
        assert!(store
            .table_names(None)
            .await
            .unwrap()
            .contains(&"EUR_USD.D".to_string()));
    }
}
