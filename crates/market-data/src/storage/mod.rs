//! 영구 문서 저장소.
//!
//! 컬렉션(`instrument.granularity`)별로 시간 키 문서를 보관합니다.
//! - `PgDocumentStore`: PostgreSQL JSONB 저장소
//! - `MemoryStore`: 테스트 및 오프라인 실행용 인메모리 저장소

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{Record, Table};

use crate::error::Result;

/// 저장소 조회 요청.
///
/// - `start`가 있으면 `start`부터 `end`까지 (양끝 포함) 오름차순으로 앞에서 `limit`개
/// - `start`가 없으면 `end` 이전의 마지막 `limit`개를 오름차순으로
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadRequest {
    /// 컬렉션 이름
    pub collection: String,
    /// db 식별자 (없으면 저장소 기본값)
    pub db: Option<String>,
    /// 조회할 필드 (없으면 전체)
    pub fields: Option<Vec<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ReadRequest {
    /// 새 조회 요청을 생성합니다.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    pub fn with_db(mut self, db: Option<String>) -> Self {
        self.db = db;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_start(mut self, start: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self
    }

    pub fn with_end(mut self, end: Option<DateTime<Utc>>) -> Self {
        self.end = end;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// 문서 저장소 인터페이스.
///
/// 여러 워커가 하나의 인스턴스를 공유합니다.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 기본 db 식별자.
    fn default_db(&self) -> &str;

    /// 조건에 맞는 레코드를 시간 오름차순으로 조회합니다.
    async fn read_records(&self, request: &ReadRequest) -> Result<Vec<Record>>;

    /// 조건에 맞는 레코드를 테이블로 조회합니다.
    async fn read(&self, request: &ReadRequest) -> Result<Table> {
        let records = self.read_records(request).await?;
        Ok(Table::from_records(&records, request.fields.as_deref())?)
    }

    /// 레코드를 삽입합니다. 이미 있는 시간이면 `DuplicateError`입니다.
    async fn write(&self, records: &[Record], collection: &str, db: Option<&str>)
        -> Result<usize>;

    /// 레코드를 시간 기준으로 덮어쓰거나 삽입합니다.
    async fn inplace(
        &self,
        records: &[Record],
        collection: &str,
        db: Option<&str>,
    ) -> Result<usize>;

    /// db의 컬렉션 이름 목록 (정렬됨).
    async fn table_names(&self, db: Option<&str>) -> Result<Vec<String>>;
}
