//! 데이터 모듈 오류 타입.

use market_core::{CoreError, Instrument};
use thiserror::Error;

use crate::provider::ApiError;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 중복 레코드
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 캐시 미스 (저장소 조회로 복구됨)
    #[error("Cache miss: {0}")]
    CacheMiss(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 타임아웃 오류
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// 요청한 길이만큼의 과거 데이터가 없음
    #[error("Insufficient history for {instrument}: requested {requested}, available {available}")]
    InsufficientHistory {
        instrument: Instrument,
        requested: usize,
        available: usize,
    },

    /// 저장소에 컬렉션이 없음
    #[error("Missing collection: {0}")]
    MissingCollection(String),

    /// 페이지 조회에 시작 시간이 필요함
    #[error("count exceeds 5000, start is required: {0}")]
    StartRequired(String),

    /// 서비스가 초기화되지 않음 (주기를 알 수 없음)
    #[error("Service not initialized: frequency is unknown")]
    NotInitialized,

    /// 워커 풀 오류
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 외부 API 오류
    #[error(transparent)]
    Api(#[from] ApiError),

    /// 도메인 오류
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DataError {
    /// 캐시 미스인지 확인합니다.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, DataError::CacheMiss(_))
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Io(e) => DataError::ConnectionError(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::DuplicateError(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DataError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DataError::MigrationError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
