//! 도메인 타입의 에러 정의.
//!
//! 테이블 구성, 컬렉션 키 파싱, 설정 처리에서 발생하는 에러를 정의합니다.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 알 수 없는 캔들 주기
    #[error("알 수 없는 캔들 주기: {0}")]
    UnknownGranularity(String),

    /// 잘못된 컬렉션 키 (`instrument.granularity` 형식이 아님)
    #[error("잘못된 컬렉션 키: {0}")]
    InvalidCollectionKey(String),

    /// 시간 인덱스가 엄격하게 증가하지 않음
    #[error("시간 인덱스 정렬 에러: {position}번째 값이 직전 값보다 크지 않습니다")]
    UnsortedIndex { position: usize },

    /// 컬럼 길이가 인덱스 길이와 다름
    #[error("컬럼 길이 불일치: '{column}' ({actual}) != 인덱스 ({expected})")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
