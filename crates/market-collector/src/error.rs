//! 에러 타입 정의.

use std::fmt;

use market_core::CoreError;
use market_data::{ApiError, DataError};

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 데이터 접근/수집 에러
    Data(DataError),
    /// 설정 에러
    Config(String),
    /// 설정 경로 레지스트리 에러
    Registry(String),
    /// 파일 입출력 에러
    Io(std::io::Error),
    /// 명령 인자 에러
    Args(String),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(e) => write!(f, "Data error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Registry(msg) => write!(f, "Config registry error: {}", msg),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Args(msg) => write!(f, "Invalid arguments: {}", msg),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Data(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

impl From<ApiError> for CollectorError {
    fn from(err: ApiError) -> Self {
        Self::Data(err.into())
    }
}

impl From<CoreError> for CollectorError {
    fn from(err: CoreError) -> Self {
        Self::Data(err.into())
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
