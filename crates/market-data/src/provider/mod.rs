//! 외부 시장 데이터 API.
//!
//! - `HistorySource`: 과거 캔들 조회 인터페이스
//! - `DatasetSource`: 보조 데이터셋(HPR, CLD, COT) 조회 인터페이스
//! - `OandaClient`: OANDA v1 REST API 클라이언트

pub mod error;
pub mod oanda;

pub use error::{ApiError, RANGE_TOO_LARGE, UNSUPPORTED_REQUEST};
pub use oanda::{OandaClient, OandaConfig, OandaEnvironment};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_core::{Dataset, Granularity, Instrument, Record};

/// 과거 캔들 조회 파라미터.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    /// 종목
    pub instrument: Instrument,
    /// 캔들 주기
    pub granularity: Granularity,
    /// 시작 시간
    pub start: Option<DateTime<Utc>>,
    /// 종료 시간
    pub end: Option<DateTime<Utc>>,
    /// 캔들 수
    pub count: Option<usize>,
    /// 시작 시간의 캔들 포함 여부 (`start`와 함께 사용)
    pub include_first: Option<bool>,
    /// 캔들 가격 형식
    pub candle_format: String,
    /// 일봉 기준 시각
    pub daily_alignment: u8,
    /// 기준 시간대
    pub alignment_timezone: String,
}

impl HistoryQuery {
    /// 새 조회 파라미터를 생성합니다.
    pub fn new(instrument: Instrument, granularity: Granularity) -> Self {
        Self {
            instrument,
            granularity,
            start: None,
            end: None,
            count: None,
            include_first: None,
            candle_format: "midpoint".to_string(),
            daily_alignment: 0,
            alignment_timezone: "UTC".to_string(),
        }
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_include_first(mut self, include_first: bool) -> Self {
        self.include_first = Some(include_first);
        self
    }
}

/// 과거 캔들 데이터 소스.
///
/// 한 번의 호출은 최대 한 페이지이며, 한도 초과 등은 `ApiError`로 보고합니다.
/// 반환 레코드는 시간 오름차순입니다.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// 과거 캔들을 조회합니다.
    async fn get_history(&self, query: &HistoryQuery) -> Result<Vec<Record>, ApiError>;
}

/// 보조 데이터셋 소스.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// 최근 `period`초 동안의 데이터셋을 조회합니다. 레코드는 시간 오름차순입니다.
    async fn get_dataset(
        &self,
        dataset: Dataset,
        instrument: &Instrument,
        period: u64,
    ) -> Result<Vec<Record>, ApiError>;
}
