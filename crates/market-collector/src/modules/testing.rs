//! 수집 모듈 테스트용 데이터 소스.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use market_core::{Dataset, Instrument, Record};
use market_data::{ApiError, DatasetSource, HistoryQuery, HistorySource};

pub(crate) fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

/// `day(0)`부터 하루 간격 캔들을 돌려주는 소스 (주기는 무시).
pub(crate) struct DailySource {
    data: Vec<Record>,
    failing: Option<String>,
    queries: Mutex<Vec<HistoryQuery>>,
    dataset_queries: Mutex<Vec<(Dataset, Instrument, u64)>>,
}

impl DailySource {
    pub(crate) fn new(days: i64) -> Self {
        let data = (0..days)
            .map(|d| {
                Record::new(day(d))
                    .with_value("openMid", d as f64)
                    .with_value("closeMid", d as f64 + 0.5)
                    .with_value("volume", 10)
            })
            .collect();
        Self {
            data,
            failing: None,
            queries: Mutex::new(Vec::new()),
            dataset_queries: Mutex::new(Vec::new()),
        }
    }

    /// 지정한 종목 요청은 API 오류로 응답
    pub(crate) fn failing_for(mut self, instrument: &str) -> Self {
        self.failing = Some(instrument.to_string());
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub(crate) fn last_query(&self) -> Option<HistoryQuery> {
        self.queries.lock().unwrap().last().cloned()
    }

    pub(crate) fn last_dataset_query(&self) -> Option<(Dataset, Instrument, u64)> {
        self.dataset_queries.lock().unwrap().last().cloned()
    }

    fn check_failing(&self, instrument: &Instrument) -> Result<(), ApiError> {
        if self.failing.as_deref() == Some(instrument.as_str()) {
            return Err(ApiError::Api {
                code: 46,
                message: format!("Invalid instrument: {}", instrument),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HistorySource for DailySource {
    async fn get_history(&self, query: &HistoryQuery) -> Result<Vec<Record>, ApiError> {
        self.queries.lock().unwrap().push(query.clone());

        self.check_failing(&query.instrument)?;

        let from = match query.start {
            Some(s) if query.include_first == Some(false) => {
                self.data.partition_point(|r| r.datetime <= s)
            }
            Some(s) => self.data.partition_point(|r| r.datetime < s),
            None => 0,
        };
        let to = match (query.end, query.count) {
            (Some(end), _) => self.data.partition_point(|r| r.datetime <= end),
            (None, count) => from + count.unwrap_or(500),
        }
        .min(self.data.len())
        .max(from);

        Ok(self.data[from..to].to_vec())
    }
}

/// 데이터셋은 같은 날짜에 `long_position_ratio` 값을 돌려줍니다 (기간은 무시).
#[async_trait]
impl DatasetSource for DailySource {
    async fn get_dataset(
        &self,
        dataset: Dataset,
        instrument: &Instrument,
        period: u64,
    ) -> Result<Vec<Record>, ApiError> {
        self.dataset_queries
            .lock()
            .unwrap()
            .push((dataset, instrument.clone(), period));
        self.check_failing(instrument)?;

        Ok(self
            .data
            .iter()
            .map(|r| Record::new(r.datetime).with_value("long_position_ratio", 50.0))
            .collect())
    }
}
