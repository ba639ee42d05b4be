//! 페이지 단위 과거 데이터 조회.
//!
//! 외부 API는 한 번에 최대 `page_limit`(5000)개만 반환합니다. 더 긴 구간은
//! 마지막으로 받은 캔들 다음부터 이어서 요청합니다.
//!
//! # 동작 방식
//!
//! - **개수 모드** (`count > page_limit`): `start`부터 `page_limit`씩 나누어
//!   요청하고 마지막 페이지에서 남은 개수만 요청합니다.
//! - **구간 모드**: 한 번에 요청한 뒤, 한도 초과(5000)나 지원하지 않는
//!   요청(36) 응답을 받으면 커서부터 한 페이지를 받고 나머지 구간을 다시
//!   시도합니다.
//!
//! 이어지는 페이지는 `include_first=false`로 요청하므로 결과는 시간순이고
//! 페이지 간 중복이 없습니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use market_core::Record;
use tracing::{debug, instrument};

use crate::error::{DataError, Result};
use crate::provider::{ApiError, HistoryQuery, HistorySource};

/// 요청당 기본 최대 캔들 수.
pub const DEFAULT_PAGE_LIMIT: usize = 5000;

/// 구간 모드 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// 전체 구간을 한 번에 요청
    Fetching,
    /// 한도 초과 후 커서부터 이어서 요청
    ResumingAfterLimit,
    /// 지원하지 않는 구간 요청을 개수 단위로 나누어 요청
    ChunkedAdjustment,
    /// 완료
    Done,
}

/// 페이지 단위 조회기.
pub struct PaginatedFetcher {
    source: Arc<dyn HistorySource>,
    page_limit: usize,
    request_delay: Option<Duration>,
}

impl PaginatedFetcher {
    /// 새 조회기를 생성합니다.
    pub fn new(source: Arc<dyn HistorySource>) -> Self {
        Self {
            source,
            page_limit: DEFAULT_PAGE_LIMIT,
            request_delay: None,
        }
    }

    /// 페이지 크기를 설정합니다.
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// 연속 요청 사이의 지연을 설정합니다.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = (!delay.is_zero()).then_some(delay);
        self
    }

    /// 페이지 크기를 반환합니다.
    pub fn page_limit(&self) -> usize {
        self.page_limit
    }

    /// 과거 캔들을 모두 조회합니다.
    #[instrument(skip(self, query), fields(instrument = %query.instrument, granularity = %query.granularity))]
    pub async fn fetch(&self, query: &HistoryQuery) -> Result<Vec<Record>> {
        match query.count {
            Some(count) if count > self.page_limit => self.fetch_count(query, count).await,
            _ => self.fetch_range(query).await,
        }
    }

    /// 개수 모드: `start`부터 `count`개를 페이지로 나누어 조회합니다.
    async fn fetch_count(&self, query: &HistoryQuery, count: usize) -> Result<Vec<Record>> {
        let mut cursor = query.start.ok_or_else(|| start_required(query))?;
        let mut include_first = query.include_first;
        let mut records: Vec<Record> = Vec::with_capacity(count);
        let mut calls = 0;

        while records.len() < count {
            let page_size = (count - records.len()).min(self.page_limit);
            let mut page_query = query.clone();
            page_query.start = Some(cursor);
            page_query.end = None;
            page_query.count = Some(page_size);
            page_query.include_first = include_first;

            let page = self.call(&page_query, &mut calls).await?;
            let Some(last) = page.last() else {
                break;
            };

            cursor = last.datetime;
            include_first = Some(false);
            records.extend(page);
        }

        records.truncate(count);
        debug!(count = records.len(), calls, "개수 모드 조회 완료");
        Ok(records)
    }

    /// 구간 모드: 상태 전이로 한도 초과와 지원하지 않는 요청을 복구합니다.
    async fn fetch_range(&self, query: &HistoryQuery) -> Result<Vec<Record>> {
        let mut records: Vec<Record> = Vec::new();
        let mut cursor: Option<DateTime<Utc>> = query.start;
        let mut calls = 0;
        let mut state = FetchState::Fetching;

        while state != FetchState::Done {
            state = match state {
                FetchState::Fetching => match self.call(query, &mut calls).await {
                    Ok(page) => {
                        records.extend(page);
                        FetchState::Done
                    }
                    Err(err) => self.recover(err, query)?,
                },
                FetchState::ResumingAfterLimit | FetchState::ChunkedAdjustment => {
                    let Some(start) = cursor else {
                        return Err(start_required(query));
                    };

                    let mut page_query = query.clone();
                    page_query.start = Some(start);
                    page_query.end = None;
                    page_query.count = Some(self.page_limit);
                    if !records.is_empty() {
                        page_query.include_first = Some(false);
                    }

                    let page = self.call(&page_query, &mut calls).await?;
                    let Some(last) = page.last().map(|r| r.datetime) else {
                        debug!(state = ?state, "빈 페이지, 조회 종료");
                        break;
                    };

                    let overshoot = query.end.is_some_and(|end| last > end);
                    records.extend(
                        page.into_iter()
                            .filter(|r| query.end.map_or(true, |end| r.datetime <= end)),
                    );
                    cursor = Some(last);

                    if overshoot {
                        FetchState::Done
                    } else {
                        let mut rest = query.clone();
                        rest.start = Some(last);
                        rest.count = None;
                        rest.include_first = Some(false);

                        match self.call(&rest, &mut calls).await {
                            Ok(page) => {
                                records.extend(page);
                                FetchState::Done
                            }
                            Err(err) => self.recover(err, query)?,
                        }
                    }
                }
                FetchState::Done => FetchState::Done,
            };
        }

        debug!(count = records.len(), calls, "구간 조회 완료");
        Ok(records)
    }

    /// API 오류에 따른 다음 상태를 결정합니다.
    fn recover(&self, err: ApiError, query: &HistoryQuery) -> Result<FetchState> {
        let next = if err.is_range_too_large() {
            FetchState::ResumingAfterLimit
        } else if err.is_unsupported_request() {
            FetchState::ChunkedAdjustment
        } else {
            return Err(err.into());
        };

        if query.start.is_none() {
            return Err(start_required(query));
        }

        debug!(error = %err, next = ?next, "페이지 조회로 전환");
        Ok(next)
    }

    async fn call(
        &self,
        query: &HistoryQuery,
        calls: &mut usize,
    ) -> std::result::Result<Vec<Record>, ApiError> {
        if *calls > 0 {
            if let Some(delay) = self.request_delay {
                tokio::time::sleep(delay).await;
            }
        }
        *calls += 1;

        let page = self.source.get_history(query).await?;
        debug!(
            start = ?query.start,
            count = page.len(),
            "페이지 수신"
        );
        Ok(page)
    }
}

fn start_required(query: &HistoryQuery) -> DataError {
    DataError::StartRequired(format!("{}.{}", query.instrument, query.granularity))
}
