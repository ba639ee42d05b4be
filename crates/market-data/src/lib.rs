//! 시장 데이터 접근 및 수집.
//!
//! 이 crate는 다음을 제공합니다:
//! - 주기별 윈도우 캐시와 저장소 조회 대체 경로
//! - PostgreSQL JSONB 문서 저장소 (및 인메모리 저장소)
//! - OANDA 과거 캔들 API 클라이언트
//! - 페이지 단위 재개 가능한 과거 데이터 수집
//! - 고정 크기 워커 풀

pub mod cache;
pub mod error;
pub mod fallback;
pub mod fetcher;
pub mod pool;
pub mod provider;
pub mod service;
pub mod storage;
pub mod time_axis;

pub use error::{DataError, Result};

pub use cache::{CacheEntry, WindowCache};
pub use fallback::{default_fields, FieldMapper, FieldMappers, StoreReader};
pub use fetcher::{FetchState, PaginatedFetcher, DEFAULT_PAGE_LIMIT};
pub use pool::{PoolReport, TaskFailure, WorkerPool};
pub use service::{HistoryRequest, MarketDataService};
pub use time_axis::{locate_at_or_before, search_sorted, slice_for_window, WindowError};

// 저장소 타입 재내보내기
pub use storage::{DocumentStore, MemoryStore, PgDocumentStore, ReadRequest};

// 데이터 소스 재내보내기
pub use provider::{
    ApiError, DatasetSource, HistoryQuery, HistorySource, OandaClient, OandaConfig,
    OandaEnvironment, RANGE_TOO_LARGE, UNSUPPORTED_REQUEST,
};
