//! 데이터 수집 모듈.

pub mod dataset_sync;
pub mod execute;
pub mod history_sync;
pub mod update;

#[cfg(test)]
pub(crate) mod testing;

pub use dataset_sync::DatasetTask;
pub use execute::{execute, history_request, parse_datetime, ArgValue, ExecuteArgs};
pub use history_sync::{
    default_main_start, HistoryCollector, HistoryTask, SaveSummary, DEFAULT_GRANULARITIES,
    MAIN_CURRENCIES,
};
pub use update::UpdateTask;
