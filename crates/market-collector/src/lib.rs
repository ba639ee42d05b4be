//! fxdata 수집기.
//!
//! 이 crate는 OANDA 과거 캔들을 저장소로 수집하는 작업과 `fxdata` 바이너리를
//! 제공합니다:
//! - 종목/주기별 과거 캔들 수집 (`save`, `save-main`)
//! - 마지막 캔들 이후 증분 업데이트 (`update`)
//! - 저장소 데이터 조회 (`execute`)
//! - 이름 붙은 설정 파일 경로 관리 (`config`)

pub mod config;
pub mod error;
pub mod modules;
pub mod registry;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use registry::ConfigRegistry;
pub use stats::CollectionStats;
