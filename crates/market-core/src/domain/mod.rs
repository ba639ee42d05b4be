//! 시장 데이터 도메인 모델.

mod panel;
mod record;
mod table;

pub use panel::*;
pub use record::*;
pub use table::*;
