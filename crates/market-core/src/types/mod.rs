//! 시스템 전반에서 사용되는 공통 타입.

mod dataset;
mod granularity;
mod instrument;

pub use dataset::*;
pub use granularity::*;
pub use instrument::*;
