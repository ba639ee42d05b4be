//! # Market Core
//!
//! 시장 데이터 접근 계층의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 종목(Instrument) 및 캔들 주기(Granularity) 정의
//! - 컬렉션 키 (`{instrument}.{granularity}`)
//! - 캔들 레코드, 시계열 테이블, 다종목 패널
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
