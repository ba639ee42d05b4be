//! 캔들 주기(granularity) 정의.
//!
//! 벤더(OANDA) 코드 문자열("D", "M15" 등)을 그대로 표시 형식으로 사용합니다.
//! 캐시 파티션 키이자 저장소 컬렉션 키의 접미사입니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들 주기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    /// 5초봉
    S5,
    /// 10초봉
    S10,
    /// 15초봉
    S15,
    /// 30초봉
    S30,
    /// 1분봉
    M1,
    /// 2분봉
    M2,
    /// 3분봉
    M3,
    /// 4분봉
    M4,
    /// 5분봉
    M5,
    /// 10분봉
    M10,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 3시간봉
    H3,
    /// 4시간봉
    H4,
    /// 6시간봉
    H6,
    /// 8시간봉
    H8,
    /// 12시간봉
    H12,
    /// 일봉
    D,
    /// 주봉
    W,
    /// 월봉
    M,
}

impl Granularity {
    /// 지원하는 모든 캔들 주기.
    pub const ALL: [Granularity; 22] = [
        Granularity::S5,
        Granularity::S10,
        Granularity::S15,
        Granularity::S30,
        Granularity::M1,
        Granularity::M2,
        Granularity::M3,
        Granularity::M4,
        Granularity::M5,
        Granularity::M10,
        Granularity::M15,
        Granularity::M30,
        Granularity::H1,
        Granularity::H2,
        Granularity::H3,
        Granularity::H4,
        Granularity::H6,
        Granularity::H8,
        Granularity::H12,
        Granularity::D,
        Granularity::W,
        Granularity::M,
    ];

    /// 이 캔들 주기의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Granularity::S5 => Duration::from_secs(5),
            Granularity::S10 => Duration::from_secs(10),
            Granularity::S15 => Duration::from_secs(15),
            Granularity::S30 => Duration::from_secs(30),
            Granularity::M1 => Duration::from_secs(60),
            Granularity::M2 => Duration::from_secs(2 * 60),
            Granularity::M3 => Duration::from_secs(3 * 60),
            Granularity::M4 => Duration::from_secs(4 * 60),
            Granularity::M5 => Duration::from_secs(5 * 60),
            Granularity::M10 => Duration::from_secs(10 * 60),
            Granularity::M15 => Duration::from_secs(15 * 60),
            Granularity::M30 => Duration::from_secs(30 * 60),
            Granularity::H1 => Duration::from_secs(60 * 60),
            Granularity::H2 => Duration::from_secs(2 * 60 * 60),
            Granularity::H3 => Duration::from_secs(3 * 60 * 60),
            Granularity::H4 => Duration::from_secs(4 * 60 * 60),
            Granularity::H6 => Duration::from_secs(6 * 60 * 60),
            Granularity::H8 => Duration::from_secs(8 * 60 * 60),
            Granularity::H12 => Duration::from_secs(12 * 60 * 60),
            Granularity::D => Duration::from_secs(24 * 60 * 60),
            Granularity::W => Duration::from_secs(7 * 24 * 60 * 60),
            Granularity::M => Duration::from_secs(30 * 24 * 60 * 60), // 근사값
        }
    }

    /// 이 캔들 주기의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 벤더 코드 문자열로 변환합니다.
    pub fn as_code(&self) -> &'static str {
        match self {
            Granularity::S5 => "S5",
            Granularity::S10 => "S10",
            Granularity::S15 => "S15",
            Granularity::S30 => "S30",
            Granularity::M1 => "M1",
            Granularity::M2 => "M2",
            Granularity::M3 => "M3",
            Granularity::M4 => "M4",
            Granularity::M5 => "M5",
            Granularity::M10 => "M10",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H2 => "H2",
            Granularity::H3 => "H3",
            Granularity::H4 => "H4",
            Granularity::H6 => "H6",
            Granularity::H8 => "H8",
            Granularity::H12 => "H12",
            Granularity::D => "D",
            Granularity::W => "W",
            Granularity::M => "M",
        }
    }

    /// 벤더 코드 문자열에서 파싱합니다.
    pub fn from_code(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.as_code() == s)
    }

    /// 쉼표로 구분된 목록을 파싱합니다 (예: "D,H4").
    pub fn parse_list(s: &str) -> Result<Vec<Granularity>, String> {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl Default for Granularity {
    /// API 기본값과 동일한 5초봉.
    fn default() -> Self {
        Granularity::S5
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("Invalid granularity: {}", s))
    }
}
