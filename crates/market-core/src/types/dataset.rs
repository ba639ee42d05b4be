//! 캔들 외 보조 데이터셋.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 보조 데이터셋의 기본 조회 기간 (1년, 초).
pub const DEFAULT_DATASET_PERIOD: u64 = 31_536_000;

/// 보조 데이터셋 종류.
///
/// 컬렉션 이름은 `{instrument}.{code}`이며 code는 캔들 주기와 겹치지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dataset {
    /// 과거 포지션 비율 (HPR)
    #[serde(rename = "HPR")]
    PositionRatios,
    /// 경제 지표 일정 (CLD)
    #[serde(rename = "CLD")]
    Calendar,
    /// 투기적 포지션 보고서 (COT)
    #[serde(rename = "COT")]
    CommitmentsOfTraders,
}

impl Dataset {
    /// 모든 데이터셋.
    pub const ALL: [Dataset; 3] = [
        Dataset::PositionRatios,
        Dataset::Calendar,
        Dataset::CommitmentsOfTraders,
    ];

    /// 컬렉션 이름에 쓰는 코드.
    pub fn code(&self) -> &'static str {
        match self {
            Dataset::PositionRatios => "HPR",
            Dataset::Calendar => "CLD",
            Dataset::CommitmentsOfTraders => "COT",
        }
    }

    /// 쉼표로 구분된 목록을 파싱합니다 (예: "HPR,COT").
    pub fn parse_list(s: &str) -> Result<Vec<Dataset>, String> {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HPR" => Ok(Dataset::PositionRatios),
            "CLD" => Ok(Dataset::Calendar),
            "COT" => Ok(Dataset::CommitmentsOfTraders),
            _ => Err(format!("Unknown dataset: {} (HPR, CLD, COT)", s)),
        }
    }
}
