//! 캔들 레코드.
//!
//! 필드명 → 값 매핑으로 표현되는 단일 캔들입니다. `datetime`은 필수이며
//! 시계열의 시간축입니다. 나머지 필드는 표준 이름(`open`, `close` 등)이거나
//! 벤더 고유 이름(`openMid`, `complete` 등)일 수 있습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// 시간축 필드 이름.
pub const TIME_FIELD: &str = "datetime";

/// 기본 조회 필드 (시간축 제외).
pub const DEFAULT_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// 단일 캔들 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 캔들 시간
    pub datetime: DateTime<Utc>,
    /// 시간축을 제외한 필드
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl Record {
    /// 빈 레코드를 생성합니다.
    pub fn new(datetime: DateTime<Utc>) -> Self {
        Self {
            datetime,
            values: Map::new(),
        }
    }

    /// 필드를 추가합니다.
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// 필드 값을 조회합니다.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// 필드 값을 f64로 조회합니다 (없거나 숫자가 아니면 NaN).
    pub fn get_f64(&self, field: &str) -> f64 {
        self.values.get(field).map(value_to_f64).unwrap_or(f64::NAN)
    }

    /// 저장용 JSON 문서로 변환합니다.
    pub fn to_document(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// JSON 문서에서 레코드를 생성합니다.
    ///
    /// `time_field`가 `datetime`이 아니면 해당 필드를 시간축으로 사용합니다.
    pub fn from_document(document: Value, time_field: &str) -> CoreResult<Self> {
        let Value::Object(mut values) = document else {
            return Err(CoreError::InvalidInput("문서가 JSON 객체가 아닙니다".to_string()));
        };

        let raw = values
            .remove(time_field)
            .ok_or_else(|| CoreError::InvalidInput(format!("'{}' 필드가 없습니다", time_field)))?;
        let datetime: DateTime<Utc> = serde_json::from_value(raw)?;

        Ok(Self { datetime, values })
    }
}

/// JSON 값을 f64로 변환합니다.
///
/// 숫자는 그대로, 불리언은 1.0/0.0, 숫자 문자열은 파싱하며
/// 그 외에는 NaN입니다.
pub fn value_to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => s.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
