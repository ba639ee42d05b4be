//! `execute` 명령: 명령줄 인자로 데이터 조회.
//!
//! 인자는 위치 인자 또는 `key=value`이며 쉼표가 들어간 값은 목록입니다.
//!
//! ```text
//! fxdata execute history EUR_USD,GBP_USD D length=20 fields=close,volume
//! fxdata execute current instruments=EUR_USD frequency=H1
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use market_core::{Granularity, Instrument};
use market_data::{HistoryRequest, MarketDataService};
use serde_json::Value;

use crate::error::{CollectorError, Result};

/// 인자 값 (단일 또는 쉼표 목록)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Single(String),
    List(Vec<String>),
}

impl ArgValue {
    fn parse(raw: &str) -> Self {
        if raw.contains(',') {
            Self::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        } else {
            Self::Single(raw.to_string())
        }
    }

    /// 목록으로 변환 (단일 값은 원소 하나)
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value.clone()],
            Self::List(values) => values.clone(),
        }
    }

    fn single(&self, key: &str) -> Result<&str> {
        match self {
            Self::Single(value) => Ok(value),
            Self::List(_) => Err(CollectorError::Args(format!("{}: 값은 하나여야 합니다", key))),
        }
    }
}

/// 파싱된 `execute` 인자
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteArgs {
    pub positional: Vec<ArgValue>,
    pub named: BTreeMap<String, ArgValue>,
}

impl ExecuteArgs {
    /// 인자 목록 파싱
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = Self::default();
        for arg in args {
            match arg.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim();
                    if key.is_empty() {
                        return Err(CollectorError::Args(format!("잘못된 인자: {}", arg)));
                    }
                    parsed.named.insert(key.to_string(), ArgValue::parse(value));
                }
                None => parsed.positional.push(ArgValue::parse(arg)),
            }
        }
        Ok(parsed)
    }

    /// 이름 또는 위치로 인자 조회 (이름이 우선)
    fn get(&self, key: &str, position: usize) -> Option<&ArgValue> {
        self.named.get(key).or_else(|| self.positional.get(position))
    }
}

const HISTORY_KEYS: [&str; 7] = ["instruments", "frequency", "fields", "start", "end", "length", "db"];
const CURRENT_KEYS: [&str; 2] = ["instruments", "frequency"];

/// `history` 인자를 조회 요청으로 변환
///
/// 위치 인자 순서: instruments, frequency, fields, start, end, length, db.
pub fn history_request(args: &ExecuteArgs) -> Result<HistoryRequest> {
    check_keys(args, &HISTORY_KEYS)?;
    let mut request = HistoryRequest::new();

    if let Some(value) = args.get("instruments", 0) {
        request = request.with_instruments(instruments(value));
    }
    if let Some(value) = args.get("frequency", 1) {
        request = request.with_frequency(granularity(value.single("frequency")?)?);
    }
    if let Some(value) = args.get("fields", 2) {
        request = request.with_fields(value.to_list());
    }
    if let Some(value) = args.get("start", 3) {
        request = request.with_start(parse_datetime(value.single("start")?)?);
    }
    if let Some(value) = args.get("end", 4) {
        request = request.with_end(parse_datetime(value.single("end")?)?);
    }
    if let Some(value) = args.get("length", 5) {
        let raw = value.single("length")?;
        let length = raw
            .parse()
            .map_err(|_| CollectorError::Args(format!("length: 숫자가 아닙니다: {}", raw)))?;
        request = request.with_length(length);
    }
    if let Some(value) = args.get("db", 6) {
        request = request.with_db(value.single("db")?);
    }

    Ok(request)
}

/// 조회 명령 실행 후 결과를 JSON으로 반환
pub async fn execute(service: &MarketDataService, read: &str, args: &[String]) -> Result<Value> {
    let args = ExecuteArgs::parse(args)?;

    match read {
        "history" => {
            let panel = service.history(history_request(&args)?).await?;
            Ok(serde_json::to_value(&panel)?)
        }
        "current" => {
            check_keys(&args, &CURRENT_KEYS)?;
            let instruments = args.get("instruments", 0).map(instruments);
            let frequency = args
                .get("frequency", 1)
                .map(|v| v.single("frequency").and_then(granularity))
                .transpose()?;

            let rows = service
                .current_for(instruments.as_deref(), frequency)
                .await?;
            Ok(serde_json::to_value(&rows)?)
        }
        other => Err(CollectorError::Args(format!(
            "알 수 없는 조회: {} (history, current)",
            other
        ))),
    }
}

/// 날짜/시간 파싱 (RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`)
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(CollectorError::Args(format!("날짜 형식이 아닙니다: {}", raw)))
}

fn instruments(value: &ArgValue) -> Vec<Instrument> {
    value.to_list().into_iter().map(Instrument::from).collect()
}

fn granularity(raw: &str) -> Result<Granularity> {
    raw.parse()
        .map_err(|e: String| CollectorError::Args(format!("frequency: {}", e)))
}

fn check_keys(args: &ExecuteArgs, allowed: &[&str]) -> Result<()> {
    if args.positional.len() > allowed.len() {
        return Err(CollectorError::Args(format!(
            "위치 인자가 너무 많습니다 (최대 {})",
            allowed.len()
        )));
    }
    match args.named.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(CollectorError::Args(format!("알 수 없는 인자: {}", key))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use market_core::Record;
    use market_data::{DocumentStore, FieldMappers, MemoryStore};
    use std::sync::Arc;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_positional_and_named() {
        let parsed = ExecuteArgs::parse(&args(&["EUR_USD,GBP_USD", "D", "length=20"])).unwrap();

        assert_eq!(
            parsed.positional,
            vec![
                ArgValue::List(vec!["EUR_USD".to_string(), "GBP_USD".to_string()]),
                ArgValue::Single("D".to_string()),
            ]
        );
        assert_eq!(parsed.named["length"], ArgValue::Single("20".to_string()));
    }

    #[test]
    fn test_history_request_from_args() {
        let parsed = ExecuteArgs::parse(&args(&[
            "EUR_USD",
            "H1",
            "fields=close,volume",
            "end=2016-01-05",
            "length=3",
        ]))
        .unwrap();
        let request = history_request(&parsed).unwrap();

        assert_eq!(request.instruments, Some(vec![Instrument::from("EUR_USD")]));
        assert_eq!(request.frequency, Some(Granularity::H1));
        assert_eq!(
            request.fields,
            Some(vec!["close".to_string(), "volume".to_string()])
        );
        assert_eq!(
            request.end,
            Some(Utc.with_ymd_and_hms(2016, 1, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(request.length, Some(3));
    }

    #[test]
    fn test_invalid_arguments() {
        let parsed = ExecuteArgs::parse(&args(&["EUR_USD", "X9"])).unwrap();
        assert!(matches!(history_request(&parsed), Err(CollectorError::Args(_))));

        let parsed = ExecuteArgs::parse(&args(&["bogus=1"])).unwrap();
        assert!(history_request(&parsed).is_err());

        assert!(ExecuteArgs::parse(&args(&["=1"])).is_err());
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2016, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_datetime("2016-03-01T12:30:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("2016-03-01 12:30:00").unwrap(), expected);
        assert!(parse_datetime("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_execute_history_and_current() {
        let store = Arc::new(MemoryStore::new("oanda"));
        let records: Vec<Record> = (0..5)
            .map(|d| {
                Record::new(Utc.with_ymd_and_hms(2016, 1, 1 + d, 0, 0, 0).unwrap())
                    .with_value("close", d as f64)
            })
            .collect();
        store.write(&records, "EUR_USD.D", None).await.unwrap();

        let as_of = Utc.with_ymd_and_hms(2016, 1, 4, 0, 0, 0).unwrap();
        let service = MarketDataService::new(store, FieldMappers::new()).with_as_of(as_of);

        let value = execute(
            &service,
            "history",
            &args(&["EUR_USD", "D", "fields=close", "length=2"]),
        )
        .await
        .unwrap();
        let close = &value["tables"]["EUR_USD"]["columns"]["close"];
        assert_eq!(close, &serde_json::json!([2.0, 3.0]));

        let value = execute(&service, "current", &args(&["EUR_USD", "frequency=D"]))
            .await
            .unwrap();
        assert_eq!(value["EUR_USD"]["values"]["close"], serde_json::json!(3.0));

        assert!(execute(&service, "extract", &[]).await.is_err());
    }
}
