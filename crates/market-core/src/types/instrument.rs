//! 종목 식별자와 컬렉션 키.

use crate::error::CoreError;
use crate::types::{Dataset, Granularity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 종목 식별자 (예: "EUR_USD").
///
/// 동등성/정렬 외의 내부 구조는 가정하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    /// 새 종목 식별자를 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 문자열 참조를 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 쉼표로 구분된 목록을 파싱합니다 (예: "EUR_USD,GBP_USD").
    pub fn parse_list(s: &str) -> Vec<Instrument> {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Instrument::new)
            .collect()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Instrument {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Instrument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 저장소 컬렉션 키를 생성합니다: `{instrument}.{granularity}`.
pub fn collection_key(instrument: &Instrument, granularity: Granularity) -> String {
    format!("{}.{}", instrument, granularity)
}

/// 컬렉션 키를 종목과 캔들 주기로 분리합니다.
pub fn split_collection_key(key: &str) -> Result<(Instrument, Granularity), CoreError> {
    let mut parts = key.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(instrument), Some(granularity), None) if !instrument.is_empty() => {
            let granularity = granularity
                .parse()
                .map_err(|_| CoreError::InvalidCollectionKey(key.to_string()))?;
            Ok((Instrument::new(instrument), granularity))
        }
        _ => Err(CoreError::InvalidCollectionKey(key.to_string())),
    }
}

/// 보조 데이터셋 컬렉션 키를 생성합니다: `{instrument}.{dataset}`.
pub fn dataset_collection_key(instrument: &Instrument, dataset: Dataset) -> String {
    format!("{}.{}", instrument, dataset)
}

/// 컬렉션 종류.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionKind {
    /// 캔들 컬렉션
    Candles(Instrument, Granularity),
    /// 보조 데이터셋 컬렉션
    Dataset(Instrument, Dataset),
}

/// 컬렉션 키를 캔들 또는 보조 데이터셋으로 분리합니다.
pub fn parse_collection_key(key: &str) -> Result<CollectionKind, CoreError> {
    if let Some((instrument, code)) = key.split_once('.') {
        if !instrument.is_empty() {
            if let Ok(dataset) = code.parse::<Dataset>() {
                return Ok(CollectionKind::Dataset(Instrument::new(instrument), dataset));
            }
        }
    }
    let (instrument, granularity) = split_collection_key(key)?;
    Ok(CollectionKind::Candles(instrument, granularity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_key_roundtrip() {
        let key = collection_key(&Instrument::from("EUR_USD"), Granularity::M15);
        assert_eq!(key, "EUR_USD.M15");

        let (instrument, granularity) = split_collection_key(&key).unwrap();
        assert_eq!(instrument.as_str(), "EUR_USD");
        assert_eq!(granularity, Granularity::M15);
    }

    #[test]
    fn test_split_invalid_keys() {
        assert!(split_collection_key("EUR_USD").is_err());
        assert!(split_collection_key("EUR_USD.D.extra").is_err());
        assert!(split_collection_key(".D").is_err());
        // 보조 데이터셋(HPR 등)은 캔들 컬렉션이 아님
        assert!(split_collection_key("EUR_USD.HPR").is_err());
    }

    #[test]
    fn test_parse_collection_key() {
        assert_eq!(
            parse_collection_key("EUR_USD.H4").unwrap(),
            CollectionKind::Candles(Instrument::from("EUR_USD"), Granularity::H4)
        );
        assert_eq!(
            parse_collection_key("EUR_USD.HPR").unwrap(),
            CollectionKind::Dataset(Instrument::from("EUR_USD"), Dataset::PositionRatios)
        );
        assert_eq!(
            dataset_collection_key(&Instrument::from("USD_JPY"), Dataset::Calendar),
            "USD_JPY.CLD"
        );
        assert!(parse_collection_key(".COT").is_err());
        assert!(parse_collection_key("EUR_USD.XYZ").is_err());
    }

    #[test]
    fn test_parse_list() {
        let list = Instrument::parse_list("EUR_USD, GBP_USD,,");
        assert_eq!(list, vec![Instrument::from("EUR_USD"), Instrument::from("GBP_USD")]);
    }
}
