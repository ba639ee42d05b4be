//! 다종목 패널.
//!
//! 같은 주기의 여러 종목 테이블을 묶습니다. 캐시 스냅샷은 정렬된 패널을
//! 보관하며, 정렬 시 모든 종목은 시간축의 합집합을 공유하고 없는 봉은
//! NaN 행이 됩니다 (가격 데이터를 앞 값으로 채우지 않음).

use std::collections::{btree_map, BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::table::Table;
use crate::error::CoreResult;
use crate::types::{Granularity, Instrument};

/// 종목별 테이블 묶음.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiTable {
    /// 캔들 주기
    pub frequency: Granularity,
    tables: BTreeMap<Instrument, Table>,
}

impl MultiTable {
    /// 빈 패널을 생성합니다.
    pub fn new(frequency: Granularity) -> Self {
        Self {
            frequency,
            tables: BTreeMap::new(),
        }
    }

    /// 종목 테이블을 추가합니다.
    pub fn insert(&mut self, instrument: Instrument, table: Table) {
        self.tables.insert(instrument, table);
    }

    pub fn get(&self, instrument: &Instrument) -> Option<&Table> {
        self.tables.get(instrument)
    }

    /// 포함된 종목 목록 (정렬됨).
    pub fn instruments(&self) -> Vec<Instrument> {
        self.tables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Instrument, Table> {
        self.tables.iter()
    }

    pub fn into_tables(self) -> BTreeMap<Instrument, Table> {
        self.tables
    }

    /// 모든 종목 시간축의 합집합 (오름차순).
    pub fn union_axis(&self) -> Vec<DateTime<Utc>> {
        self.tables
            .values()
            .flat_map(|t| t.index().iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 합집합 시간축으로 정렬된 패널을 반환합니다.
    pub fn align(&self) -> CoreResult<MultiTable> {
        let axis = self.union_axis();
        let mut aligned = MultiTable::new(self.frequency);
        for (instrument, table) in &self.tables {
            aligned.insert(instrument.clone(), table.reindex(&axis)?);
        }
        Ok(aligned)
    }
}

impl<'a> IntoIterator for &'a MultiTable {
    type Item = (&'a Instrument, &'a Table);
    type IntoIter = btree_map::Iter<'a, Instrument, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Record;
    use chrono::{Duration, TimeZone};

    fn hour(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 3, 1, 0, 0, 0).unwrap() + Duration::hours(n)
    }

    fn table(hours: &[i64]) -> Table {
        let records: Vec<Record> = hours
            .iter()
            .map(|h| Record::new(hour(*h)).with_value("close", *h as f64))
            .collect();
        Table::from_records(&records, None).unwrap()
    }

    #[test]
    fn test_align_union_axis() {
        let mut panel = MultiTable::new(Granularity::H1);
        panel.insert(Instrument::from("EUR_USD"), table(&[0, 1, 3]));
        panel.insert(Instrument::from("USD_JPY"), table(&[1, 2]));

        assert_eq!(panel.union_axis(), vec![hour(0), hour(1), hour(2), hour(3)]);

        let aligned = panel.align().unwrap();
        let eur = aligned.get(&Instrument::from("EUR_USD")).unwrap();
        let jpy = aligned.get(&Instrument::from("USD_JPY")).unwrap();

        assert_eq!(eur.len(), 4);
        assert_eq!(jpy.len(), 4);
        assert!(eur.column("close").unwrap()[2].is_nan());
        assert!(jpy.column("close").unwrap()[0].is_nan());
        assert_eq!(jpy.column("close").unwrap()[2], 2.0);
    }

    #[test]
    fn test_instruments_sorted() {
        let mut panel = MultiTable::new(Granularity::D);
        panel.insert(Instrument::from("USD_JPY"), Table::default());
        panel.insert(Instrument::from("EUR_USD"), Table::default());

        assert_eq!(
            panel.instruments(),
            vec![Instrument::from("EUR_USD"), Instrument::from("USD_JPY")]
        );
        assert_eq!(panel.len(), 2);
    }
}
