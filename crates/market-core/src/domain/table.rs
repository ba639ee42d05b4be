//! 시계열 테이블.
//!
//! 단일 종목/주기의 캔들을 시간 인덱스와 필드별 컬럼으로 보관합니다.
//! 인덱스는 중복 없이 엄격하게 증가해야 합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::record::{value_to_f64, Record, TIME_FIELD};
use crate::error::{CoreError, CoreResult};

/// 시계열 테이블.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    index: Vec<DateTime<Utc>>,
    columns: BTreeMap<String, Vec<f64>>,
}

/// 테이블의 한 행.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// 캔들 시간
    pub datetime: DateTime<Utc>,
    /// 필드별 값
    pub values: BTreeMap<String, f64>,
}

impl Row {
    /// 필드 값을 조회합니다.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

impl Table {
    /// 인덱스와 컬럼으로 테이블을 생성합니다.
    ///
    /// # Errors
    /// 인덱스가 엄격하게 증가하지 않거나 컬럼 길이가 다르면 에러를 반환합니다.
    pub fn new(
        index: Vec<DateTime<Utc>>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> CoreResult<Self> {
        if let Some(position) = index.windows(2).position(|w| w[0] >= w[1]) {
            return Err(CoreError::UnsortedIndex {
                position: position + 1,
            });
        }

        for (name, values) in &columns {
            if values.len() != index.len() {
                return Err(CoreError::ColumnLength {
                    column: name.clone(),
                    expected: index.len(),
                    actual: values.len(),
                });
            }
        }

        Ok(Self { index, columns })
    }

    /// 시간순 레코드에서 테이블을 생성합니다.
    ///
    /// `fields`가 주어지면 해당 필드만 컬럼으로 만들고 (시간축 필드는 인덱스로
    /// 사용되므로 제외), 없으면 레코드에 등장하는 모든 필드를 사용합니다.
    /// 레코드에 없는 값은 NaN입니다.
    pub fn from_records(records: &[Record], fields: Option<&[String]>) -> CoreResult<Self> {
        let names: BTreeSet<String> = match fields {
            Some(fields) => fields
                .iter()
                .filter(|f| f.as_str() != TIME_FIELD)
                .cloned()
                .collect(),
            None => records
                .iter()
                .flat_map(|r| r.values.keys())
                .filter(|f| f.as_str() != TIME_FIELD)
                .cloned()
                .collect(),
        };

        let index = records.iter().map(|r| r.datetime).collect();
        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(&name).map(value_to_f64).unwrap_or(f64::NAN))
                    .collect();
                (name, values)
            })
            .collect();

        Self::new(index, columns)
    }

    /// 행 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 시간 인덱스를 반환합니다.
    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    /// 컬럼 값을 반환합니다.
    pub fn column(&self, field: &str) -> Option<&[f64]> {
        self.columns.get(field).map(Vec::as_slice)
    }

    /// 필드 이름 목록을 반환합니다.
    pub fn field_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// 첫 번째 시간을 반환합니다.
    pub fn first_datetime(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    /// 마지막 시간을 반환합니다.
    pub fn last_datetime(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    /// 반열린 구간의 행을 잘라냅니다. 범위는 테이블 길이로 제한됩니다.
    pub fn slice(&self, range: Range<usize>) -> Table {
        let end = range.end.min(self.len());
        let start = range.start.min(end);

        Table {
            index: self.index[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[start..end].to_vec()))
                .collect(),
        }
    }

    /// 지정한 필드만 선택합니다. 하나라도 없으면 `None`입니다.
    pub fn select(&self, fields: &[String]) -> Option<Table> {
        let mut columns = BTreeMap::new();
        for field in fields.iter().filter(|f| f.as_str() != TIME_FIELD) {
            columns.insert(field.clone(), self.columns.get(field)?.clone());
        }

        Some(Table {
            index: self.index.clone(),
            columns,
        })
    }

    /// 컬럼 이름을 변환합니다. 매핑에 없는 이름은 그대로 둡니다.
    pub fn rename_columns(self, mapping: &BTreeMap<String, String>) -> Table {
        let columns = self
            .columns
            .into_iter()
            .map(|(name, values)| (mapping.get(&name).cloned().unwrap_or(name), values))
            .collect();

        Table {
            index: self.index,
            columns,
        }
    }

    /// 주어진 시간축으로 재색인합니다. 없는 시간은 NaN 행이 됩니다.
    ///
    /// `axis`는 엄격하게 증가해야 합니다.
    pub fn reindex(&self, axis: &[DateTime<Utc>]) -> CoreResult<Table> {
        let positions: Vec<Option<usize>> = axis
            .iter()
            .map(|t| self.index.binary_search(t).ok())
            .collect();

        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let aligned = positions
                    .iter()
                    .map(|p| p.map(|i| values[i]).unwrap_or(f64::NAN))
                    .collect();
                (name.clone(), aligned)
            })
            .collect();

        Table::new(axis.to_vec(), columns)
    }

    /// i번째 행을 반환합니다.
    pub fn row(&self, i: usize) -> Option<Row> {
        let datetime = *self.index.get(i)?;
        let values = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), values[i]))
            .collect();

        Some(Row { datetime, values })
    }

    /// 마지막 행을 반환합니다.
    pub fn last_row(&self) -> Option<Row> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }
}
