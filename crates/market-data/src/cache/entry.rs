//! 주기별 캐시 스냅샷.
//!
//! `init`이 만든 스냅샷은 불변이며 새 `init`이 통째로 교체합니다.
//! 조회 결과의 모양(종목 수, 행 수, 필드)이 요청과 정확히 맞지 않으면
//! `CacheMiss`를 반환하고 호출자는 저장소 조회로 넘어갑니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use market_core::{Granularity, Instrument, MultiTable, Row, Table};

use crate::error::{DataError, Result};
use crate::time_axis::{locate_at_or_before, slice_for_window};

/// 주기별 캐시 스냅샷.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    frequency: Granularity,
    db: String,
    axis: Vec<DateTime<Utc>>,
    panel: MultiTable,
    loaded_start: Option<DateTime<Utc>>,
    loaded_end: DateTime<Utc>,
}

impl CacheEntry {
    /// 패널을 합집합 시간축으로 정렬해 스냅샷을 만듭니다.
    ///
    /// `loaded_start`/`loaded_end`는 저장소에서 읽은 구간입니다. `loaded_start`가
    /// 없으면 컬렉션의 처음부터 읽은 것입니다.
    pub fn new(
        panel: MultiTable,
        db: impl Into<String>,
        loaded_start: Option<DateTime<Utc>>,
        loaded_end: DateTime<Utc>,
    ) -> Result<Self> {
        let panel = panel.align()?;
        let axis = panel.union_axis();

        Ok(Self {
            frequency: panel.frequency,
            db: db.into(),
            axis,
            panel,
            loaded_start,
            loaded_end,
        })
    }

    pub fn frequency(&self) -> Granularity {
        self.frequency
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    /// 캐시된 종목 목록 (정렬됨).
    pub fn instruments(&self) -> Vec<Instrument> {
        self.panel.instruments()
    }

    /// 공유 시간축.
    pub fn axis(&self) -> &[DateTime<Utc>] {
        &self.axis
    }

    /// 정렬된 패널.
    pub fn panel(&self) -> &MultiTable {
        &self.panel
    }

    /// 읽어 둔 구간 `[loaded_start, loaded_end]`.
    pub fn loaded_range(&self) -> (Option<DateTime<Utc>>, DateTime<Utc>) {
        (self.loaded_start, self.loaded_end)
    }

    /// `as_of` 시점의 종목별 마지막 봉.
    ///
    /// 정렬로 생긴 NaN 행은 건너뛰고 종목의 실제 마지막 봉을 찾습니다.
    pub fn current(
        &self,
        instruments: &[Instrument],
        as_of: DateTime<Utc>,
    ) -> Result<BTreeMap<Instrument, Row>> {
        if as_of > self.loaded_end {
            return Err(miss(format!("as_of {} is after loaded range", as_of)));
        }

        let last = locate_at_or_before(&self.axis, &as_of)
            .ok_or_else(|| miss("empty snapshot".to_string()))?;
        if self.axis[last] > as_of {
            return Err(miss(format!("no bar at or before {}", as_of)));
        }

        let mut rows = BTreeMap::new();
        for instrument in instruments {
            let table = self.table(instrument)?;
            let row = (0..=last)
                .rev()
                .filter_map(|i| table.row(i))
                .find(|row| row.values.values().any(|v| !v.is_nan()))
                .ok_or_else(|| miss(format!("no bar for {}", instrument)))?;
            rows.insert(instrument.clone(), row);
        }

        Ok(rows)
    }

    /// 윈도우 조회.
    ///
    /// 모든 종목이 정확히 `length`행과 요청 필드를 가져야 적중입니다.
    /// `length`가 없으면 구간이 완전한지 확인할 수 없으므로 미스입니다.
    pub fn history(
        &self,
        instruments: &[Instrument],
        fields: &[String],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        length: Option<usize>,
        as_of: DateTime<Utc>,
    ) -> Result<MultiTable> {
        let length = length.ok_or_else(|| miss("length not given".to_string()))?;

        let effective_end = end.map_or(as_of, |end| end.min(as_of));
        if effective_end > self.loaded_end {
            return Err(miss(format!("{} is after loaded range", effective_end)));
        }
        if let (Some(start), Some(loaded_start)) = (start, self.loaded_start) {
            if start < loaded_start {
                return Err(miss(format!("{} is before loaded range", start)));
            }
        }
        match self.axis.first() {
            Some(first) if *first <= effective_end => {}
            _ => return Err(miss(format!("no bar at or before {}", effective_end))),
        }

        let range = slice_for_window(
            &self.axis,
            &as_of,
            start.as_ref(),
            end.as_ref(),
            Some(length),
        )
        .map_err(|e| miss(e.to_string()))?;

        let mut result = MultiTable::new(self.frequency);
        for instrument in instruments {
            let window = self.table(instrument)?.slice(range.clone());
            if has_gap_rows(&window) {
                return Err(miss(format!("{} has no bar inside the window", instrument)));
            }

            let table = window
                .select(fields)
                .ok_or_else(|| miss(format!("missing fields for {}", instrument)))?;

            if table.len() != length {
                return Err(miss(format!(
                    "{} has {} rows, {} requested",
                    instrument,
                    table.len(),
                    length
                )));
            }
            result.insert(instrument.clone(), table);
        }

        if result.len() != instruments.len() {
            return Err(miss(format!(
                "{} instruments requested, {} returned",
                instruments.len(),
                result.len()
            )));
        }

        Ok(result)
    }

    fn table(&self, instrument: &Instrument) -> Result<&Table> {
        self.panel
            .get(instrument)
            .ok_or_else(|| miss(format!("{} not cached", instrument)))
    }
}

fn miss(reason: String) -> DataError {
    DataError::CacheMiss(reason)
}

/// 정렬로 채워진 (모든 컬럼이 NaN인) 행이 있는지 확인합니다.
fn has_gap_rows(table: &Table) -> bool {
    let columns: Vec<&[f64]> = table
        .field_names()
        .into_iter()
        .filter_map(|f| table.column(f))
        .collect();

    (0..table.len()).any(|i| columns.iter().all(|c| c[i].is_nan()))
}
