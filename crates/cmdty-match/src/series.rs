//! Core time-series types shared by every stage: raw level series as delivered
//! by a vendor, calendar-month periods, and dense monthly return series.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar month. Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Option<Self> {
        Self::new(date.year(), date.month())
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    /// Months elapsed since year 0, used for gap arithmetic.
    pub fn ordinal(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        let year = i32::try_from(ordinal.div_euclid(12)).ok()?;
        Self::new(year, ordinal.rem_euclid(12) as u32 + 1)
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(self, other: Self) -> i64 {
        other.ordinal() - self.ordinal()
    }

    pub fn last_day(self) -> u32 {
        match self.month {
            4 | 6 | 9 | 11 => 30,
            2 if is_leap_year(self.year) => 29,
            2 => 28,
            _ => 31,
        }
    }

    pub fn yyyymm(self) -> u32 {
        self.year as u32 * 100 + self.month
    }

    /// Month-end date rendered as `YYYY-MM-DD`.
    pub fn month_end_string(self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.last_day())
    }

    /// Accepts `YYYYMM`, `YYYY-MM` and `YYYY-MM-DD`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() == 6 && value.bytes().all(|b| b.is_ascii_digit()) {
            let year = value[..4].parse().ok()?;
            let month = value[4..].parse().ok()?;
            return Self::new(year, month);
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Self::from_date(date);
        }
        let (year, month) = value.split_once('-')?;
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub level: Option<f64>,
}

/// Level series for one instrument in delivery order. Timestamps may be
/// unsorted or duplicated and levels may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    pub label: String,
    pub observations: Vec<RawObservation>,
}

impl RawSeries {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), observations: Vec::new() }
    }

    pub fn from_pairs(
        label: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, Option<f64>)>,
    ) -> Self {
        let observations =
            pairs.into_iter().map(|(date, level)| RawObservation { date, level }).collect();
        Self { label: label.into(), observations }
    }

    pub fn push(&mut self, date: NaiveDate, level: Option<f64>) {
        self.observations.push(RawObservation { date, level });
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Whether an index level already nets out the riskless rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSemantics {
    #[default]
    Excess,
    Total,
}

/// Dense monthly return series. Periods are consecutive calendar months with
/// no duplicates; `None` marks a month whose return is undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    label: String,
    semantics: IndexSemantics,
    start: Option<Period>,
    values: Vec<Option<f64>>,
}

impl ReturnSeries {
    pub fn empty(label: impl Into<String>, semantics: IndexSemantics) -> Self {
        Self { label: label.into(), semantics, start: None, values: Vec::new() }
    }

    /// Builds a series from consecutive months beginning at `start`.
    /// Non-finite values become missing markers.
    pub fn from_dense(
        label: impl Into<String>,
        semantics: IndexSemantics,
        start: Period,
        values: Vec<Option<f64>>,
    ) -> Self {
        let values = values.into_iter().map(|v| v.filter(|x| x.is_finite())).collect::<Vec<_>>();
        let start = if values.is_empty() { None } else { Some(start) };
        Self { label: label.into(), semantics, start, values }
    }

    /// Builds a series from already return-denominated `(period, value)` rows
    /// in any order. A repeated period keeps the last row; months between the
    /// first and last period that have no row are missing.
    pub fn from_returns(
        label: impl Into<String>,
        semantics: IndexSemantics,
        rows: impl IntoIterator<Item = (Period, Option<f64>)>,
    ) -> Self {
        let mut by_period: BTreeMap<Period, Option<f64>> = BTreeMap::new();
        for (period, value) in rows {
            by_period.insert(period, value);
        }
        let (first, last) = match (by_period.keys().next(), by_period.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Self::empty(label, semantics),
        };

        let span = first.months_until(last) as usize + 1;
        let mut values = vec![None; span];
        for (period, value) in by_period {
            values[first.months_until(period) as usize] = value;
        }
        Self::from_dense(label, semantics, first, values)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn semantics(&self) -> IndexSemantics {
        self.semantics
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_period(&self) -> Option<Period> {
        self.start
    }

    pub fn last_period(&self) -> Option<Period> {
        let start = self.start?;
        Period::from_ordinal(start.ordinal() + self.values.len() as i64 - 1)
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn get(&self, period: Period) -> Option<f64> {
        let start = self.start?;
        let offset = start.months_until(period);
        if offset < 0 {
            return None;
        }
        self.values.get(offset as usize).copied().flatten()
    }

    /// Every month in the span with its value or missing marker.
    pub fn iter(&self) -> impl Iterator<Item = (Period, Option<f64>)> + '_ {
        // `start` is always set when `values` is non-empty.
        let start = self.start.unwrap_or(Period { year: 1, month: 1 });
        self.values.iter().scan(start, |period, value| {
            let current = *period;
            *period = current.succ();
            Some((current, *value))
        })
    }

    /// Months with a defined return, in chronological order.
    pub fn defined(&self) -> impl Iterator<Item = (Period, f64)> + '_ {
        self.iter().filter_map(|(period, value)| value.map(|v| (period, v)))
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Series keyed by label, iterated in lexical label order.
pub type SeriesSet = BTreeMap<String, ReturnSeries>;

/// Vendor series keyed by opaque source label.
pub type CandidateSet = SeriesSet;

/// Reference series keyed by canonical commodity identity.
pub type ReferenceSet = SeriesSet;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_arithmetic_crosses_year_boundary() {
        let nov = Period::new(2023, 11).expect("valid period");
        let feb = Period::new(2024, 2).expect("valid period");
        assert_eq!(nov.months_until(feb), 3);
        assert_eq!(nov.succ().succ(), Period::new(2024, 1).expect("valid period"));
        assert_eq!(feb.last_day(), 29);
        assert_eq!(feb.month_end_string(), "2024-02-29");
    }

    #[test]
    fn period_parse_accepts_common_layouts() {
        let expected = Period::new(1999, 7);
        assert_eq!(Period::parse("199907"), expected);
        assert_eq!(Period::parse("1999-07"), expected);
        assert_eq!(Period::parse("1999-07-31"), expected);
        assert_eq!(Period::parse("1999-13"), None);
        assert_eq!(Period::parse("July 1999"), None);
    }

    #[test]
    fn from_returns_fills_gaps_and_keeps_last_duplicate() {
        let jan = Period::new(2020, 1).expect("valid period");
        let mar = Period::new(2020, 3).expect("valid period");
        let series = ReturnSeries::from_returns(
            "x",
            IndexSemantics::Excess,
            vec![(mar, Some(0.03)), (jan, Some(0.01)), (jan, Some(0.02)), (mar, Some(f64::NAN))],
        );
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(jan), Some(0.02));
        assert_eq!(series.get(jan.succ()), None);
        assert_eq!(series.get(mar), None);
        assert_eq!(series.last_period(), Some(mar));
        assert_eq!(series.defined_count(), 1);
    }
}
