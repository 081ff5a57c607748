//! Flat-table boundaries: vendor level tables in, reference factors in, the
//! matched panel out. Readers and writers are generic over `Read`/`Write` so
//! callers decide where the bytes live.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::panel::OutputPanel;
use crate::series::{IndexSemantics, Period, RawSeries, ReferenceSet, ReturnSeries};

const PX_LAST_SUFFIX: &str = "_PX_LAST";
const HKM_PERIOD_COLUMN: &str = "yyyymm";
const HKM_COMMODITY_PREFIX: &str = "Commod_";

#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(String),
    #[error("line {line}: invalid date '{value}'")]
    InvalidDate { line: usize, value: String },
    #[error("line {line}: invalid period '{value}'")]
    InvalidPeriod { line: usize, value: String },
    #[error("line {line}, column '{column}': invalid number '{value}'")]
    InvalidNumber { line: usize, column: String, value: String },
}

pub type IoResult<T> = Result<T, IoError>;

#[derive(Debug, Deserialize)]
struct LevelRecord {
    id: String,
    date: String,
    level: String,
}

#[derive(Debug, Deserialize)]
struct ReferenceRecord {
    id: String,
    period: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct PanelRecord<'a> {
    unique_id: &'a str,
    ds: String,
    y: f64,
}

/// Groups `(identity, date, level)` rows into one raw series per identity,
/// keeping row order within each identity.
pub fn raw_series_from_rows(
    rows: impl IntoIterator<Item = (String, NaiveDate, Option<f64>)>,
) -> Vec<RawSeries> {
    let mut by_label: BTreeMap<String, RawSeries> = BTreeMap::new();
    for (label, date, level) in rows {
        by_label.entry(label.clone()).or_insert_with(|| RawSeries::new(label)).push(date, level);
    }
    by_label.into_values().collect()
}

/// Long vendor table with headers `id,date,level`. Empty or `NaN` levels are
/// kept as absent observations.
pub fn read_raw_levels_long<R: Read>(reader: R) -> IoResult<Vec<RawSeries>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize::<LevelRecord>().enumerate() {
        let record = result?;
        let line = idx + 2;
        let date = parse_date(line, &record.date)?;
        let level = parse_number(line, "level", &record.level)?;
        rows.push((record.id, date, level));
    }
    Ok(raw_series_from_rows(rows))
}

/// Wide vendor table: first column is the date, every other column one
/// instrument. A trailing `_PX_LAST` is stripped from column names.
pub fn read_raw_levels_wide<R: Read>(reader: R) -> IoResult<Vec<RawSeries>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(IoError::MissingColumn("at least one instrument column".to_string()));
    }

    let columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, name)| !name.is_empty())
        .map(|(i, name)| (i, name.strip_suffix(PX_LAST_SUFFIX).unwrap_or(name).to_string()))
        .collect();
    let mut series: Vec<RawSeries> =
        columns.iter().map(|(_, label)| RawSeries::new(label.clone())).collect();

    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        let line = idx + 2;
        let date = parse_date(line, field(&record, 0))?;
        for ((col, name), out) in columns.iter().zip(series.iter_mut()) {
            out.push(date, parse_number(line, name, field(&record, *col))?);
        }
    }
    Ok(series)
}

/// Long reference table with headers `id,period,value`, already
/// return-denominated. Periods may be `YYYYMM`, `YYYY-MM` or a date.
pub fn read_reference_long<R: Read>(reader: R, semantics: IndexSemantics) -> IoResult<ReferenceSet> {
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(reader);
    let mut grouped: BTreeMap<String, Vec<(Period, Option<f64>)>> = BTreeMap::new();
    for (idx, result) in rdr.deserialize::<ReferenceRecord>().enumerate() {
        let record = result?;
        let line = idx + 2;
        let period = parse_period(line, &record.period)?;
        let value = parse_number(line, "value", &record.value)?;
        grouped.entry(record.id).or_default().push((period, value));
    }
    Ok(grouped
        .into_iter()
        .map(|(id, rows)| {
            let series = ReturnSeries::from_returns(id.clone(), semantics, rows);
            (id, series)
        })
        .collect())
}

/// He-Kelly-Manela factor table: keeps the `Commod_XX` columns keyed by the
/// `yyyymm` column. With `drop_incomplete_rows`, a month missing any
/// commodity factor is dropped for all of them.
pub fn read_hkm_commodity_factors<R: Read>(
    reader: R,
    drop_incomplete_rows: bool,
) -> IoResult<ReferenceSet> {
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let period_col = headers
        .iter()
        .position(|h| h == HKM_PERIOD_COLUMN)
        .ok_or_else(|| IoError::MissingColumn(HKM_PERIOD_COLUMN.to_string()))?;
    let factor_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.starts_with(HKM_COMMODITY_PREFIX))
        .map(|(i, h)| (i, h.to_string()))
        .collect();
    if factor_cols.is_empty() {
        return Err(IoError::MissingColumn(format!("{HKM_COMMODITY_PREFIX}*")));
    }

    let mut grouped: Vec<Vec<(Period, Option<f64>)>> = vec![Vec::new(); factor_cols.len()];
    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        let line = idx + 2;
        let raw_period = field(&record, period_col);
        let period = parse_period(line, raw_period.strip_suffix(".0").unwrap_or(raw_period))?;
        let values = factor_cols
            .iter()
            .map(|(col, name)| parse_number(line, name, field(&record, *col)))
            .collect::<IoResult<Vec<_>>>()?;
        if drop_incomplete_rows && values.iter().any(Option::is_none) {
            continue;
        }
        for (bucket, value) in grouped.iter_mut().zip(values) {
            bucket.push((period, value));
        }
    }

    Ok(factor_cols
        .into_iter()
        .zip(grouped)
        .map(|((_, name), rows)| {
            let series = ReturnSeries::from_returns(name.clone(), IndexSemantics::Excess, rows);
            (name, series)
        })
        .collect())
}

/// Writes the panel as `unique_id,ds,y` with `ds` the month-end date.
pub fn write_panel<W: Write>(writer: W, panel: &OutputPanel) -> IoResult<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in panel.rows() {
        wtr.serialize(PanelRecord {
            unique_id: &row.identity,
            ds: row.period.month_end_string(),
            y: row.value,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn parse_date(line: usize, value: &str) -> IoResult<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| IoError::InvalidDate { line, value: value.to_string() })
}

fn parse_period(line: usize, value: &str) -> IoResult<Period> {
    Period::parse(value).ok_or_else(|| IoError::InvalidPeriod { line, value: value.to_string() })
}

fn parse_number(line: usize, column: &str, value: &str) -> IoResult<Option<f64>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    let parsed: f64 = value.parse().map_err(|_| IoError::InvalidNumber {
        line,
        column: column.to_string(),
        value: value.to_string(),
    })?;
    Ok(parsed.is_finite().then_some(parsed))
}
