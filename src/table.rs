//! Feature-table adapter: JSON arrays of row objects in, typed records out.
//!
//! Every column other than `side`, `bench_size` and `margin` is a feature and
//! must already be numeric. Rows missing a configured key are dropped here,
//! before they reach the trainer.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::LOG_TARGET;
use crate::error::{Error, Result};
use crate::record::{FeatureRecord, Side};

/// Share of rows held out by [`holdout_split`].
pub const HOLDOUT_FRACTION: f64 = 0.1;

pub fn load_records(path: &Path) -> Result<Vec<FeatureRecord>> {
    let raw = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_records(&raw)?;
    log::debug!(
        target: LOG_TARGET,
        "loaded {} records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

pub fn parse_records(raw: &str) -> Result<Vec<FeatureRecord>> {
    let rows = serde_json::from_str::<Vec<Map<String, Value>>>(raw)?;
    rows.iter()
        .enumerate()
        .map(|(idx, row)| record_from_row(idx, row))
        .collect()
}

fn record_from_row(row_idx: usize, row: &Map<String, Value>) -> Result<FeatureRecord> {
    let number = |column: &str| -> Result<f64> {
        match row.get(column) {
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| Error::NonNumericColumn {
                row: row_idx,
                column: column.to_string(),
            }),
            Some(_) => Err(Error::NonNumericColumn {
                row: row_idx,
                column: column.to_string(),
            }),
            None => Err(Error::MissingFeature {
                key: column.to_string(),
            }),
        }
    };

    let side_raw = number("side")?;
    if side_raw != 0.0 && side_raw != 1.0 {
        return Err(Error::InvalidSideValue {
            row: row_idx,
            value: side_raw,
        });
    }
    let side = Side::try_from(side_raw as u8)?;
    let bench_size = number("bench_size")?;
    if bench_size < 0.0 || bench_size.fract() != 0.0 {
        return Err(Error::NonNumericColumn {
            row: row_idx,
            column: "bench_size".to_string(),
        });
    }

    let mut record = FeatureRecord::new(side, bench_size as u32);
    record.margin = match row.get("margin") {
        None | Some(Value::Null) => None,
        Some(_) => Some(number("margin")?),
    };

    for column in row.keys() {
        if matches!(column.as_str(), "side" | "bench_size" | "margin") {
            continue;
        }
        let value = number(column)?;
        record.features.insert(column.clone(), value);
    }
    Ok(record)
}

/// Keeps only records that carry every key; the rest are reported and skipped.
pub fn retain_complete(records: Vec<FeatureRecord>, keys: &[String]) -> Vec<FeatureRecord> {
    let before = records.len();
    let kept = records
        .into_iter()
        .filter(|r| r.has_keys(keys.iter().map(String::as_str)))
        .collect::<Vec<_>>();
    if kept.len() < before {
        log::warn!(
            target: LOG_TARGET,
            "skipped {} records missing configured features",
            before - kept.len()
        );
    }
    kept
}

/// `(train, test)`: the first `ceil(10%)` rows are the test set. With
/// `use_full_dataset` every row is used for both.
pub fn holdout_split(
    records: &[FeatureRecord],
    use_full_dataset: bool,
) -> (&[FeatureRecord], &[FeatureRecord]) {
    if use_full_dataset {
        return (records, records);
    }
    let amount = (HOLDOUT_FRACTION * records.len() as f64).ceil() as usize;
    let (test, train) = records.split_at(amount.min(records.len()));
    (train, test)
}
