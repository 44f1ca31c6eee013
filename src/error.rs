use std::path::PathBuf;

use crate::record::Side;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("record is missing feature `{key}`")]
    MissingFeature { key: String },
    #[error("feature `{key}` has degenerate {side:?} variance {variance}")]
    DegenerateVariance { key: String, side: Side, variance: f64 },
    #[error("dataset is empty")]
    EmptyDataset,
    #[error("fold count {k} is invalid for {n} records")]
    InvalidFoldCount { k: usize, n: usize },
    #[error("threshold table is missing the `prior` row")]
    MissingPrior,
    #[error("threshold table keys {found:?} do not match expected {expected:?}")]
    KeyOrderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("invalid side label {0}, expected 0 or 1")]
    InvalidSide(u8),
    #[error("side {value} in row {row} is not a 0/1 label")]
    InvalidSideValue { row: usize, value: f64 },
    #[error("column `{column}` in row {row} is not numeric")]
    NonNumericColumn { row: usize, column: String },
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: `{0}`")]
    Json(#[from] serde_json::Error),
}
