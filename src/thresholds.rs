use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::LOG_TARGET;
use crate::error::{Error, Result};

pub const PRIOR_KEY: &str = "prior";

/// Learned statistics for one feature. Also the on-disk row shape of the
/// threshold table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub threshold: f64,
    // P(value > threshold | win)
    pub likelihood: f64,
    // P(value > threshold)
    pub evidence: f64,
    pub mean_win: f64,
    pub var_win: f64,
    pub mean_lose: f64,
    pub var_lose: f64,
}

impl Parameter {
    pub fn prior(likelihood: f64) -> Self {
        Self {
            key: PRIOR_KEY.to_string(),
            threshold: 0.0,
            likelihood,
            evidence: 0.0,
            mean_win: 0.0,
            var_win: 0.0,
            mean_lose: 0.0,
            var_lose: 0.0,
        }
    }
}

/// `[prior, parameter_1, .., parameter_n]` in a fixed feature-key order.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    prior: f64,
    params: Vec<Parameter>,
}

impl ThresholdSet {
    pub fn new(prior: f64, params: Vec<Parameter>) -> Self {
        Self { prior, params }
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.key == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.params.iter().map(|p| p.key.clone()).collect()
    }

    /// Flat table rows, prior first.
    pub fn to_rows(&self) -> Vec<Parameter> {
        let mut rows = Vec::with_capacity(self.params.len() + 1);
        rows.push(Parameter::prior(self.prior));
        rows.extend(self.params.iter().cloned());
        rows
    }

    pub fn from_rows(mut rows: Vec<Parameter>) -> Result<Self> {
        if rows.is_empty() || rows[0].key != PRIOR_KEY {
            return Err(Error::MissingPrior);
        }
        let prior = rows.remove(0).likelihood;
        Ok(Self::new(prior, rows))
    }

    /// Fails unless the parameter keys are exactly `expected`, in order.
    pub fn check_keys(&self, expected: &[String]) -> Result<()> {
        let found = self.keys();
        if found != expected {
            return Err(Error::KeyOrderMismatch {
                expected: expected.to_vec(),
                found,
            });
        }
        Ok(())
    }
}

pub fn save_threshold_table(path: &Path, set: &ThresholdSet) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&set.to_rows())?;
    fs::write(&tmp, json).map_err(|source| Error::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!(
        target: LOG_TARGET,
        "wrote {} threshold rows to {}",
        set.params().len() + 1,
        path.display()
    );
    Ok(())
}

pub fn load_threshold_table(path: &Path) -> Result<ThresholdSet> {
    let raw = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_threshold_table(&raw)
}

pub fn parse_threshold_table(raw: &str) -> Result<ThresholdSet> {
    let rows = serde_json::from_str::<Vec<Parameter>>(raw)?;
    ThresholdSet::from_rows(rows)
}
