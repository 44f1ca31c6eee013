use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Feature key that resolves to [`FeatureRecord::bench_size`] when the record
/// does not carry an explicit column of the same name.
pub const BENCH_SIZE_KEY: &str = "bench_size";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Side {
    Lose,
    Win,
}

impl Side {
    pub fn label(self) -> u8 {
        match self {
            Side::Lose => 0,
            Side::Win => 1,
        }
    }

    pub fn is_win(self) -> bool {
        self == Side::Win
    }
}

impl TryFrom<u8> for Side {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Side::Lose),
            1 => Ok(Side::Win),
            other => Err(Error::InvalidSide(other)),
        }
    }
}

impl From<Side> for u8 {
    fn from(side: Side) -> u8 {
        side.label()
    }
}

/// One labelled case. Values are already typed; coercion from raw text is the
/// loader's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub side: Side,
    pub bench_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
    #[serde(flatten)]
    pub features: HashMap<String, f64>,
}

impl FeatureRecord {
    pub fn new(side: Side, bench_size: u32) -> Self {
        Self {
            side,
            bench_size,
            margin: None,
            features: HashMap::new(),
        }
    }

    pub fn with_feature(mut self, key: &str, value: f64) -> Self {
        self.features.insert(key.to_string(), value);
        self
    }

    pub fn value(&self, key: &str) -> Result<f64> {
        if let Some(v) = self.features.get(key) {
            return Ok(*v);
        }
        if key == BENCH_SIZE_KEY {
            return Ok(self.bench_size as f64);
        }
        Err(Error::MissingFeature {
            key: key.to_string(),
        })
    }

    pub fn has_keys<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter().all(|k| self.value(k).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_size_doubles_as_feature() {
        let r = FeatureRecord::new(Side::Win, 8).with_feature("words", 120.0);
        assert_eq!(r.value("bench_size").unwrap(), 8.0);
        assert_eq!(r.value("words").unwrap(), 120.0);
        assert!(matches!(
            r.value("laughter"),
            Err(Error::MissingFeature { key }) if key == "laughter"
        ));
    }

    #[test]
    fn side_rejects_labels_outside_zero_one() {
        assert_eq!(Side::try_from(1).unwrap(), Side::Win);
        assert!(Side::try_from(2).is_err());
    }
}
