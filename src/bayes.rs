//! Naive Bayes prediction over a learned [`ThresholdSet`].
//!
//! Both strategies treat features as conditionally independent given the
//! side label. Indicator mode reads only thresholds and the
//! likelihood/evidence pair; continuous mode reads only the per-class Gaussian
//! parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::{FeatureRecord, Side};
use crate::stats;
use crate::thresholds::{Parameter, ThresholdSet};

const TIE_BREAK_BENCH_SIZE: u32 = 8;
const TIE_BREAK_MARGIN: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    #[default]
    Indicator,
    Continuous,
}

impl FromStr for PredictionMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "indicator" | "boolean" => Ok(PredictionMode::Indicator),
            "continuous" | "gaussian" => Ok(PredictionMode::Continuous),
            other => Err(format!(
                "unknown prediction mode `{other}` (expected indicator or continuous)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub accuracy: f64,
    /// `None` when nothing was predicted as a win.
    pub precision: Option<f64>,
    /// `None` when no record was an actual win.
    pub recall: Option<f64>,
    pub positive_rate: f64,
}

impl Metrics {
    /// Unweighted mean over runs. An undefined precision/recall in any run
    /// leaves the mean undefined.
    pub fn average(runs: &[Metrics]) -> Option<Metrics> {
        if runs.is_empty() {
            return None;
        }
        let n = runs.len() as f64;
        let mean_of = |f: fn(&Metrics) -> Option<f64>| -> Option<f64> {
            runs.iter()
                .map(f)
                .try_fold(0.0, |acc, v| v.map(|v| acc + v / n))
        };
        Some(Metrics {
            samples: runs.iter().map(|m| m.samples).sum(),
            accuracy: runs.iter().map(|m| m.accuracy / n).sum(),
            precision: mean_of(|m| m.precision),
            recall: mean_of(|m| m.recall),
            positive_rate: runs.iter().map(|m| m.positive_rate / n).sum(),
        })
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ACCURACY: {}", percent(Some(self.accuracy)))?;
        writeln!(f, "PRECISION: {}", percent(self.precision))?;
        writeln!(f, "RECALL: {}", percent(self.recall))?;
        write!(f, "POSITIVE RATE: {}", percent(Some(self.positive_rate)))
    }
}

pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", 100.0 * v),
        None => "undefined".to_string(),
    }
}

pub fn predict(record: &FeatureRecord, set: &ThresholdSet, mode: PredictionMode) -> Result<f64> {
    match mode {
        PredictionMode::Indicator => predict_indicator(record, set),
        PredictionMode::Continuous => predict_continuous(record, set),
    }
}

pub fn predict_indicator(record: &FeatureRecord, set: &ThresholdSet) -> Result<f64> {
    let mut p = set.prior();
    for param in set.params() {
        let value = record.value(&param.key)?;
        p *= indicator_factor(param, value > param.threshold);
    }
    Ok(p.clamp(0.0, 1.0))
}

/// Posterior update for one feature. A `0/0` ratio only arises when the
/// feature never (or always) exceeded its threshold in training, so it carries
/// no information and leaves the running product unchanged.
pub(crate) fn indicator_factor(param: &Parameter, above: bool) -> f64 {
    let (num, den) = if above {
        (param.likelihood, param.evidence)
    } else {
        (1.0 - param.likelihood, 1.0 - param.evidence)
    };
    if den <= 0.0 { 1.0 } else { num / den }
}

pub fn predict_continuous(record: &FeatureRecord, set: &ThresholdSet) -> Result<f64> {
    let mut log_win = set.prior().ln();
    let mut log_lose = (1.0 - set.prior()).ln();
    for param in set.params() {
        check_variance(param, Side::Win, param.var_win)?;
        check_variance(param, Side::Lose, param.var_lose)?;
        let value = record.value(&param.key)?;
        log_win += stats::gaussian_log_pdf(value, param.mean_win, param.var_win);
        log_lose += stats::gaussian_log_pdf(value, param.mean_lose, param.var_lose);
    }

    // mass_win / (mass_win + mass_lose), evaluated without leaving log space.
    if log_win == f64::NEG_INFINITY && log_lose == f64::NEG_INFINITY {
        return Ok(0.5);
    }
    Ok(1.0 / (1.0 + (log_lose - log_win).exp()))
}

fn check_variance(param: &Parameter, side: Side, variance: f64) -> Result<()> {
    if variance > 0.0 && variance.is_finite() {
        return Ok(());
    }
    Err(Error::DegenerateVariance {
        key: param.key.clone(),
        side,
        variance,
    })
}

/// `round(p)`: 0.5 and above is a win.
pub fn decide(p: f64) -> Side {
    if p >= 0.5 { Side::Win } else { Side::Lose }
}

/// Even benches that split on a near-tie leave the lower ruling standing, so
/// a narrow predicted win on an eight-member bench becomes a loss.
///
/// Callers opt into this explicitly; [`evaluate`] never applies it.
pub fn even_bench_tie_break(record: &FeatureRecord, p: f64, predicted: Side) -> Side {
    if record.bench_size == TIE_BREAK_BENCH_SIZE
        && (0.5 - p).abs() < TIE_BREAK_MARGIN
        && predicted == Side::Win
    {
        Side::Lose
    } else {
        predicted
    }
}

/// Pulls a probability toward 0.5 for publication.
pub fn soften(p: f64) -> f64 {
    0.8 * p + 0.1
}

pub fn evaluate(
    set: &ThresholdSet,
    records: &[FeatureRecord],
    mode: PredictionMode,
) -> Result<Metrics> {
    evaluate_with(set, records, mode, |_, _, predicted| predicted)
}

/// Like [`evaluate`], but passes every `(record, p, round(p))` through
/// `post` before scoring, e.g. [`even_bench_tie_break`].
pub fn evaluate_with<F>(
    set: &ThresholdSet,
    records: &[FeatureRecord],
    mode: PredictionMode,
    post: F,
) -> Result<Metrics>
where
    F: Fn(&FeatureRecord, f64, Side) -> Side,
{
    if records.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let mut correct = 0usize;
    let mut predicted_wins = 0usize;
    let mut true_wins = 0usize;
    let mut actual_wins = 0usize;

    for record in records {
        let p = predict(record, set, mode)?;
        let predicted = post(record, p, decide(p));
        let actual = record.side;
        if predicted == actual {
            correct += 1;
        }
        if predicted.is_win() {
            predicted_wins += 1;
            if actual.is_win() {
                true_wins += 1;
            }
        }
        if actual.is_win() {
            actual_wins += 1;
        }
    }

    let n = records.len() as f64;
    Ok(Metrics {
        samples: records.len(),
        accuracy: correct as f64 / n,
        precision: ratio(true_wins, predicted_wins),
        recall: ratio(true_wins, actual_wins),
        positive_rate: predicted_wins as f64 / n,
    })
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    if den == 0 {
        None
    } else {
        Some(num as f64 / den as f64)
    }
}
