//! Threshold learning.
//!
//! Training runs in three stages over one fixed key order:
//!
//! 1. baseline: each threshold starts at the feature mean (or its forced
//!    value) and every statistic is estimated from the training rows;
//! 2. grid refinement: one coordinate-ascent pass, scanning evenly spaced
//!    candidates across each free feature's observed range and keeping the one
//!    with the best whole-set indicator accuracy;
//! 3. joint refinement: Nelder-Mead over all free thresholds at once,
//!    penalizing drift of the predicted positive rate away from the prior.
//!    Only the thresholds move; the ratios from stage 2 are kept.
//!
//! Forced thresholds are written once in stage 1 and never touched again.
//! Nothing here is random, so identical inputs give identical output.

use rayon::prelude::*;

use crate::LOG_TARGET;
use crate::bayes::{decide, indicator_factor};
use crate::config::TrainConfig;
use crate::error::{Error, Result};
use crate::record::{FeatureRecord, Side};
use crate::simplex;
use crate::stats;
use crate::thresholds::{Parameter, ThresholdSet};

const POSITIVE_RATE_PENALTY: f64 = 0.1;

/// Training rows pivoted into one column per key.
struct Columns {
    values: Vec<Vec<f64>>,
    win_values: Vec<Vec<f64>>,
    sides: Vec<Side>,
    prior: f64,
}

impl Columns {
    fn build(records: &[FeatureRecord], keys: &[String]) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let mut values = vec![Vec::with_capacity(records.len()); keys.len()];
        let mut win_values = vec![Vec::new(); keys.len()];
        for record in records {
            for (j, key) in keys.iter().enumerate() {
                let v = record.value(key)?;
                values[j].push(v);
                if record.side.is_win() {
                    win_values[j].push(v);
                }
            }
        }
        let sides = records.iter().map(|r| r.side).collect::<Vec<_>>();
        let wins = sides.iter().filter(|s| s.is_win()).count();
        Ok(Self {
            values,
            win_values,
            prior: wins as f64 / sides.len() as f64,
            sides,
        })
    }

    fn rows(&self) -> usize {
        self.sides.len()
    }

    /// Re-estimates likelihood and evidence for `param` at `threshold`.
    fn at_threshold(&self, j: usize, param: &Parameter, threshold: f64) -> Parameter {
        Parameter {
            threshold,
            likelihood: stats::fraction_above(&self.win_values[j], threshold),
            evidence: stats::fraction_above(&self.values[j], threshold),
            ..param.clone()
        }
    }

    /// Indicator-mode accuracy and positive rate of `params` on these rows,
    /// optionally with column `j` swapped for a candidate parameter.
    fn score(&self, params: &[Parameter], candidate: Option<(usize, &Parameter)>) -> Score {
        let mut correct = 0usize;
        let mut positives = 0usize;
        for i in 0..self.rows() {
            let mut p = self.prior;
            for (j, param) in params.iter().enumerate() {
                let param = match candidate {
                    Some((c, swap)) if c == j => swap,
                    _ => param,
                };
                p *= indicator_factor(param, self.values[j][i] > param.threshold);
            }
            let predicted = decide(p.clamp(0.0, 1.0));
            if predicted == self.sides[i] {
                correct += 1;
            }
            if predicted.is_win() {
                positives += 1;
            }
        }
        let n = self.rows() as f64;
        Score {
            accuracy: correct as f64 / n,
            positive_rate: positives as f64 / n,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Score {
    accuracy: f64,
    positive_rate: f64,
}

/// Stage 1 only: mean (or forced) thresholds and their statistics.
pub fn baseline(records: &[FeatureRecord], cfg: &TrainConfig) -> Result<ThresholdSet> {
    let cols = Columns::build(records, &cfg.keys)?;
    Ok(ThresholdSet::new(cols.prior, baseline_params(&cols, cfg)))
}

pub fn train(records: &[FeatureRecord], cfg: &TrainConfig) -> Result<ThresholdSet> {
    train_from(records, cfg, None)
}

/// Full three-stage training. `warm` seeds stages 2 and 3 with the free
/// thresholds of an earlier set (matched by key); all statistics are still
/// estimated from `records`.
pub fn train_from(
    records: &[FeatureRecord],
    cfg: &TrainConfig,
    warm: Option<&ThresholdSet>,
) -> Result<ThresholdSet> {
    let cols = Columns::build(records, &cfg.keys)?;
    let mut params = baseline_params(&cols, cfg);

    if let Some(warm) = warm {
        for (j, key) in cfg.keys.iter().enumerate() {
            if cfg.is_forced(key) {
                continue;
            }
            if let Some(prev) = warm.param(key) {
                params[j] = cols.at_threshold(j, &params[j], prev.threshold);
            }
        }
    }

    log::info!(
        target: LOG_TARGET,
        "start accuracy {:.0}% over {} rows",
        100.0 * cols.score(&params, None).accuracy,
        cols.rows()
    );

    refine_grid(&cols, cfg, &mut params);
    log::debug!(
        target: LOG_TARGET,
        "grid accuracy {:.2}%",
        100.0 * cols.score(&params, None).accuracy
    );

    refine_joint(&cols, cfg, &mut params);
    log::info!(
        target: LOG_TARGET,
        "trained accuracy {:.0}%",
        100.0 * cols.score(&params, None).accuracy
    );

    Ok(ThresholdSet::new(cols.prior, params))
}

fn baseline_params(cols: &Columns, cfg: &TrainConfig) -> Vec<Parameter> {
    cfg.keys
        .iter()
        .enumerate()
        .map(|(j, key)| {
            let values = &cols.values[j];
            let lose_values = values
                .iter()
                .zip(&cols.sides)
                .filter(|(_, side)| !side.is_win())
                .map(|(v, _)| *v)
                .collect::<Vec<_>>();
            let stats_only = Parameter {
                key: key.clone(),
                threshold: 0.0,
                likelihood: 0.0,
                evidence: 0.0,
                mean_win: stats::mean(&cols.win_values[j]),
                var_win: stats::variance(&cols.win_values[j]),
                mean_lose: stats::mean(&lose_values),
                var_lose: stats::variance(&lose_values),
            };
            let threshold = cfg
                .forced
                .get(key)
                .copied()
                .unwrap_or_else(|| stats::mean(values));
            cols.at_threshold(j, &stats_only, threshold)
        })
        .collect()
}

fn grid(min: f64, max: f64, steps: usize) -> Vec<f64> {
    if steps == 0 || max <= min {
        return vec![min];
    }
    let step = (max - min) / steps as f64;
    (0..=steps).map(|i| min + i as f64 * step).collect()
}

fn refine_grid(cols: &Columns, cfg: &TrainConfig, params: &mut [Parameter]) {
    for j in 0..params.len() {
        if cfg.is_forced(&params[j].key) {
            continue;
        }
        let (min, max) = stats::range(&cols.values[j]);
        let mut candidates = grid(min, max, cfg.grid_step_count)
            .into_iter()
            .map(|t| cols.at_threshold(j, &params[j], t))
            .collect::<Vec<_>>();

        let current: &[Parameter] = params;
        let accuracies = candidates
            .par_iter()
            .map(|c| cols.score(current, Some((j, c))).accuracy)
            .collect::<Vec<_>>();

        // First candidate with the strictly highest accuracy wins.
        let mut best = 0usize;
        for (idx, acc) in accuracies.iter().enumerate() {
            if *acc > accuracies[best] {
                best = idx;
            }
        }
        log::debug!(
            target: LOG_TARGET,
            "{}: threshold {:.4} accuracy {:.2}%",
            params[j].key,
            candidates[best].threshold,
            100.0 * accuracies[best]
        );
        params[j] = candidates.swap_remove(best);
    }
}

fn refine_joint(cols: &Columns, cfg: &TrainConfig, params: &mut [Parameter]) {
    let free = (0..params.len())
        .filter(|j| !cfg.is_forced(&params[*j].key))
        .collect::<Vec<_>>();
    if free.is_empty() {
        return;
    }

    let initial = free.iter().map(|j| params[*j].threshold).collect::<Vec<_>>();
    let bounds = free
        .iter()
        .map(|j| stats::range(&cols.values[*j]))
        .collect::<Vec<_>>();

    // Only thresholds move here; likelihood and evidence keep their stage-2
    // values both while searching and in the committed set.
    let mut scratch = params.to_vec();
    let objective = |x: &[f64]| {
        for (slot, j) in free.iter().enumerate() {
            scratch[*j].threshold = x[slot];
        }
        let s = cols.score(&scratch, None);
        -s.accuracy + POSITIVE_RATE_PENALTY * (cols.prior - s.positive_rate).abs()
    };

    let result = simplex::minimize(objective, &initial, &bounds, cfg.optimizer_iterations);
    for (slot, j) in free.iter().enumerate() {
        params[*j].threshold = result.point[slot];
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::bayes::{PredictionMode, evaluate};

    fn step_records() -> Vec<FeatureRecord> {
        (0..10)
            .map(|i| {
                let win = i < 5;
                let side = if win { Side::Win } else { Side::Lose };
                FeatureRecord::new(side, 9).with_feature("x", if win { 1.0 } else { 0.0 })
            })
            .collect()
    }

    fn small_cfg(keys: &[&str]) -> TrainConfig {
        TrainConfig {
            grid_step_count: 20,
            optimizer_iterations: 30,
            ..TrainConfig::with_keys(keys.iter().map(|k| k.to_string()).collect())
        }
    }

    #[test]
    fn grid_includes_both_ends() {
        let g = grid(0.0, 1.0, 4);
        assert_eq!(g, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(grid(3.0, 3.0, 150), vec![3.0]);
        assert_eq!(grid(1.0, 2.0, 0), vec![1.0]);
    }

    #[test]
    fn baseline_on_separable_step() {
        let set = baseline(&step_records(), &small_cfg(&["x"])).unwrap();
        let x = set.param("x").unwrap();
        assert_eq!(set.prior(), 0.5);
        assert_eq!(x.threshold, 0.5);
        assert_eq!(x.likelihood, 1.0);
        assert_eq!(x.evidence, 0.5);
        assert_eq!(x.mean_win, 1.0);
        assert_eq!(x.var_win, 0.0);
        assert_eq!(x.mean_lose, 0.0);
    }

    #[test]
    fn scorer_agrees_with_evaluate() {
        let records = crate::synthetic::generate(&crate::synthetic::SyntheticConfig {
            rows: 60,
            seed: 3,
            ..Default::default()
        });
        let cfg = TrainConfig::with_keys(crate::synthetic::feature_keys(3));
        let set = baseline(&records, &cfg).unwrap();
        let cols = Columns::build(&records, &cfg.keys).unwrap();
        let s = cols.score(set.params(), None);
        let m = evaluate(&set, &records, PredictionMode::Indicator).unwrap();
        assert_eq!(s.accuracy, m.accuracy);
        assert_eq!(s.positive_rate, m.positive_rate);
    }

    #[test]
    fn forced_threshold_survives_all_stages() {
        let records = crate::synthetic::generate(&crate::synthetic::SyntheticConfig {
            rows: 80,
            seed: 11,
            ..Default::default()
        });
        let mut cfg = small_cfg(&["f0", "f1", "bench_size", "f2"]);
        cfg.forced = BTreeMap::from([
            ("f1".to_string(), 0.123_456_789),
            ("bench_size".to_string(), 8.5),
        ]);

        let set = train(&records, &cfg).unwrap();
        assert_eq!(
            set.param("f1").unwrap().threshold.to_bits(),
            0.123_456_789_f64.to_bits()
        );
        assert_eq!(
            set.param("bench_size").unwrap().threshold.to_bits(),
            8.5_f64.to_bits()
        );

        let warm = ThresholdSet::new(
            0.5,
            cfg.keys
                .iter()
                .map(|k| Parameter {
                    key: k.clone(),
                    threshold: -42.0,
                    ..Parameter::prior(0.0)
                })
                .collect(),
        );
        let warmed = train_from(&records, &cfg, Some(&warm)).unwrap();
        assert_eq!(
            warmed.param("f1").unwrap().threshold.to_bits(),
            0.123_456_789_f64.to_bits()
        );
    }

    #[test]
    fn joint_refinement_keeps_grid_ratios() {
        let records = crate::synthetic::generate(&crate::synthetic::SyntheticConfig {
            rows: 90,
            seed: 19,
            ..Default::default()
        });
        let mut cfg = small_cfg(&["f0", "f1", "bench_size", "f2"]);
        cfg.forced = BTreeMap::from([("bench_size".to_string(), 8.5)]);
        let cols = Columns::build(&records, &cfg.keys).unwrap();
        let mut params = baseline_params(&cols, &cfg);
        refine_grid(&cols, &cfg, &mut params);
        let after_grid = params.clone();

        refine_joint(&cols, &cfg, &mut params);
        for (before, after) in after_grid.iter().zip(&params) {
            assert_eq!(before.key, after.key);
            assert_eq!(before.likelihood.to_bits(), after.likelihood.to_bits());
            assert_eq!(before.evidence.to_bits(), after.evidence.to_bits());
            assert_eq!(before.mean_win, after.mean_win);
            assert_eq!(before.var_lose, after.var_lose);
        }
        assert_eq!(
            params[2].threshold.to_bits(),
            after_grid[2].threshold.to_bits()
        );
    }

    #[test]
    fn training_is_deterministic() {
        let records = crate::synthetic::generate(&crate::synthetic::SyntheticConfig {
            rows: 70,
            seed: 5,
            ..Default::default()
        });
        let cfg = small_cfg(&["f0", "f1", "f2"]);
        let a = train(&records, &cfg).unwrap();
        let b = train(&records, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_key_fails_training() {
        let cfg = small_cfg(&["x", "absent"]);
        assert!(matches!(
            train(&step_records(), &cfg),
            Err(Error::MissingFeature { key }) if key == "absent"
        ));
    }

    #[test]
    fn empty_training_set_is_rejected() {
        assert!(matches!(
            train(&[], &small_cfg(&["x"])),
            Err(Error::EmptyDataset)
        ));
    }
}
