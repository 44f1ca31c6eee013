//! Contiguous k-fold cross-validation.
//!
//! Records are split into `k` blocks of `floor(n / k)` rows in their original
//! order; the trailing `n mod k` rows belong to no fold at all. The threshold
//! set returned as the production model is the one trained on the *last*
//! fold, not the best-scoring one.

use std::ops::Range;

use rayon::prelude::*;

use crate::LOG_TARGET;
use crate::bayes::{self, Metrics};
use crate::config::{CrossValidationConfig, TrainConfig};
use crate::error::{Error, Result};
use crate::record::FeatureRecord;
use crate::thresholds::ThresholdSet;
use crate::trainer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub test: Range<usize>,
    /// Rows used for training; excludes the test block and the remainder.
    pub covered: Range<usize>,
}

impl Fold {
    pub fn train_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.covered.clone().filter(|i| !self.test.contains(i))
    }

    pub fn split(&self, records: &[FeatureRecord]) -> (Vec<FeatureRecord>, Vec<FeatureRecord>) {
        let train = self.train_indices().map(|i| records[i].clone()).collect();
        let test = records[self.test.clone()].to_vec();
        (train, test)
    }
}

#[derive(Debug, Clone)]
pub struct FoldReport {
    pub index: usize,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub struct CrossValidation {
    pub folds: Vec<FoldReport>,
    pub average: Metrics,
    /// Thresholds trained on the last fold.
    pub model: ThresholdSet,
}

pub fn fold_partitions(n: usize, k: usize) -> Result<Vec<Fold>> {
    // Fewer than two folds leaves nothing to train on.
    if k < 2 || k > n {
        return Err(Error::InvalidFoldCount { k, n });
    }
    let size = n / k;
    let covered = 0..size * k;
    Ok((0..k)
        .map(|index| Fold {
            index,
            test: index * size..(index + 1) * size,
            covered: covered.clone(),
        })
        .collect())
}

pub fn cross_validate(
    records: &[FeatureRecord],
    train_cfg: &TrainConfig,
    cv_cfg: &CrossValidationConfig,
) -> Result<CrossValidation> {
    let folds = fold_partitions(records.len(), cv_cfg.fold_count)?;
    let excluded = records.len() % cv_cfg.fold_count;
    if excluded > 0 {
        log::info!(
            target: LOG_TARGET,
            "{excluded} trailing rows fall outside every fold"
        );
    }

    let results = if cv_cfg.warm_start {
        let mut out = Vec::with_capacity(folds.len());
        let mut previous: Option<ThresholdSet> = None;
        for fold in &folds {
            let (set, metrics) = run_fold(records, fold, train_cfg, cv_cfg, previous.as_ref())?;
            previous = Some(set.clone());
            out.push((set, metrics));
        }
        out
    } else {
        folds
            .par_iter()
            .map(|fold| run_fold(records, fold, train_cfg, cv_cfg, None))
            .collect::<Result<Vec<_>>>()?
    };

    let reports = results
        .iter()
        .zip(&folds)
        .map(|((_, metrics), fold)| FoldReport {
            index: fold.index,
            metrics: *metrics,
        })
        .collect::<Vec<_>>();
    let per_fold = reports.iter().map(|r| r.metrics).collect::<Vec<_>>();
    let average = Metrics::average(&per_fold).ok_or(Error::EmptyDataset)?;
    let model = results
        .into_iter()
        .last()
        .map(|(set, _)| set)
        .ok_or(Error::EmptyDataset)?;

    Ok(CrossValidation {
        folds: reports,
        average,
        model,
    })
}

fn run_fold(
    records: &[FeatureRecord],
    fold: &Fold,
    train_cfg: &TrainConfig,
    cv_cfg: &CrossValidationConfig,
    warm: Option<&ThresholdSet>,
) -> Result<(ThresholdSet, Metrics)> {
    let (train, test) = fold.split(records);
    let set = trainer::train_from(&train, train_cfg, warm)?;
    let metrics = bayes::evaluate(&set, &test, cv_cfg.mode)?;
    log::info!(
        target: LOG_TARGET,
        "fold {} test accuracy {:.0}%",
        fold.index,
        100.0 * metrics.accuracy
    );
    Ok((set, metrics))
}
