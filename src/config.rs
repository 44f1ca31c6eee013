use std::collections::BTreeMap;

use crate::bayes::PredictionMode;
use crate::record::BENCH_SIZE_KEY;

pub const DEFAULT_GRID_STEP_COUNT: usize = 150;
pub const DEFAULT_OPTIMIZER_ITERATIONS: usize = 100;
pub const DEFAULT_FOLD_COUNT: usize = 10;

/// Threshold pinned for an eight- vs nine-member bench.
pub const DEFAULT_BENCH_SIZE_THRESHOLD: f64 = 8.5;

pub const DEFAULT_FEATURE_KEYS: &[&str] = &[
    "counsel_difference",
    "p_interruptions",
    "p_words",
    "p_times",
    "p_laughter",
    "p_num_counsel",
    "p_num_int_by",
    "r_interruptions",
    "r_words",
    "r_times",
    "r_laughter",
    "r_num_counsel",
    "r_num_int_by",
    "j_interruptions",
    "j_words",
    "j_times",
    "j_laughter",
    BENCH_SIZE_KEY,
    "j_num_int_by",
];

pub fn default_feature_keys() -> Vec<String> {
    DEFAULT_FEATURE_KEYS.iter().map(|k| k.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Ordered feature keys; the resulting threshold set follows this order.
    pub keys: Vec<String>,
    /// Keys whose threshold is fixed and never searched.
    pub forced: BTreeMap<String, f64>,
    pub grid_step_count: usize,
    pub optimizer_iterations: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            keys: default_feature_keys(),
            forced: BTreeMap::from([(BENCH_SIZE_KEY.to_string(), DEFAULT_BENCH_SIZE_THRESHOLD)]),
            grid_step_count: DEFAULT_GRID_STEP_COUNT,
            optimizer_iterations: DEFAULT_OPTIMIZER_ITERATIONS,
        }
    }
}

impl TrainConfig {
    pub fn with_keys(keys: Vec<String>) -> Self {
        Self {
            keys,
            forced: BTreeMap::new(),
            ..Self::default()
        }
    }

    pub fn is_forced(&self, key: &str) -> bool {
        self.forced.contains_key(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossValidationConfig {
    pub fold_count: usize,
    /// Seed each fold's search with the previous fold's thresholds. Folds then
    /// run sequentially; otherwise they are trained in parallel.
    pub warm_start: bool,
    pub mode: PredictionMode,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            fold_count: DEFAULT_FOLD_COUNT,
            warm_start: true,
            mode: PredictionMode::Indicator,
        }
    }
}
