//! Seeded synthetic case tables for demos, tests and benchmarks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::record::{FeatureRecord, Side};

#[derive(Debug, Clone, Copy)]
pub struct SyntheticConfig {
    pub rows: usize,
    pub features: usize,
    pub win_rate: f64,
    /// Mean shift of every feature between winners and losers, in units of
    /// the per-class standard deviation.
    pub signal: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            rows: 200,
            features: 3,
            win_rate: 0.6,
            signal: 1.0,
            seed: 7,
        }
    }
}

pub fn feature_keys(features: usize) -> Vec<String> {
    (0..features).map(|i| format!("f{i}")).collect()
}

pub fn generate(cfg: &SyntheticConfig) -> Vec<FeatureRecord> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let keys = feature_keys(cfg.features);

    (0..cfg.rows)
        .map(|_| {
            let side = if rng.gen_bool(cfg.win_rate.clamp(0.0, 1.0)) {
                Side::Win
            } else {
                Side::Lose
            };
            // Roughly one case in eight is heard by a short bench.
            let bench_size = if rng.gen_range(0..8) == 0 { 8 } else { 9 };
            let mut record = FeatureRecord::new(side, bench_size);
            record.margin = Some(rng.gen_range(1..=bench_size) as f64);
            for (i, key) in keys.iter().enumerate() {
                // Alternate the sign so some features fall with a win.
                let direction = if i % 2 == 0 { 1.0 } else { -1.0 };
                let shift = if side.is_win() { 0.5 } else { -0.5 };
                let value = 10.0 + direction * shift * cfg.signal + standard_normal(&mut rng);
                record.features.insert(key.clone(), value);
            }
            record
        })
        .collect()
}

fn standard_normal(rng: &mut impl Rng) -> f64 {
    // Box-Muller; `1 - u` keeps the log argument away from zero.
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
