use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use case_bayes::bayes::{self, PredictionMode};
use case_bayes::config::{
    CrossValidationConfig, DEFAULT_FOLD_COUNT, DEFAULT_GRID_STEP_COUNT,
    DEFAULT_OPTIMIZER_ITERATIONS, TrainConfig, default_feature_keys,
};
use case_bayes::cross_validate;
use case_bayes::record::FeatureRecord;
use case_bayes::synthetic::{self, SyntheticConfig};
use case_bayes::table;
use case_bayes::thresholds::{self, ThresholdSet};
use case_bayes::trainer;

const DEFAULT_FEATURE_FILE: &str = "data/features.json";
const DEFAULT_THRESHOLD_FILE: &str = "data/thresholds.json";

#[derive(Debug, Clone, Parser)]
#[clap(author, version, about)]
struct Opt {
    #[clap(subcommand)]
    command: Command,

    /// Logging filter, `<target>=<level>` or a bare level, e.g. `-l case-bayes=debug`.
    #[clap(long, short, global = true, default_value = "info")]
    log: String,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Learn thresholds with k-fold cross-validation and write the last fold's set.
    Train(TrainOpts),
    /// Score a saved threshold table against a feature table.
    Evaluate(EvaluateOpts),
    /// Print win/lose chances for every row of a feature table.
    Predict(PredictOpts),
    /// Cross-validate on a seeded synthetic table.
    Demo(DemoOpts),
}

#[derive(Debug, Clone, Args)]
struct SearchOpts {
    /// Comma-separated feature keys, in threshold-table order.
    #[clap(long, env = "CASE_BAYES_KEYS", value_delimiter = ',')]
    keys: Option<Vec<String>>,

    /// Pin a threshold, `key=value`. Repeatable; replaces the default `bench_size=8.5`.
    #[clap(long = "force", value_parser = parse_forced)]
    forced: Vec<(String, f64)>,

    #[clap(long, short = 'n', env = "CASE_BAYES_GRID_STEPS", default_value_t = DEFAULT_GRID_STEP_COUNT)]
    grid_steps: usize,

    #[clap(long, short = 'o', env = "CASE_BAYES_OPTIMIZE_STEPS", default_value_t = DEFAULT_OPTIMIZER_ITERATIONS)]
    optimize_steps: usize,

    #[clap(long, short = 'k', env = "CASE_BAYES_FOLDS", default_value_t = DEFAULT_FOLD_COUNT)]
    folds: usize,

    /// Train every fold from scratch (folds then run in parallel).
    #[clap(long)]
    cold_folds: bool,

    #[clap(long, default_value = "indicator")]
    mode: PredictionMode,
}

#[derive(Debug, Clone, Args)]
struct TrainOpts {
    #[clap(long, env = "CASE_BAYES_FEATURES", default_value = DEFAULT_FEATURE_FILE)]
    feature_file: PathBuf,

    #[clap(long, env = "CASE_BAYES_THRESHOLDS", default_value = DEFAULT_THRESHOLD_FILE)]
    out_file: PathBuf,

    /// Skip cross-validation and train once on every row.
    #[clap(long)]
    all: bool,

    #[clap(flatten)]
    search: SearchOpts,
}

#[derive(Debug, Clone, Args)]
struct EvaluateOpts {
    #[clap(long, env = "CASE_BAYES_FEATURES", default_value = DEFAULT_FEATURE_FILE)]
    feature_file: PathBuf,

    #[clap(long, env = "CASE_BAYES_THRESHOLDS", default_value = DEFAULT_THRESHOLD_FILE)]
    threshold_file: PathBuf,

    /// Evaluate on every row instead of the leading 10% holdout.
    #[clap(long)]
    all: bool,

    /// Flip narrow wins on eight-member benches to losses.
    #[clap(long)]
    tie_break: bool,

    #[clap(long, default_value = "indicator")]
    mode: PredictionMode,
}

#[derive(Debug, Clone, Args)]
struct PredictOpts {
    /// Feature table of cases to score.
    input: PathBuf,

    #[clap(long, env = "CASE_BAYES_THRESHOLDS", default_value = DEFAULT_THRESHOLD_FILE)]
    threshold_file: PathBuf,

    /// Report `0.8 p + 0.1` instead of the raw posterior.
    #[clap(long)]
    soften: bool,

    #[clap(long)]
    tie_break: bool,

    #[clap(long, default_value = "indicator")]
    mode: PredictionMode,
}

#[derive(Debug, Clone, Args)]
struct DemoOpts {
    #[clap(long, default_value_t = 400)]
    rows: usize,

    #[clap(long, default_value_t = 4)]
    features: usize,

    #[clap(long, default_value_t = 7)]
    seed: u64,

    #[clap(flatten)]
    search: SearchOpts,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let Opt { command, log } = Opt::parse();
    let filter = EnvFilter::from_default_env().add_directive(
        log.parse()
            .with_context(|| format!("invalid log directive `{log}`"))?,
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match command {
        Command::Train(opts) => run_train(opts),
        Command::Evaluate(opts) => run_evaluate(opts),
        Command::Predict(opts) => run_predict(opts),
        Command::Demo(opts) => run_demo(opts),
    }
}

fn run_train(opts: TrainOpts) -> Result<()> {
    let train_cfg = opts.search.train_config(default_feature_keys());
    let records = load_complete(&opts.feature_file, &train_cfg.keys)?;

    let model = if opts.all {
        let set = trainer::train(&records, &train_cfg)?;
        let metrics = bayes::evaluate(&set, &records, opts.search.mode)?;
        println!("In-sample over {} rows", records.len());
        println!("{metrics}");
        set
    } else {
        let cv = cross_validate::cross_validate(&records, &train_cfg, &opts.search.cv_config())?;
        print_folds(&cv.folds);
        println!();
        println!("{}", cv.average);
        cv.model
    };

    thresholds::save_threshold_table(&opts.out_file, &model)
        .with_context(|| format!("write {}", opts.out_file.display()))?;
    println!("thresholds written: {}", opts.out_file.display());
    Ok(())
}

fn run_evaluate(opts: EvaluateOpts) -> Result<()> {
    let set = load_thresholds(&opts.threshold_file)?;
    let records = load_complete(&opts.feature_file, &set.keys())?;
    let (_, test) = table::holdout_split(&records, opts.all);

    let metrics = if opts.tie_break {
        bayes::evaluate_with(&set, test, opts.mode, bayes::even_bench_tie_break)?
    } else {
        bayes::evaluate(&set, test, opts.mode)?
    };
    println!("Evaluated {} of {} rows", test.len(), records.len());
    println!("{metrics}");
    Ok(())
}

fn run_predict(opts: PredictOpts) -> Result<()> {
    let set = load_thresholds(&opts.threshold_file)?;
    let records = table::load_records(&opts.input)
        .with_context(|| format!("load {}", opts.input.display()))?;
    if records.is_empty() {
        return Err(anyhow!("no cases in {}", opts.input.display()));
    }

    for (idx, record) in records.iter().enumerate() {
        let raw = bayes::predict(record, &set, opts.mode)
            .with_context(|| format!("predict row {idx}"))?;
        let p = if opts.soften { bayes::soften(raw) } else { raw };
        let mut side = bayes::decide(p);
        if opts.tie_break {
            side = bayes::even_bench_tie_break(record, p, side);
        }
        println!(
            "row {idx}: win {:.0}% lose {:.0}% -> {}",
            100.0 * p,
            100.0 - 100.0 * p,
            if side.is_win() { "win" } else { "lose" }
        );
    }
    Ok(())
}

fn run_demo(opts: DemoOpts) -> Result<()> {
    let data_cfg = SyntheticConfig {
        rows: opts.rows,
        features: opts.features,
        seed: opts.seed,
        ..Default::default()
    };
    let records = synthetic::generate(&data_cfg);
    let train_cfg = opts
        .search
        .train_config(synthetic::feature_keys(opts.features));

    let cv = cross_validate::cross_validate(&records, &train_cfg, &opts.search.cv_config())?;
    println!(
        "Synthetic cross-validation: rows={} features={} seed={}",
        data_cfg.rows, data_cfg.features, data_cfg.seed
    );
    print_folds(&cv.folds);
    println!();
    println!("{}", cv.average);
    Ok(())
}

impl SearchOpts {
    fn train_config(&self, default_keys: Vec<String>) -> TrainConfig {
        let defaults = TrainConfig::default();
        let keys = self.keys.clone().unwrap_or(default_keys);
        let forced = if self.forced.is_empty() {
            defaults
                .forced
                .into_iter()
                .filter(|(k, _)| keys.contains(k))
                .collect()
        } else {
            self.forced.iter().cloned().collect::<BTreeMap<_, _>>()
        };
        TrainConfig {
            keys,
            forced,
            grid_step_count: self.grid_steps,
            optimizer_iterations: self.optimize_steps,
        }
    }

    fn cv_config(&self) -> CrossValidationConfig {
        CrossValidationConfig {
            fold_count: self.folds,
            warm_start: !self.cold_folds,
            mode: self.mode,
        }
    }
}

fn parse_forced(raw: &str) -> std::result::Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad threshold in `{raw}`: {e}"))?;
    Ok((key.to_string(), value))
}

fn load_complete(path: &Path, keys: &[String]) -> Result<Vec<FeatureRecord>> {
    let records =
        table::load_records(path).with_context(|| format!("load {}", path.display()))?;
    let records = table::retain_complete(records, keys);
    if records.is_empty() {
        return Err(anyhow!("no complete rows in {}", path.display()));
    }
    Ok(records)
}

fn load_thresholds(path: &Path) -> Result<ThresholdSet> {
    thresholds::load_threshold_table(path).with_context(|| format!("load {}", path.display()))
}

fn print_folds(folds: &[cross_validate::FoldReport]) {
    for fold in folds {
        println!("{}", fold_line(fold));
    }
}

fn fold_line(fold: &cross_validate::FoldReport) -> String {
    format!(
        "fold {} samples={} accuracy={} precision={} recall={} positive_rate={}",
        fold.index,
        fold.metrics.samples,
        bayes::percent(Some(fold.metrics.accuracy)),
        bayes::percent(fold.metrics.precision),
        bayes::percent(fold.metrics.recall),
        bayes::percent(Some(fold.metrics.positive_rate))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_thresholds_parse() {
        assert_eq!(
            parse_forced("bench_size=8.5").unwrap(),
            ("bench_size".to_string(), 8.5)
        );
        assert!(parse_forced("bench_size").is_err());
        assert!(parse_forced("=1").is_err());
        assert!(parse_forced("x=abc").is_err());
    }

    #[test]
    fn fold_line_reports_all_four_metrics() {
        let fold = cross_validate::FoldReport {
            index: 2,
            metrics: bayes::Metrics {
                samples: 8,
                accuracy: 0.75,
                precision: None,
                recall: Some(0.5),
                positive_rate: 0.125,
            },
        };
        assert_eq!(
            fold_line(&fold),
            "fold 2 samples=8 accuracy=75.00% precision=undefined recall=50.00% \
             positive_rate=12.50%"
        );
    }

    #[test]
    fn default_force_only_applies_to_configured_keys() {
        let opts = SearchOpts {
            keys: Some(vec!["f0".to_string()]),
            forced: Vec::new(),
            grid_steps: 10,
            optimize_steps: 5,
            folds: 3,
            cold_folds: false,
            mode: PredictionMode::Indicator,
        };
        let cfg = opts.train_config(default_feature_keys());
        assert!(cfg.forced.is_empty());
        assert_eq!(cfg.keys, vec!["f0".to_string()]);
    }

    #[test]
    fn cli_parses_train_flags() {
        let opt = Opt::try_parse_from([
            "case_bayes",
            "train",
            "--all",
            "--force",
            "bench_size=8.5",
            "-k",
            "5",
            "--keys",
            "a,b",
        ])
        .unwrap();
        let Command::Train(train) = opt.command else {
            panic!("expected train");
        };
        assert!(train.all);
        assert_eq!(train.search.folds, 5);
        assert_eq!(train.search.forced, vec![("bench_size".to_string(), 8.5)]);
        assert_eq!(
            train.search.keys,
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }
}
