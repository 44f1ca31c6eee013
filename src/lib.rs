pub mod bayes;
pub mod config;
pub mod cross_validate;
pub mod error;
pub mod record;
pub mod simplex;
pub mod stats;
pub mod synthetic;
pub mod table;
pub mod thresholds;
pub mod trainer;

pub use error::{Error, Result};

pub const LOG_TARGET: &str = "case-bayes";
