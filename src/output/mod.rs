//! Output module for reporting rule and rewrite statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, RuleStatistics};
