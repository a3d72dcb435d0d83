//! Metric aggregation over the sales dataset.

pub mod aggregator;
pub mod stats;

pub use aggregator::*;
