//! Update metrics and logging sinks.
//!
//! - [`DrqMetrics`]: batch-mean scalars of one update
//! - [`ConsoleLogger`]: tabular console output
//! - [`CsvLogger`]: CSV file for analysis
//! - [`MultiLogger`]: combine several loggers

pub mod drq_metrics;
pub mod logger;

pub use drq_metrics::DrqMetrics;
pub use logger::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, UpdateSnapshot};
