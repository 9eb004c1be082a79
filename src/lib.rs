//! # Tempora
//!
//! Event query language for time-series data. A query declares samples
//! (aggregates over the series), filters data points, detects events
//! (maximal runs of points matching a predicate), relates two events in time
//! and yields points, periods or sample values.
//!
//! ## Modules
//!
//! - [`query`]: Query model, parser and evaluator
//! - [`series`]: Data points and CSV/JSON series input
//! - [`config`]: File and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tempora::query::QueryEvaluator;
//! use tempora::series::DataPoint;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let points: Vec<DataPoint> = (0..10)
//!         .map(|i| DataPoint::decimal(i * 1000, (i % 4) as f64))
//!         .collect();
//!
//!     let outcome = QueryEvaluator::new().evaluate_str(
//!         "USING EVENTS: AND(lt(2)) AS low
//!          YIELD: longest period",
//!         &points,
//!     )?;
//!
//!     println!("{}", serde_json::to_string(&outcome.output)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod query;
pub mod series;

// Re-export top-level types for convenience
pub use series::{DataPoint, InputError, InputFormat, SeriesReader, TimeRange, Value};

pub use query::{
    parse_query, Identifier, Period, PeriodSet, Query, QueryBuilder, QueryError, QueryEvaluator,
    QueryOutcome, QueryOutput, YieldFormat,
};

pub use config::{Config, ConfigError, InputConfig, LoggingConfig, OutputConfig};
