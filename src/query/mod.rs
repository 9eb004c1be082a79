//! Tempora Query Engine
//!
//! An event query language for time-series data:
//!
//! - **AST**: Query model and the validating query builder
//! - **Identifier**: Sample/event names and their registry
//! - **Period**: Periods, time units and duration ranges
//! - **Filter**: Point-wise filter and connective evaluation
//! - **Sample**: Sample aggregation and deferred binding
//! - **Event**: Period detection for events
//! - **Choice**: PRECEDES/FOLLOWS between two events
//! - **Result**: Output shapes and result projection
//! - **Parser**: Parse query strings into a `Query`
//! - **Executor**: Evaluate queries against data points
//!
//! # Query Language
//!
//! ```text
//! [WITH SAMPLES: avg(_input) AS s1, ...]
//! [APPLY FILTER: AND(gt(s1), ...)]
//! [USING EVENTS: AND(lt(3.5)) [FOR [1,5] minutes] AS low, ...]
//! [CHOOSE: low precedes high [WITHIN [0,30] seconds]]
//! YIELD: data points | all periods | longest period | shortest period
//!      | sample s1 | samples s1, s2
//! ```
//!
//! # Examples
//!
//! ## Using Query Builder
//!
//! ```rust,ignore
//! use tempora::query::*;
//!
//! let low = Identifier::new("low")?;
//! let query = Query::builder()
//!     .event(Event::new(
//!         low.clone(),
//!         Connective::and(vec![Filter::lt(FilterArgument::literal(3.5))])?,
//!     ))
//!     .yields(YieldFormat::LongestPeriod)
//!     .build()?;
//!
//! let outcome = QueryEvaluator::new().evaluate(&query, &points)?;
//! ```
//!
//! ## Using Query String
//!
//! ```rust,ignore
//! let outcome = QueryEvaluator::new().evaluate_str(
//!     "WITH SAMPLES: avg(_input) AS mean
//!      USING EVENTS: AND(gt(mean)) AS high
//!      YIELD: all periods",
//!     &points,
//! )?;
//! ```

mod ast;
mod choice;
mod error;
mod event;
mod executor;
mod filter;
mod identifier;
mod parser;
mod period;
mod result;
mod sample;

pub use ast::{
    AggregationFunc, Aggregator, Binding, Choice, ChoiceOperator, Connective, ConnectiveKind,
    DeviationMode, Event, Filter, FilterArgument, Query, QueryBuilder, Sample, SampleFormatter,
    SampleRef, TemporalOp, ThresholdOp, YieldFormat,
};
pub use error::{QueryError, QueryResult};
pub use executor::{QueryEvaluator, QueryOutcome};
pub use identifier::{Identifier, IdentifierKind, IdentifierRegistry, RESERVED_PREFIX};
pub use parser::parse_query;
pub use period::{AnnotatedPeriod, DurationRange, Period, PeriodSet, RangeBound, TimeUnit};
pub use result::{EvaluationLog, LogEntry, LogLevel, NamedValue, QueryOutput};
pub use sample::{bind_connective_arguments, compute_sample_values, SampleValues};
