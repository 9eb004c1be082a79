//! Time-series input
//!
//! - **types**: Data points, typed values and time ranges
//! - **reader**: CSV/JSON loading of data point series
//! - **error**: Input error types
//!
//! The query engine consumes an ordered `&[DataPoint]`; where those points
//! come from is up to the caller. The reader covers the common file cases.

pub mod error;
pub mod reader;
pub mod types;

pub use error::{InputError, InputResult};
pub use reader::{InputFormat, SeriesReader};
pub use types::{format_instant, parse_instant, DataPoint, TimeRange, Value};
