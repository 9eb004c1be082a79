//! Point-wise filter and connective evaluation

use crate::query::ast::{Connective, ConnectiveKind, DeviationMode, Filter, TemporalOp, ThresholdOp};
use crate::query::error::{QueryError, QueryResult};
use crate::series::{format_instant, DataPoint};

/// Numeric value of a data point, or an evaluation error naming its timestamp
pub(crate) fn numeric_value(point: &DataPoint) -> QueryResult<f64> {
    point.as_decimal().ok_or_else(|| {
        QueryError::Evaluation(format!(
            "data point at {} has non-numeric value '{}'",
            format_instant(point.timestamp),
            point.value
        ))
    })
}

impl Filter {
    /// Check whether a data point satisfies this filter
    pub fn evaluate(&self, point: &DataPoint) -> QueryResult<bool> {
        match self {
            Filter::Threshold { op, argument } => {
                let threshold = argument.value()?;
                let value = numeric_value(point)?;
                Ok(match op {
                    ThresholdOp::Lt => value < threshold,
                    ThresholdOp::Gt => value > threshold,
                })
            }
            Filter::Temporal { op, instant } => Ok(match op {
                TemporalOp::Before => point.timestamp < *instant,
                TemporalOp::After => point.timestamp > *instant,
            }),
            Filter::Deviation {
                mode,
                reference,
                max_deviation,
            } => {
                let value = numeric_value(point)?;
                let deviation = (value - reference).abs();
                Ok(match mode {
                    DeviationMode::Absolute => deviation <= *max_deviation,
                    DeviationMode::Relative => deviation / reference.abs() <= *max_deviation,
                })
            }
            Filter::Not(inner) => inner.evaluate(point).map(|matched| !matched),
        }
    }
}

impl Connective {
    /// Combine the filters of this connective, short-circuiting
    pub fn evaluate(&self, point: &DataPoint) -> QueryResult<bool> {
        match self.kind() {
            ConnectiveKind::And => {
                for filter in self.filters() {
                    if !filter.evaluate(point)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ConnectiveKind::Or => {
                for filter in self.filters() {
                    if filter.evaluate(point)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}
