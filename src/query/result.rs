//! Query outputs and result projection
//!
//! The projector turns the intermediate products of an evaluation (filtered
//! points, per-event periods, the choice output, sample values) into the one
//! shape requested by the YIELD clause.

use crate::query::ast::{Query, YieldFormat};
use crate::query::error::{QueryError, QueryResult};
use crate::query::identifier::Identifier;
use crate::query::period::{Period, PeriodSet};
use crate::query::sample::SampleValues;
use crate::series::DataPoint;
use serde::Serialize;

/// Severity of an evaluation log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
}

/// A message produced while evaluating a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Messages attached to a query result, in emission order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvaluationLog {
    entries: Vec<LogEntry>,
}

impl EvaluationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.entries.push(LogEntry {
            level: LogLevel::Info,
            message,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.entries.push(LogEntry {
            level: LogLevel::Warning,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A sample value reported by name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedValue {
    pub identifier: Identifier,
    pub value: f64,
}

/// The final value of a query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryOutput {
    /// Points passing the top-level filter, in input order
    DataPoints(Vec<DataPoint>),
    /// All periods of the selected event or of the choice
    Periods(PeriodSet),
    /// A single period, possibly `Period::empty()`
    Period(Period),
    /// One sample value
    Sample(NamedValue),
    /// Several sample values in yield-clause order
    Samples(Vec<NamedValue>),
}

/// Intermediate products of an evaluation, consumed by [`project`]
#[derive(Debug)]
pub(crate) struct Projection<'a> {
    pub points: Vec<DataPoint>,
    pub event_periods: &'a [(Identifier, PeriodSet)],
    pub choice_periods: Option<PeriodSet>,
    pub sample_values: &'a SampleValues,
}

/// Shape the evaluation products into the requested output
pub(crate) fn project(query: &Query, products: Projection<'_>) -> QueryResult<QueryOutput> {
    match query.result() {
        YieldFormat::DataPoints => Ok(QueryOutput::DataPoints(products.points)),
        YieldFormat::AllPeriods => Ok(QueryOutput::Periods(selected_periods(products)?)),
        YieldFormat::LongestPeriod => {
            let periods = selected_periods(products)?;
            Ok(QueryOutput::Period(
                periods.longest().copied().unwrap_or_else(Period::empty),
            ))
        }
        YieldFormat::ShortestPeriod => {
            let periods = selected_periods(products)?;
            Ok(QueryOutput::Period(
                periods.shortest().copied().unwrap_or_else(Period::empty),
            ))
        }
        YieldFormat::Sample(identifier) => Ok(QueryOutput::Sample(named_value(
            identifier,
            products.sample_values,
        )?)),
        YieldFormat::SampleSet(identifiers) => identifiers
            .iter()
            .map(|id| named_value(id, products.sample_values))
            .collect::<QueryResult<Vec<_>>>()
            .map(QueryOutput::Samples),
    }
}

/// Periods reported for period-shaped outputs
fn selected_periods(products: Projection<'_>) -> QueryResult<PeriodSet> {
    if let Some(periods) = products.choice_periods {
        return Ok(periods);
    }

    match products.event_periods {
        [] => Ok(PeriodSet::default()),
        [(_, periods)] => Ok(periods.clone()),
        several => Err(QueryError::InvalidConfiguration(format!(
            "cannot yield periods of {} events without a CHOOSE statement",
            several.len()
        ))),
    }
}

fn named_value(identifier: &Identifier, values: &SampleValues) -> QueryResult<NamedValue> {
    let value = values
        .get(identifier)
        .ok_or_else(|| QueryError::UnboundValue(identifier.name().to_string()))?;
    Ok(NamedValue {
        identifier: identifier.clone(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{AggregationFunc, Aggregator, Connective, Event, Filter, FilterArgument, Sample};

    fn id(name: &str) -> Identifier {
        Identifier::new(name).unwrap()
    }

    fn event(name: &str) -> Event {
        Event::new(
            id(name),
            Connective::and(vec![Filter::lt(FilterArgument::literal(1.0))]).unwrap(),
        )
    }

    fn periods(spans: &[(i64, i64)]) -> PeriodSet {
        spans
            .iter()
            .enumerate()
            .map(|(i, (s, e))| Period::new(i, *s, *e))
            .collect()
    }

    #[test]
    fn test_longest_and_shortest() {
        let query = Query::builder()
            .event(event("e1"))
            .yields(YieldFormat::LongestPeriod)
            .build()
            .unwrap();
        let values = SampleValues::default();
        let event_periods = vec![(id("e1"), periods(&[(0, 10), (20, 40), (50, 70)]))];

        let products = Projection {
            points: Vec::new(),
            event_periods: &event_periods,
            choice_periods: None,
            sample_values: &values,
        };
        assert_eq!(
            project(&query, products).unwrap(),
            QueryOutput::Period(Period::new(1, 20, 40))
        );
    }

    #[test]
    fn test_longest_of_nothing_is_empty_period() {
        let query = Query::builder()
            .yields(YieldFormat::ShortestPeriod)
            .build()
            .unwrap();
        let values = SampleValues::default();

        let products = Projection {
            points: Vec::new(),
            event_periods: &[],
            choice_periods: None,
            sample_values: &values,
        };
        match project(&query, products).unwrap() {
            QueryOutput::Period(p) => assert!(p.is_empty()),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_all_periods_needs_choice_for_several_events() {
        let query = Query::builder()
            .event(event("e1"))
            .event(event("e2"))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap();
        let values = SampleValues::default();
        let event_periods = vec![(id("e1"), periods(&[(0, 1)])), (id("e2"), periods(&[(2, 3)]))];

        let products = Projection {
            points: Vec::new(),
            event_periods: &event_periods,
            choice_periods: None,
            sample_values: &values,
        };
        assert!(matches!(
            project(&query, products),
            Err(QueryError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_sample_set_in_yield_order() {
        let query = Query::builder()
            .sample(Sample::new(id("a"), Aggregator::global(AggregationFunc::Min)))
            .sample(Sample::new(id("b"), Aggregator::global(AggregationFunc::Max)))
            .yields(YieldFormat::SampleSet(vec![id("b"), id("a")]))
            .build()
            .unwrap();

        let mut values = SampleValues::default();
        values.insert(id("a"), 1.0);
        values.insert(id("b"), 9.0);

        let products = Projection {
            points: Vec::new(),
            event_periods: &[],
            choice_periods: None,
            sample_values: &values,
        };
        let output = project(&query, products).unwrap();
        assert_eq!(
            output,
            QueryOutput::Samples(vec![
                NamedValue {
                    identifier: id("b"),
                    value: 9.0
                },
                NamedValue {
                    identifier: id("a"),
                    value: 1.0
                },
            ])
        );
    }

    #[test]
    fn test_output_serialization() {
        let output = QueryOutput::Sample(NamedValue {
            identifier: id("s1"),
            value: 2.5,
        });
        assert_eq!(
            serde_json::to_string(&output).unwrap(),
            r#"{"type":"sample","value":{"identifier":"s1","value":2.5}}"#
        );

        let mut log = EvaluationLog::new();
        log.warn("empty input");
        assert_eq!(
            serde_json::to_string(&log).unwrap(),
            r#"[{"level":"warning","message":"empty input"}]"#
        );
    }
}
