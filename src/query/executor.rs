//! Query Evaluator
//!
//! Evaluates a validated `Query` against a series of data points in a single
//! pass:
//!
//! ```text
//! Samples → Bind → Filter → Events → Choice → Project
//! ```
//!
//! Samples are computed over the whole input. The top-level filter then
//! selects the points that events are detected on and that a `data points`
//! yield reports. Binding happens on a private copy, so one `Query` can be
//! evaluated any number of times.

use crate::query::error::QueryResult;
use crate::query::result::{project, EvaluationLog, Projection, QueryOutput};
use crate::query::sample::{bind_connective_arguments, compute_sample_values};
use crate::query::Query;
use crate::series::DataPoint;
use serde::Serialize;
use std::borrow::Cow;
use std::time::Instant;
use uuid::Uuid;

/// Result of a query evaluation
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Identifier of this evaluation, also recorded on its tracing span
    pub evaluation_id: Uuid,
    /// The projected result
    pub output: QueryOutput,
    /// Informational and warning messages emitted while evaluating
    pub logs: EvaluationLog,
    /// Number of input points
    pub points_scanned: usize,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Query evaluator
#[derive(Debug, Clone, Default)]
pub struct QueryEvaluator;

impl QueryEvaluator {
    /// Create a new evaluator
    pub fn new() -> Self {
        Self
    }

    /// Parse and evaluate a query string
    pub fn evaluate_str(&self, query_str: &str, points: &[DataPoint]) -> QueryResult<QueryOutcome> {
        let query = crate::query::parser::parse_query(query_str)?;
        self.evaluate(&query, points)
    }

    /// Evaluate a query over `points`
    ///
    /// Points do not need to be ordered; they are sorted by timestamp first
    /// when they are not.
    pub fn evaluate(&self, query: &Query, points: &[DataPoint]) -> QueryResult<QueryOutcome> {
        let evaluation_id = Uuid::new_v4();
        let span = tracing::info_span!("evaluate", evaluation_id = %evaluation_id);
        let _guard = span.enter();

        let start = Instant::now();
        let points = sorted(points);
        let points_scanned = points.len();
        let mut logs = EvaluationLog::new();
        let mut working = query.clone();

        // 1. Compute samples and bind them into filter arguments
        let sample_values = compute_sample_values(working.samples(), &points, &mut logs)?;
        bind_connective_arguments(&mut working, &sample_values)?;

        // 2. Apply the top-level filter
        let filtered = match working.filter() {
            Some(filter) => {
                let mut kept = Vec::new();
                for point in points.iter() {
                    if filter.evaluate(point)? {
                        kept.push(point.clone());
                    }
                }
                kept
            }
            None => points.into_owned(),
        };
        tracing::debug!(kept = filtered.len(), of = points_scanned, "Applied filter");

        // 3. Detect event periods
        let event_periods = working
            .events()
            .iter()
            .map(|event| {
                event
                    .detect_periods(&filtered)
                    .map(|periods| (event.identifier().clone(), periods))
            })
            .collect::<QueryResult<Vec<_>>>()?;

        // 4. Relate the two chosen events
        let choice_periods = working.choice().map(|choice| {
            let periods = choice.evaluate(&choice.annotated_periods(&event_periods));
            tracing::debug!(
                operator = %choice.operator(),
                periods = periods.len(),
                "Evaluated choice"
            );
            periods
        });

        // 5. Project
        let output = project(
            &working,
            Projection {
                points: filtered,
                event_periods: &event_periods,
                choice_periods,
                sample_values: &sample_values,
            },
        )?;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            points = points_scanned,
            events = event_periods.len(),
            elapsed_ms = execution_time_ms,
            "Query evaluated"
        );

        Ok(QueryOutcome {
            evaluation_id,
            output,
            logs,
            points_scanned,
            execution_time_ms,
        })
    }
}

/// Borrow `points` if already ordered by timestamp, else sort a copy
fn sorted(points: &[DataPoint]) -> Cow<'_, [DataPoint]> {
    if points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
        Cow::Borrowed(points)
    } else {
        let mut owned = points.to_vec();
        owned.sort_by_key(|p| p.timestamp);
        Cow::Owned(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{
        AggregationFunc, Aggregator, Choice, Connective, Event, Filter, FilterArgument, Sample,
        YieldFormat,
    };
    use crate::query::error::QueryError;
    use crate::query::identifier::Identifier;
    use crate::query::period::{DurationRange, Period, TimeUnit};
    use crate::query::result::NamedValue;

    fn id(name: &str) -> Identifier {
        Identifier::new(name).unwrap()
    }

    /// One point per second with the given values
    fn series(values: &[f64]) -> Vec<DataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DataPoint::decimal(i as i64 * 1000, *v))
            .collect()
    }

    fn threshold_event(name: &str, filter: Filter) -> Event {
        Event::new(id(name), Connective::and(vec![filter]).unwrap())
    }

    fn periods_of(outcome: &QueryOutcome) -> Vec<(usize, i64, i64)> {
        match &outcome.output {
            QueryOutput::Periods(periods) => periods.iter().map(|p| (p.index, p.start, p.end)).collect(),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_data_points_with_sample_threshold() {
        let query = Query::builder()
            .sample(Sample::new(id("mean"), Aggregator::global(AggregationFunc::Avg)))
            .filter(Connective::and(vec![Filter::gt(FilterArgument::sample(id("mean")))]).unwrap())
            .yields(YieldFormat::DataPoints)
            .build()
            .unwrap();

        let outcome = QueryEvaluator::new()
            .evaluate(&query, &series(&[1.0, 5.0, 2.0, 8.0]))
            .unwrap();

        assert_eq!(
            outcome.output,
            QueryOutput::DataPoints(vec![DataPoint::decimal(1000, 5.0), DataPoint::decimal(3000, 8.0)])
        );
        assert_eq!(outcome.points_scanned, 4);

        // The caller's query is left unbound
        assert_eq!(
            query.samples()[0].value(),
            Err(QueryError::UnboundValue("mean".to_string()))
        );
    }

    #[test]
    fn test_data_points_without_filter() {
        let query = Query::builder().yields(YieldFormat::DataPoints).build().unwrap();
        let points = series(&[3.0, 1.0]);

        let outcome = QueryEvaluator::new().evaluate(&query, &points).unwrap();
        assert_eq!(outcome.output, QueryOutput::DataPoints(points));
    }

    #[test]
    fn test_unsorted_input_is_ordered() {
        let query = Query::builder().yields(YieldFormat::DataPoints).build().unwrap();
        let points = vec![DataPoint::decimal(2000, 2.0), DataPoint::decimal(1000, 1.0)];

        let outcome = QueryEvaluator::new().evaluate(&query, &points).unwrap();
        assert_eq!(
            outcome.output,
            QueryOutput::DataPoints(vec![DataPoint::decimal(1000, 1.0), DataPoint::decimal(2000, 2.0)])
        );
    }

    #[test]
    fn test_single_event_periods() {
        let query = Query::builder()
            .event(threshold_event("low", Filter::lt(FilterArgument::literal(5.0))))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap();

        let outcome = QueryEvaluator::new()
            .evaluate(&query, &series(&[1.0, 2.0, 9.0, 1.0]))
            .unwrap();
        assert_eq!(periods_of(&outcome), vec![(0, 0, 1000), (1, 3000, 3000)]);
    }

    #[test]
    fn test_events_see_filtered_points() {
        let query = Query::builder()
            .filter(Connective::and(vec![Filter::before(2000)]).unwrap())
            .event(threshold_event("low", Filter::lt(FilterArgument::literal(5.0))))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap();

        let outcome = QueryEvaluator::new()
            .evaluate(&query, &series(&[1.0, 2.0, 1.0, 1.0]))
            .unwrap();
        assert_eq!(periods_of(&outcome), vec![(0, 0, 1000)]);
    }

    #[test]
    fn test_precedes_pipeline() {
        let query = Query::builder()
            .event(threshold_event("low", Filter::lt(FilterArgument::literal(3.0))))
            .event(threshold_event("high", Filter::gt(FilterArgument::literal(7.0))))
            .choice(Choice::precedes(id("low"), id("high")))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap();

        // low [0,1], mid, high [3,4], mid, low [6,6], high [7,7]
        let points = series(&[1.0, 1.0, 5.0, 9.0, 9.0, 5.0, 1.0, 9.0]);
        let outcome = QueryEvaluator::new().evaluate(&query, &points).unwrap();

        assert_eq!(periods_of(&outcome), vec![(0, 0, 4000), (1, 6000, 7000)]);
    }

    #[test]
    fn test_precedes_with_tolerance() {
        let query = Query::builder()
            .event(threshold_event("low", Filter::lt(FilterArgument::literal(3.0))))
            .event(threshold_event("high", Filter::gt(FilterArgument::literal(7.0))))
            .choice(
                Choice::precedes(id("low"), id("high"))
                    .within(DurationRange::closed(0.0, 1.0, TimeUnit::Seconds).unwrap()),
            )
            .yields(YieldFormat::LongestPeriod)
            .build()
            .unwrap();

        // Gaps: 2 s between the first pair, 1 s between the second
        let points = series(&[1.0, 5.0, 9.0, 1.0, 1.0, 9.0]);
        let outcome = QueryEvaluator::new().evaluate(&query, &points).unwrap();

        assert_eq!(outcome.output, QueryOutput::Period(Period::new(0, 3000, 5000)));
    }

    #[test]
    fn test_several_events_without_choice() {
        let query = Query::builder()
            .event(threshold_event("low", Filter::lt(FilterArgument::literal(3.0))))
            .event(threshold_event("high", Filter::gt(FilterArgument::literal(7.0))))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap();

        let err = QueryEvaluator::new().evaluate(&query, &series(&[1.0])).unwrap_err();
        assert!(matches!(err, QueryError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_no_events_yields_empty_periods() {
        let query = Query::builder().yields(YieldFormat::AllPeriods).build().unwrap();
        let outcome = QueryEvaluator::new().evaluate(&query, &series(&[1.0])).unwrap();
        assert!(periods_of(&outcome).is_empty());
    }

    #[test]
    fn test_sample_yields() {
        let query = Query::builder()
            .sample(Sample::new(id("total"), Aggregator::global(AggregationFunc::Sum)))
            .sample(Sample::new(id("mean"), Aggregator::global(AggregationFunc::Avg)))
            .yields(YieldFormat::SampleSet(vec![id("mean"), id("total")]))
            .build()
            .unwrap();

        let outcome = QueryEvaluator::new()
            .evaluate(&query, &series(&[1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(
            outcome.output,
            QueryOutput::Samples(vec![
                NamedValue {
                    identifier: id("mean"),
                    value: 2.0
                },
                NamedValue {
                    identifier: id("total"),
                    value: 6.0
                },
            ])
        );
    }

    #[test]
    fn test_average_of_empty_input() {
        let query = Query::builder()
            .sample(Sample::new(id("mean"), Aggregator::global(AggregationFunc::Avg)))
            .yields(YieldFormat::Sample(id("mean")))
            .build()
            .unwrap();

        let outcome = QueryEvaluator::new().evaluate(&query, &[]).unwrap();
        assert_eq!(
            outcome.output,
            QueryOutput::Sample(NamedValue {
                identifier: id("mean"),
                value: 0.0
            })
        );
    }

    #[test]
    fn test_non_numeric_value_fails_evaluation() {
        let query = Query::builder()
            .filter(Connective::and(vec![Filter::lt(FilterArgument::literal(1.0))]).unwrap())
            .yields(YieldFormat::DataPoints)
            .build()
            .unwrap();

        let points = vec![DataPoint::decimal(0, 0.5), DataPoint::new(1000, "offline")];
        let err = QueryEvaluator::new().evaluate(&query, &points).unwrap_err();
        assert!(matches!(err, QueryError::Evaluation(_)));
    }

    #[test]
    fn test_outcome_serialization() {
        let query = Query::builder().yields(YieldFormat::ShortestPeriod).build().unwrap();
        let outcome = QueryEvaluator::new().evaluate(&query, &[]).unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["output"]["type"], "period");
        assert_eq!(json["output"]["value"]["empty"], true);
        assert_eq!(json["evaluation_id"], outcome.evaluation_id.to_string());
    }
}
