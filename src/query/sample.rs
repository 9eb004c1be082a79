//! Sample aggregation and deferred binding
//!
//! Samples are computed once per evaluation, before any filter runs. Their
//! values are then pushed into every threshold filter that references them,
//! in the top-level filter as well as in event definitions.

use crate::query::ast::{AggregationFunc, Aggregator, Connective, Filter, FilterArgument, Query, Sample, SampleFormatter};
use crate::query::error::{QueryError, QueryResult};
use crate::query::filter::numeric_value;
use crate::query::identifier::Identifier;
use crate::query::result::EvaluationLog;
use crate::series::DataPoint;

/// Computed sample values in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleValues {
    values: Vec<(Identifier, f64)>,
}

impl SampleValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value, replacing an earlier one for the same identifier
    pub fn insert(&mut self, identifier: Identifier, value: f64) {
        match self.values.iter_mut().find(|(id, _)| *id == identifier) {
            Some(entry) => entry.1 = value,
            None => self.values.push((identifier, value)),
        }
    }

    pub fn get(&self, identifier: &Identifier) -> Option<f64> {
        self.values
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, f64)> {
        self.values.iter().map(|(id, v)| (id, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Compute the value of every sample over `points`
///
/// `points` must be sorted by timestamp. Degenerate aggregates and echo
/// formatters add entries to `log`.
pub fn compute_sample_values(
    samples: &[Sample],
    points: &[DataPoint],
    log: &mut EvaluationLog,
) -> QueryResult<SampleValues> {
    let mut values = SampleValues::new();

    for sample in samples {
        let value = aggregate(sample, points, log)?;
        tracing::debug!(
            sample = %sample.identifier(),
            func = %sample.aggregator().func(),
            value,
            "Computed sample"
        );

        if let Some(formatter @ SampleFormatter::Echo { decimals }) = sample.formatter() {
            formatter.validate()?;
            log.info(format!(
                "{} = {:.*}",
                sample.identifier(),
                decimals,
                value
            ));
        }

        values.insert(sample.identifier().clone(), value);
    }

    Ok(values)
}

fn aggregate(sample: &Sample, points: &[DataPoint], log: &mut EvaluationLog) -> QueryResult<f64> {
    let name = sample.identifier();

    match sample.aggregator() {
        Aggregator::Global(AggregationFunc::Integral) => {
            let series = points
                .iter()
                .map(|p| numeric_value(p).map(|v| (p.timestamp as f64 / 1000.0, v)))
                .collect::<QueryResult<Vec<_>>>()?;
            Ok(integral(&series))
        }
        Aggregator::Global(func) => {
            let values = points.iter().map(numeric_value).collect::<QueryResult<Vec<_>>>()?;
            statistic(*func, &values, name, log)
        }
        Aggregator::Local { func, window } => {
            let values = points
                .iter()
                .filter(|p| window.contains(p.timestamp))
                .map(numeric_value)
                .collect::<QueryResult<Vec<_>>>()?;
            statistic(*func, &values, name, log)
        }
        Aggregator::Temporal {
            func,
            unit,
            periods,
        } => {
            let durations: Vec<f64> = periods
                .iter()
                .map(|p| unit.convert(p.duration_millis()))
                .collect();
            statistic(*func, &durations, name, log)
        }
    }
}

fn statistic(
    func: AggregationFunc,
    values: &[f64],
    name: &Identifier,
    log: &mut EvaluationLog,
) -> QueryResult<f64> {
    let value = match func {
        AggregationFunc::Avg => average(values),
        AggregationFunc::Sum => values.iter().sum(),
        AggregationFunc::Count => values.len() as f64,
        AggregationFunc::StdDev => std_dev(values),
        AggregationFunc::Min | AggregationFunc::Max if values.is_empty() => {
            log.warn(format!(
                "sample '{}': {} of an empty value set defaults to 0",
                name, func
            ));
            0.0
        }
        AggregationFunc::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationFunc::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationFunc::Integral => {
            return Err(QueryError::InvalidConfiguration(format!(
                "sample '{}': integral is only defined for global aggregation",
                name
            )))
        }
    };
    Ok(value)
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = average(values);
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}

/// Trapezoidal area under `(seconds, value)` pairs
fn integral(series: &[(f64, f64)]) -> f64 {
    series
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
        .sum()
}

/// Bind computed values into the query's samples and filter arguments
///
/// Walks every threshold filter of the top-level filter and of each event
/// definition, looking through negations.
pub fn bind_connective_arguments(query: &mut Query, values: &SampleValues) -> QueryResult<()> {
    for sample in &mut query.samples {
        if let Some(value) = values.get(sample.identifier()) {
            sample.value.bind(value);
        }
    }

    if let Some(filter) = &mut query.filter {
        bind_connective(filter, values)?;
    }
    for event in &mut query.events {
        bind_connective(&mut event.definition, values)?;
    }

    Ok(())
}

fn bind_connective(connective: &mut Connective, values: &SampleValues) -> QueryResult<()> {
    connective
        .filters
        .iter_mut()
        .try_for_each(|filter| bind_filter(filter, values))
}

fn bind_filter(filter: &mut Filter, values: &SampleValues) -> QueryResult<()> {
    match filter {
        Filter::Threshold {
            argument: FilterArgument::Sample(reference),
            ..
        } => {
            let value = values.get(reference.identifier()).ok_or_else(|| {
                QueryError::Evaluation(format!(
                    "Sample '{}' referenced by filter has not been computed. \
                     Is it declared in the 'SAMPLES' directive?",
                    reference.identifier()
                ))
            })?;
            reference.binding.bind(value);
            Ok(())
        }
        Filter::Not(inner) => bind_filter(inner, values),
        Filter::Threshold { .. } | Filter::Temporal { .. } | Filter::Deviation { .. } => Ok(()),
    }
}
