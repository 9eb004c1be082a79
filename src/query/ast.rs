//! Query model
//!
//! Defines the in-memory form of a query in the event query language:
//!
//! ```text
//! WITH SAMPLES:  avg(_input) AS mean, max(_input) AS peak
//! APPLY FILTER:  AND(NOT(lt(0)))
//! USING EVENTS:  AND(gt(mean)) FOR [2,] minutes AS high,
//!                AND(lt(mean)) AS low
//! CHOOSE:        high precedes low WITHIN [0,30] seconds
//! YIELD:         all periods
//! ```
//!
//! A `Query` is only obtainable through [`QueryBuilder::build`], which runs
//! identifier registration and resolution in section order. The only state
//! that changes after that is deferred binding of sample values, performed
//! by the aggregation engine.

use crate::query::error::{QueryError, QueryResult};
use crate::query::identifier::{Identifier, IdentifierKind, IdentifierRegistry};
use crate::query::period::{DurationRange, Period, TimeUnit};
use crate::series::TimeRange;
use serde::{Deserialize, Serialize};

/// Two-state holder for values computed by the aggregation engine
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Binding {
    /// Not computed yet
    #[default]
    Unbound,
    /// Computed value
    Bound(f64),
}

impl Binding {
    pub fn get(&self) -> Option<f64> {
        match self {
            Self::Unbound => None,
            Self::Bound(v) => Some(*v),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// Transition to `Bound`; an already bound value is kept
    pub(crate) fn bind(&mut self, value: f64) {
        if let Self::Unbound = self {
            *self = Self::Bound(value);
        }
    }
}

/// Statistic computed by an aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunc {
    Avg,
    Max,
    Min,
    Sum,
    Count,
    /// Area under the value-vs-time curve; global aggregation only
    Integral,
    /// Sample standard deviation
    StdDev,
}

impl AggregationFunc {
    /// Parse from the query keyword
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "avg" => Some(Self::Avg),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "integral" => Some(Self::Integral),
            "stddev" => Some(Self::StdDev),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggregationFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Avg => write!(f, "avg"),
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
            Self::Sum => write!(f, "sum"),
            Self::Count => write!(f, "count"),
            Self::Integral => write!(f, "integral"),
            Self::StdDev => write!(f, "stddev"),
        }
    }
}

/// Where an aggregator takes its values from
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator {
    /// Over every input data point
    Global(AggregationFunc),
    /// Over data points inside a `[start, end)` window
    Local {
        func: AggregationFunc,
        window: TimeRange,
    },
    /// Over the durations of explicit periods, expressed in `unit`
    Temporal {
        func: AggregationFunc,
        unit: TimeUnit,
        periods: Vec<Period>,
    },
}

impl Aggregator {
    pub fn global(func: AggregationFunc) -> Self {
        Self::Global(func)
    }

    /// Windowed aggregator over `[lower, upper)`
    pub fn local(func: AggregationFunc, lower: i64, upper: i64) -> QueryResult<Self> {
        let aggregator = Self::Local {
            func,
            window: TimeRange {
                start: lower,
                end: upper,
            },
        };
        aggregator.validate()?;
        Ok(aggregator)
    }

    /// Aggregator over explicit `(start, end)` periods
    pub fn temporal(
        func: AggregationFunc,
        unit: TimeUnit,
        periods: Vec<(i64, i64)>,
    ) -> QueryResult<Self> {
        let periods = periods
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| Period::new(index, start, end))
            .collect();

        let aggregator = Self::Temporal {
            func,
            unit,
            periods,
        };
        aggregator.validate()?;
        Ok(aggregator)
    }

    /// Check the constraints the constructors enforce, for values built
    /// directly from the enum variants
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Self::Global(_) => Ok(()),
            Self::Local { func, window } => {
                global_only(*func)?;
                if !window.is_valid() {
                    return Err(QueryError::InvalidConfiguration(format!(
                        "aggregation window lower bound {} must be before upper bound {}",
                        window.start, window.end
                    )));
                }
                Ok(())
            }
            Self::Temporal { func, periods, .. } => {
                global_only(*func)?;
                if periods.is_empty() {
                    return Err(QueryError::InvalidConfiguration(
                        "temporal aggregation requires at least one period".to_string(),
                    ));
                }
                match periods.iter().find(|p| p.start > p.end) {
                    Some(p) => Err(QueryError::InvalidConfiguration(format!(
                        "period start {} is after its end {}",
                        p.start, p.end
                    ))),
                    None => Ok(()),
                }
            }
        }
    }

    pub fn func(&self) -> AggregationFunc {
        match self {
            Self::Global(func) => *func,
            Self::Local { func, .. } | Self::Temporal { func, .. } => *func,
        }
    }
}

fn global_only(func: AggregationFunc) -> QueryResult<()> {
    if func == AggregationFunc::Integral {
        return Err(QueryError::InvalidConfiguration(
            "integral is only defined for global aggregation".to_string(),
        ));
    }
    Ok(())
}

/// Largest precision the echo formatter accepts
pub const MAX_ECHO_DECIMALS: usize = 17;

/// Output formatter attached to a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormatter {
    /// Report the computed value with a fixed number of decimals
    Echo { decimals: usize },
}

impl SampleFormatter {
    pub fn echo(decimals: usize) -> QueryResult<Self> {
        let formatter = Self::Echo { decimals };
        formatter.validate()?;
        Ok(formatter)
    }

    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Self::Echo { decimals } if *decimals > MAX_ECHO_DECIMALS => {
                Err(QueryError::InvalidConfiguration(format!(
                    "echo supports at most {} decimals, got {}",
                    MAX_ECHO_DECIMALS, decimals
                )))
            }
            Self::Echo { .. } => Ok(()),
        }
    }
}

/// A named scalar derived from the input series
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    identifier: Identifier,
    aggregator: Aggregator,
    formatter: Option<SampleFormatter>,
    pub(crate) value: Binding,
}

impl Sample {
    pub fn new(identifier: Identifier, aggregator: Aggregator) -> Self {
        Self {
            identifier,
            aggregator,
            formatter: None,
            value: Binding::Unbound,
        }
    }

    pub fn with_formatter(mut self, formatter: SampleFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn formatter(&self) -> Option<SampleFormatter> {
        self.formatter
    }

    /// Computed value; `UnboundValue` before the aggregation engine ran
    pub fn value(&self) -> QueryResult<f64> {
        self.value
            .get()
            .ok_or_else(|| QueryError::UnboundValue(self.identifier.name().to_string()))
    }
}

/// Reference from a filter argument to a sample
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRef {
    identifier: Identifier,
    pub(crate) binding: Binding,
}

impl SampleRef {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }
}

/// Argument of a threshold filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArgument {
    /// Numeric constant
    Literal(f64),
    /// Value of a sample, bound before evaluation
    Sample(SampleRef),
}

impl FilterArgument {
    pub fn literal(value: f64) -> Self {
        Self::Literal(value)
    }

    pub fn sample(identifier: Identifier) -> Self {
        Self::Sample(SampleRef {
            identifier,
            binding: Binding::Unbound,
        })
    }

    /// Numeric value; `UnboundValue` for a sample reference not bound yet
    pub fn value(&self) -> QueryResult<f64> {
        match self {
            Self::Literal(v) => Ok(*v),
            Self::Sample(r) => r
                .binding
                .get()
                .ok_or_else(|| QueryError::UnboundValue(r.identifier.name().to_string())),
        }
    }

    pub fn sample_identifier(&self) -> Option<&Identifier> {
        match self {
            Self::Literal(_) => None,
            Self::Sample(r) => Some(&r.identifier),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    /// Strictly lower than
    Lt,
    /// Strictly greater than
    Gt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalOp {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationMode {
    Absolute,
    Relative,
}

/// Single-point filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Threshold {
        op: ThresholdOp,
        argument: FilterArgument,
    },
    Temporal {
        op: TemporalOp,
        instant: i64,
    },
    Deviation {
        mode: DeviationMode,
        reference: f64,
        max_deviation: f64,
    },
    Not(Box<Filter>),
}

impl Filter {
    pub fn lt(argument: FilterArgument) -> Self {
        Self::Threshold {
            op: ThresholdOp::Lt,
            argument,
        }
    }

    pub fn gt(argument: FilterArgument) -> Self {
        Self::Threshold {
            op: ThresholdOp::Gt,
            argument,
        }
    }

    pub fn before(instant: i64) -> Self {
        Self::Temporal {
            op: TemporalOp::Before,
            instant,
        }
    }

    pub fn after(instant: i64) -> Self {
        Self::Temporal {
            op: TemporalOp::After,
            instant,
        }
    }

    /// Deviation filter; relative mode needs a non-zero reference
    pub fn deviation(mode: DeviationMode, reference: f64, max_deviation: f64) -> QueryResult<Self> {
        let filter = Self::Deviation {
            mode,
            reference,
            max_deviation,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Check the constraints the constructors enforce, looking through `Not`
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Self::Deviation {
                mode,
                reference,
                max_deviation,
            } => {
                if max_deviation.is_nan() || *max_deviation < 0.0 {
                    return Err(QueryError::InvalidConfiguration(format!(
                        "maximum deviation must be a non-negative number, got {}",
                        max_deviation
                    )));
                }
                if *mode == DeviationMode::Relative && *reference == 0.0 {
                    return Err(QueryError::InvalidConfiguration(
                        "relative deviation requires a non-zero reference value".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Not(inner) => inner.validate(),
            Self::Threshold { .. } | Self::Temporal { .. } => Ok(()),
        }
    }

    /// Wrap this filter in a negation
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Sample references of threshold filters, looking through negations
    pub fn sample_references(&self) -> Vec<&Identifier> {
        match self {
            Self::Threshold { argument, .. } => argument.sample_identifier().into_iter().collect(),
            Self::Not(inner) => inner.sample_references(),
            Self::Temporal { .. } | Self::Deviation { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectiveKind {
    And,
    Or,
}

/// AND/OR grouping of one or more filters
#[derive(Debug, Clone, PartialEq)]
pub struct Connective {
    kind: ConnectiveKind,
    pub(crate) filters: Vec<Filter>,
}

impl Connective {
    pub fn new(kind: ConnectiveKind, filters: Vec<Filter>) -> QueryResult<Self> {
        if filters.is_empty() {
            return Err(QueryError::InvalidConfiguration(
                "a connective needs at least one filter".to_string(),
            ));
        }
        Ok(Self { kind, filters })
    }

    pub fn and(filters: Vec<Filter>) -> QueryResult<Self> {
        Self::new(ConnectiveKind::And, filters)
    }

    pub fn or(filters: Vec<Filter>) -> QueryResult<Self> {
        Self::new(ConnectiveKind::Or, filters)
    }

    pub fn kind(&self) -> ConnectiveKind {
        self.kind
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    fn validate(&self) -> QueryResult<()> {
        self.filters.iter().try_for_each(Filter::validate)
    }

    fn sample_references(&self) -> impl Iterator<Item = &Identifier> {
        self.filters.iter().flat_map(|f| f.sample_references())
    }
}

/// A named set of periods during which a connective holds
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    identifier: Identifier,
    pub(crate) definition: Connective,
    duration: Option<DurationRange>,
}

impl Event {
    pub fn new(identifier: Identifier, definition: Connective) -> Self {
        Self {
            identifier,
            definition,
            duration: None,
        }
    }

    /// Only keep periods whose length lies in `duration`
    pub fn with_duration(mut self, duration: DurationRange) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn definition(&self) -> &Connective {
        &self.definition
    }

    pub fn duration(&self) -> Option<&DurationRange> {
        self.duration.as_ref()
    }
}

/// Temporal relation between two events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceOperator {
    /// `a precedes b`: a period of `a` directly followed by a period of `b`
    Precedes,
    /// `a follows b`: a period of `b` directly followed by a period of `a`
    Follows,
}

impl std::fmt::Display for ChoiceOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Precedes => write!(f, "precedes"),
            Self::Follows => write!(f, "follows"),
        }
    }
}

/// The CHOOSE statement
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    operator: ChoiceOperator,
    operand1: Identifier,
    operand2: Identifier,
    tolerance: Option<DurationRange>,
}

impl Choice {
    pub fn new(operator: ChoiceOperator, operand1: Identifier, operand2: Identifier) -> Self {
        Self {
            operator,
            operand1,
            operand2,
            tolerance: None,
        }
    }

    pub fn precedes(operand1: Identifier, operand2: Identifier) -> Self {
        Self::new(ChoiceOperator::Precedes, operand1, operand2)
    }

    pub fn follows(operand1: Identifier, operand2: Identifier) -> Self {
        Self::new(ChoiceOperator::Follows, operand1, operand2)
    }

    /// Bound the gap between the two related periods
    pub fn within(mut self, tolerance: DurationRange) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn operator(&self) -> ChoiceOperator {
        self.operator
    }

    pub fn operand1(&self) -> &Identifier {
        &self.operand1
    }

    pub fn operand2(&self) -> &Identifier {
        &self.operand2
    }

    pub fn tolerance(&self) -> Option<&DurationRange> {
        self.tolerance.as_ref()
    }

    /// Number of event operands; always two
    pub fn cardinality(&self) -> usize {
        2
    }
}

/// Output shape of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YieldFormat {
    DataPoints,
    AllPeriods,
    LongestPeriod,
    ShortestPeriod,
    Sample(Identifier),
    SampleSet(Vec<Identifier>),
}

/// A validated query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub(crate) samples: Vec<Sample>,
    pub(crate) filter: Option<Connective>,
    pub(crate) events: Vec<Event>,
    choice: Option<Choice>,
    result: YieldFormat,
    identifiers: Vec<Identifier>,
}

impl Query {
    /// Start building a query
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn filter(&self) -> Option<&Connective> {
        self.filter.as_ref()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn choice(&self) -> Option<&Choice> {
        self.choice.as_ref()
    }

    pub fn result(&self) -> &YieldFormat {
        &self.result
    }

    /// Every declared identifier, in declaration order
    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }
}

/// Builder assembling a query section by section
///
/// Nothing is validated until [`QueryBuilder::build`], which declares and
/// resolves identifiers in section order: samples, filter, events, choice,
/// yield.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    samples: Vec<Sample>,
    filter: Option<Connective>,
    events: Vec<Event>,
    choice: Option<Choice>,
    result: Option<YieldFormat>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a sample
    pub fn sample(mut self, sample: Sample) -> Self {
        self.samples.push(sample);
        self
    }

    /// Set the top-level filter
    pub fn filter(mut self, connective: Connective) -> Self {
        self.filter = Some(connective);
        self
    }

    /// Declare an event
    pub fn event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Set the choice statement
    pub fn choice(mut self, choice: Choice) -> Self {
        self.choice = Some(choice);
        self
    }

    /// Set the output shape
    pub fn yields(mut self, result: YieldFormat) -> Self {
        self.result = Some(result);
        self
    }

    /// Validate identifiers and build the query
    pub fn build(self) -> QueryResult<Query> {
        let mut registry = IdentifierRegistry::new();

        for sample in &self.samples {
            sample.aggregator().validate()?;
            if let Some(formatter) = sample.formatter() {
                formatter.validate()?;
            }
            registry.declare(sample.identifier(), IdentifierKind::Sample)?;
        }

        if let Some(filter) = &self.filter {
            filter.validate()?;
            for reference in filter.sample_references() {
                registry.resolve(reference, IdentifierKind::Sample)?;
            }
        }

        // An event's own definition is resolved before the event is declared,
        // so it can neither reference itself nor any other event.
        for event in &self.events {
            event.definition.validate()?;
            for reference in event.definition.sample_references() {
                registry.resolve(reference, IdentifierKind::Sample)?;
            }
            registry.declare(event.identifier(), IdentifierKind::Event)?;
        }

        if let Some(choice) = &self.choice {
            registry.resolve(choice.operand1(), IdentifierKind::Event)?;
            registry.resolve(choice.operand2(), IdentifierKind::Event)?;
        }

        let result = self.result.ok_or_else(|| {
            QueryError::InvalidConfiguration("the YIELD statement is mandatory".to_string())
        })?;

        match &result {
            YieldFormat::Sample(identifier) => {
                registry.resolve(identifier, IdentifierKind::Sample)?;
            }
            YieldFormat::SampleSet(identifiers) => {
                if identifiers.is_empty() {
                    return Err(QueryError::InvalidConfiguration(
                        "yielding samples requires at least one identifier".to_string(),
                    ));
                }
                for identifier in identifiers {
                    registry.resolve(identifier, IdentifierKind::Sample)?;
                }
            }
            YieldFormat::DataPoints
            | YieldFormat::AllPeriods
            | YieldFormat::LongestPeriod
            | YieldFormat::ShortestPeriod => {}
        }

        Ok(Query {
            samples: self.samples,
            filter: self.filter,
            events: self.events,
            choice: self.choice,
            result,
            identifiers: registry.identifiers().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Identifier {
        Identifier::new(name).unwrap()
    }

    fn avg_sample(name: &str) -> Sample {
        Sample::new(id(name), Aggregator::global(AggregationFunc::Avg))
    }

    fn lt_event(name: &str, threshold: f64) -> Event {
        Event::new(
            id(name),
            Connective::and(vec![Filter::lt(FilterArgument::literal(threshold))]).unwrap(),
        )
    }

    #[test]
    fn test_builder_minimal() {
        let query = Query::builder().yields(YieldFormat::DataPoints).build().unwrap();

        assert!(query.samples().is_empty());
        assert!(query.filter().is_none());
        assert!(query.events().is_empty());
        assert!(query.choice().is_none());
        assert!(query.identifiers().is_empty());
        assert_eq!(query.result(), &YieldFormat::DataPoints);
    }

    #[test]
    fn test_yield_is_mandatory() {
        let err = Query::builder().sample(avg_sample("s1")).build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_duplicate_identifier_in_same_section() {
        let err = Query::builder()
            .sample(avg_sample("s1"))
            .sample(avg_sample("s1"))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap_err();

        assert_eq!(err, QueryError::DuplicateIdentifier("s1".to_string()));
    }

    #[test]
    fn test_duplicate_identifier_across_sections() {
        let err = Query::builder()
            .sample(avg_sample("s1"))
            .event(lt_event("s1", 3.5))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap_err();

        assert_eq!(err, QueryError::DuplicateIdentifier("s1".to_string()));
    }

    #[test]
    fn test_filter_references_undeclared_sample() {
        let err = Query::builder()
            .filter(Connective::and(vec![Filter::gt(FilterArgument::sample(id("s3")))]).unwrap())
            .yields(YieldFormat::DataPoints)
            .build()
            .unwrap_err();

        assert_eq!(err, QueryError::UnknownIdentifier("s3".to_string()));
    }

    #[test]
    fn test_negated_filter_reference_is_resolved() {
        let err = Query::builder()
            .filter(
                Connective::or(vec![Filter::lt(FilterArgument::sample(id("s3"))).negate()])
                    .unwrap(),
            )
            .yields(YieldFormat::DataPoints)
            .build()
            .unwrap_err();

        assert_eq!(err, QueryError::UnknownIdentifier("s3".to_string()));
    }

    #[test]
    fn test_event_used_where_sample_expected() {
        let err = Query::builder()
            .event(lt_event("low", 3.5))
            .event(Event::new(
                id("high"),
                Connective::or(vec![Filter::gt(FilterArgument::sample(id("low")))]).unwrap(),
            ))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            QueryError::InvalidReference {
                name: "low".to_string(),
                expected: IdentifierKind::Sample,
                found: IdentifierKind::Event,
            }
        );
    }

    #[test]
    fn test_event_cannot_reference_itself() {
        let err = Query::builder()
            .event(Event::new(
                id("low"),
                Connective::and(vec![Filter::lt(FilterArgument::sample(id("low")))]).unwrap(),
            ))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap_err();

        assert_eq!(err, QueryError::UnknownIdentifier("low".to_string()));
    }

    #[test]
    fn test_choice_operands_must_be_events() {
        let err = Query::builder()
            .sample(avg_sample("low"))
            .sample(avg_sample("high"))
            .choice(Choice::precedes(id("low"), id("high")))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, QueryError::InvalidReference { .. }));
        assert!(message.contains("low") && message.contains("event"));
    }

    #[test]
    fn test_choice_unknown_event() {
        let err = Query::builder()
            .event(lt_event("e1", 3.0))
            .choice(Choice::follows(id("e1"), id("e2")))
            .yields(YieldFormat::DataPoints)
            .build()
            .unwrap_err();

        assert_eq!(err, QueryError::UnknownIdentifier("e2".to_string()));
    }

    #[test]
    fn test_yield_sample_must_be_sample() {
        let err = Query::builder()
            .sample(avg_sample("mySum"))
            .event(lt_event("LOW", 1.0))
            .yields(YieldFormat::SampleSet(vec![id("mySum"), id("LOW")]))
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidReference { .. }));

        let err = Query::builder()
            .yields(YieldFormat::Sample(id("hello1")))
            .build()
            .unwrap_err();
        assert_eq!(err, QueryError::UnknownIdentifier("hello1".to_string()));
    }

    #[test]
    fn test_identifiers_in_declaration_order() {
        let query = Query::builder()
            .sample(avg_sample("s1"))
            .sample(avg_sample("s2"))
            .event(lt_event("low", 3.5))
            .event(lt_event("high", 7.0))
            .choice(Choice::precedes(id("low"), id("high")))
            .yields(YieldFormat::AllPeriods)
            .build()
            .unwrap();

        assert_eq!(
            query.identifiers(),
            &[id("s1"), id("s2"), id("low"), id("high")]
        );
        assert_eq!(query.choice().map(|c| c.cardinality()), Some(2));
    }

    #[test]
    fn test_sample_value_unbound_at_construction() {
        let sample = avg_sample("s1");
        assert_eq!(sample.value(), Err(QueryError::UnboundValue("s1".to_string())));

        let argument = FilterArgument::sample(id("s1"));
        assert_eq!(argument.value(), Err(QueryError::UnboundValue("s1".to_string())));
        assert_eq!(FilterArgument::literal(2.5).value(), Ok(2.5));
    }

    #[test]
    fn test_aggregator_validation() {
        assert!(matches!(
            Aggregator::local(AggregationFunc::Integral, 0, 10),
            Err(QueryError::InvalidConfiguration(_))
        ));
        assert!(Aggregator::local(AggregationFunc::Count, 10, 10).is_err());
        assert!(Aggregator::local(AggregationFunc::Count, 0, 10).is_ok());

        assert!(Aggregator::temporal(AggregationFunc::Avg, TimeUnit::Seconds, vec![]).is_err());
        assert!(
            Aggregator::temporal(AggregationFunc::Avg, TimeUnit::Seconds, vec![(5, 1)]).is_err()
        );
        assert_eq!(
            Aggregator::temporal(AggregationFunc::Max, TimeUnit::Seconds, vec![(0, 1000)])
                .unwrap()
                .func(),
            AggregationFunc::Max
        );
    }

    #[test]
    fn test_deviation_validation() {
        assert!(matches!(
            Filter::deviation(DeviationMode::Relative, 0.0, 0.1),
            Err(QueryError::InvalidConfiguration(_))
        ));
        assert!(Filter::deviation(DeviationMode::Absolute, 0.0, 0.1).is_ok());
        assert!(Filter::deviation(DeviationMode::Absolute, 1.0, -0.1).is_err());
        assert!(Filter::deviation(DeviationMode::Absolute, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_empty_connective_rejected() {
        assert!(Connective::or(vec![]).is_err());
    }

    fn build_err(builder: QueryBuilder) -> QueryError {
        builder.yields(YieldFormat::AllPeriods).build().unwrap_err()
    }

    #[test]
    fn test_build_validates_variant_payloads() {
        let zero_reference = Filter::Deviation {
            mode: DeviationMode::Relative,
            reference: 0.0,
            max_deviation: 0.1,
        };

        let filtered = Query::builder().filter(Connective::and(vec![zero_reference.clone()]).unwrap());
        assert!(matches!(build_err(filtered), QueryError::InvalidConfiguration(_)));

        let negated = Filter::Not(Box::new(zero_reference));
        let event = Event::new(id("odd"), Connective::or(vec![negated]).unwrap());
        assert!(matches!(
            build_err(Query::builder().event(event)),
            QueryError::InvalidConfiguration(_)
        ));

        let local_integral = Aggregator::Local {
            func: AggregationFunc::Integral,
            window: TimeRange { start: 0, end: 10 },
        };
        let sample = Sample::new(id("area"), local_integral);
        assert!(matches!(
            build_err(Query::builder().sample(sample)),
            QueryError::InvalidConfiguration(_)
        ));

        let empty_window = Aggregator::Local {
            func: AggregationFunc::Sum,
            window: TimeRange { start: 10, end: 10 },
        };
        let sample = Sample::new(id("total"), empty_window);
        assert!(build_err(Query::builder().sample(sample)).to_string().contains("window"));
    }

    #[test]
    fn test_echo_precision_limit() {
        assert!(SampleFormatter::echo(MAX_ECHO_DECIMALS).is_ok());
        assert!(SampleFormatter::echo(MAX_ECHO_DECIMALS + 1).is_err());

        let sample = avg_sample("s1").with_formatter(SampleFormatter::Echo { decimals: 70_000 });
        assert!(matches!(
            build_err(Query::builder().sample(sample)),
            QueryError::InvalidConfiguration(_)
        ));
    }
}
