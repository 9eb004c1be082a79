//! Query Parser
//!
//! Parses event query strings into a validated `Query`.
//!
//! # Supported Syntax
//!
//! ```text
//! [WITH SAMPLES: avg(_input) AS s1 [-> echo(2)], ...]
//! [APPLY FILTER: AND(lt(3.5), NOT(gt(s1)), before("2022-08-08T13:04:23.000Z"), ...)]
//! [USING EVENTS: OR(gt(7)) [FOR [2,10) minutes] AS high, ...]
//! [CHOOSE: low precedes high [WITHIN [0,30] seconds]]
//! YIELD: data points | all periods | longest period | shortest period
//!      | sample s1 | samples s1, s2
//! ```
//!
//! Samples are computed over all input (`_input`), over a window
//! (`sum("2022-08-08T00:00:00Z", "2022-08-09T00:00:00Z")`) or over explicit
//! periods (`avg_t(minutes, "<start>/<end>", ...)`, `count_t("<start>/<end>")`).
//!
//! The parser only assembles a `QueryBuilder`; identifier declaration and
//! resolution errors come from [`QueryBuilder::build`].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{cut, map, map_opt, not, opt, recognize, value},
    error::{ErrorKind, ParseError},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::query::ast::*;
use crate::query::error::{QueryError, QueryResult};
use crate::query::identifier::Identifier;
use crate::query::period::{DurationRange, RangeBound, TimeUnit};
use chrono::DateTime;

/// Parser error carrying an optional semantic cause
///
/// Semantic failures (bad identifiers, invalid ranges) are raised as
/// `nom::Err::Failure` so they are reported as-is instead of being swallowed
/// by `alt` or `opt`.
#[derive(Debug)]
struct SyntaxError<'a> {
    input: &'a str,
    kind: ErrorKind,
    cause: Option<QueryError>,
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self {
            input,
            kind,
            cause: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        if self.cause.is_some() {
            self
        } else {
            other
        }
    }
}

impl SyntaxError<'_> {
    fn into_query_error(self) -> QueryError {
        match self.cause {
            Some(cause) => cause,
            None => QueryError::Parse(format!(
                "Unexpected input at '{}' ({:?})",
                excerpt(self.input),
                self.kind
            )),
        }
    }
}

type PResult<'a, T> = IResult<&'a str, T, SyntaxError<'a>>;

/// Parse a query string into a validated Query
pub fn parse_query(input: &str) -> QueryResult<Query> {
    let builder = match parse_full_query(input) {
        Ok((remaining, builder)) => {
            if !remaining.trim().is_empty() {
                return Err(QueryError::Parse(format!(
                    "Unexpected input after query: '{}'",
                    excerpt(remaining)
                )));
            }
            builder
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => return Err(e.into_query_error()),
        Err(nom::Err::Incomplete(_)) => {
            return Err(QueryError::Parse("Incomplete query".to_string()))
        }
    };

    builder.build()
}

/// First characters of the unparsed input, for error messages
fn excerpt(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed.char_indices().nth(30) {
        Some((cut_at, _)) => format!("{}...", &trimmed[..cut_at]),
        None => trimmed.to_string(),
    }
}

/// Lift a semantic result into the parser, failing hard on error
fn semantic<T>(input: &str, result: QueryResult<T>) -> PResult<'_, T> {
    match result {
        Ok(v) => Ok((input, v)),
        Err(cause) => Err(nom::Err::Failure(SyntaxError {
            input,
            kind: ErrorKind::Verify,
            cause: Some(cause),
        })),
    }
}

/// Parse the full query
fn parse_full_query(input: &str) -> PResult<'_, QueryBuilder> {
    let (input, _) = multispace0(input)?;
    let (input, samples) = opt(parse_samples_section)(input)?;
    let (input, filter) = opt(parse_filter_section)(input)?;
    let (input, events) = opt(parse_events_section)(input)?;
    let (input, choice) = opt(parse_choice_section)(input)?;
    let (input, result) = parse_yield_section(input)?;
    let (input, _) = multispace0(input)?;

    let mut builder = QueryBuilder::new();
    for sample in samples.unwrap_or_default() {
        builder = builder.sample(sample);
    }
    if let Some(filter) = filter {
        builder = builder.filter(filter);
    }
    for event in events.unwrap_or_default() {
        builder = builder.event(event);
    }
    if let Some(choice) = choice {
        builder = builder.choice(choice);
    }

    Ok((input, builder.yields(result)))
}

/// Parse a whitespace-separated keyword phrase such as `WITH SAMPLES:`
///
/// A phrase ending in a word character must not run into an identifier,
/// so `ASlow` is not `AS low`.
fn keyword<'a>(phrase: &'static str) -> impl FnMut(&'a str) -> PResult<'a, ()> {
    let needs_boundary = phrase.ends_with(is_word_char);
    move |input: &'a str| -> PResult<'a, ()> {
        let (mut input, _) = multispace0(input)?;
        for (i, word) in phrase.split(' ').enumerate() {
            if i > 0 {
                input = multispace1(input)?.0;
            }
            input = tag(word)(input)?.0;
        }
        if needs_boundary {
            let boundary: PResult<'a, ()> = not(satisfy(is_word_char))(input);
            input = boundary?.0;
        }
        let (input, _) = multispace0(input)?;
        Ok((input, ()))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse a punctuation character with surrounding whitespace
fn symbol<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    delimited(multispace0, char(c), multispace0)
}

/// Parse `WITH SAMPLES: <sample>, ...`
fn parse_samples_section(input: &str) -> PResult<'_, Vec<Sample>> {
    preceded(
        keyword("WITH SAMPLES:"),
        cut(separated_list1(symbol(','), parse_sample)),
    )(input)
}

/// Parse a sample declaration like `avg(_input) AS s1 -> echo(2)`
fn parse_sample(input: &str) -> PResult<'_, Sample> {
    let (input, aggregator) = parse_aggregator(input)?;
    let (input, _) = keyword("AS")(input)?;
    let (input, identifier) = parse_identifier(input)?;
    let (input, formatter) = opt(preceded(keyword("->"), parse_echo))(input)?;

    let sample = Sample::new(identifier, aggregator);
    Ok((
        input,
        match formatter {
            Some(formatter) => sample.with_formatter(formatter),
            None => sample,
        },
    ))
}

/// Parse `echo(<decimals>)`
fn parse_echo(input: &str) -> PResult<'_, SampleFormatter> {
    let (input, _) = tag("echo")(input)?;
    let (input, _) = symbol('(')(input)?;
    let (input, decimals) = cut(map_opt(digit1, |s: &str| s.parse::<usize>().ok()))(input)?;
    let (input, _) = symbol(')')(input)?;
    semantic(input, SampleFormatter::echo(decimals))
}

/// Parse an aggregator call: global, windowed or temporal
fn parse_aggregator(input: &str) -> PResult<'_, Aggregator> {
    let (input, name) = take_while1(|c: char| c.is_ascii_alphabetic() || c == '_')(input)?;
    let (base, temporal) = match name.strip_suffix("_t") {
        Some(base) => (base, true),
        None => (name, false),
    };
    let (input, func) = semantic(
        input,
        AggregationFunc::from_keyword(base)
            .ok_or_else(|| QueryError::Parse(format!("Unknown aggregator '{}'", name))),
    )?;
    let (input, _) = symbol('(')(input)?;

    let (input, aggregator) = if temporal {
        parse_temporal_arguments(input, func)?
    } else if let Ok((rest, _)) = tag::<_, _, SyntaxError>("_input")(input) {
        (rest, Aggregator::global(func))
    } else {
        parse_window_arguments(input, func)?
    };

    let (input, _) = symbol(')')(input)?;
    Ok((input, aggregator))
}

/// Parse `"<lower>", "<upper>"` of a windowed aggregator
fn parse_window_arguments(input: &str, func: AggregationFunc) -> PResult<'_, Aggregator> {
    let (input, lower) = parse_instant_literal(input)?;
    let (input, _) = symbol(',')(input)?;
    let (input, upper) = parse_instant_literal(input)?;
    semantic(input, Aggregator::local(func, lower, upper))
}

/// Parse `[<unit>,] "<start>/<end>", ...` of a temporal aggregator
///
/// `count_t` takes no unit since it only counts periods.
fn parse_temporal_arguments(input: &str, func: AggregationFunc) -> PResult<'_, Aggregator> {
    let (input, unit) = if func == AggregationFunc::Count {
        (input, TimeUnit::Millis)
    } else {
        let (input, unit) = parse_time_unit(input)?;
        let (input, _) = symbol(',')(input)?;
        (input, unit)
    };

    let (input, periods) = separated_list1(symbol(','), parse_period_literal)(input)?;
    semantic(input, Aggregator::temporal(func, unit, periods))
}

/// Parse `APPLY FILTER: <connective>` or `FILTER: <connective>`
fn parse_filter_section(input: &str) -> PResult<'_, Connective> {
    preceded(
        alt((keyword("APPLY FILTER:"), keyword("FILTER:"))),
        cut(parse_connective),
    )(input)
}

/// Parse `AND(<filter>, ...)` or `OR(<filter>, ...)`
fn parse_connective(input: &str) -> PResult<'_, Connective> {
    let (input, kind) = alt((
        value(ConnectiveKind::And, tag("AND")),
        value(ConnectiveKind::Or, tag("OR")),
    ))(input)?;
    let (input, _) = symbol('(')(input)?;
    let (input, filters) = separated_list1(symbol(','), parse_filter)(input)?;
    let (input, _) = symbol(')')(input)?;
    semantic(input, Connective::new(kind, filters))
}

/// Parse a single, possibly negated filter
fn parse_filter(input: &str) -> PResult<'_, Filter> {
    alt((
        parse_negated_filter,
        parse_threshold_filter,
        parse_temporal_filter,
        parse_deviation_filter,
    ))(input)
}

/// Parse `NOT(<filter>)`
fn parse_negated_filter(input: &str) -> PResult<'_, Filter> {
    let (input, _) = tag("NOT")(input)?;
    let (input, filter) = delimited(symbol('('), parse_filter, symbol(')'))(input)?;
    Ok((input, filter.negate()))
}

/// Parse `lt(<arg>)` or `gt(<arg>)`
fn parse_threshold_filter(input: &str) -> PResult<'_, Filter> {
    let (input, op) = alt((value(ThresholdOp::Lt, tag("lt")), value(ThresholdOp::Gt, tag("gt"))))(input)?;
    let (input, argument) = delimited(symbol('('), parse_filter_argument, symbol(')'))(input)?;

    Ok((
        input,
        match op {
            ThresholdOp::Lt => Filter::lt(argument),
            ThresholdOp::Gt => Filter::gt(argument),
        },
    ))
}

/// Parse a numeric literal or a sample reference
fn parse_filter_argument(input: &str) -> PResult<'_, FilterArgument> {
    alt((
        map(parse_number, FilterArgument::literal),
        map(parse_identifier, FilterArgument::sample),
    ))(input)
}

/// Parse `before("<instant>")` or `after("<instant>")`
fn parse_temporal_filter(input: &str) -> PResult<'_, Filter> {
    let (input, op) = alt((
        value(TemporalOp::Before, tag("before")),
        value(TemporalOp::After, tag("after")),
    ))(input)?;
    let (input, instant) = delimited(symbol('('), parse_instant_literal, symbol(')'))(input)?;

    Ok((
        input,
        match op {
            TemporalOp::Before => Filter::before(instant),
            TemporalOp::After => Filter::after(instant),
        },
    ))
}

/// Parse `around(rel|abs, <reference>, <max deviation>)`
fn parse_deviation_filter(input: &str) -> PResult<'_, Filter> {
    let (input, _) = tag("around")(input)?;
    let (input, _) = symbol('(')(input)?;
    let (input, mode) = alt((
        value(DeviationMode::Relative, tag("rel")),
        value(DeviationMode::Absolute, tag("abs")),
    ))(input)?;
    let (input, _) = symbol(',')(input)?;
    let (input, reference) = parse_number(input)?;
    let (input, _) = symbol(',')(input)?;
    let (input, max_deviation) = parse_number(input)?;
    let (input, _) = symbol(')')(input)?;
    semantic(input, Filter::deviation(mode, reference, max_deviation))
}

/// Parse `USING EVENTS: <event>, ...`
fn parse_events_section(input: &str) -> PResult<'_, Vec<Event>> {
    preceded(
        keyword("USING EVENTS:"),
        cut(separated_list1(symbol(','), parse_event)),
    )(input)
}

/// Parse `<connective> [FOR <range>] AS <identifier>`
fn parse_event(input: &str) -> PResult<'_, Event> {
    let (input, definition) = parse_connective(input)?;
    let (input, duration) = opt(preceded(keyword("FOR"), parse_duration_range))(input)?;
    let (input, _) = keyword("AS")(input)?;
    let (input, identifier) = parse_identifier(input)?;

    let event = Event::new(identifier, definition);
    Ok((
        input,
        match duration {
            Some(range) => event.with_duration(range),
            None => event,
        },
    ))
}

/// Parse `CHOOSE: <event> precedes|follows <event> [WITHIN <range>]`
fn parse_choice_section(input: &str) -> PResult<'_, Choice> {
    let (input, _) = keyword("CHOOSE:")(input)?;
    cut(parse_choice)(input)
}

fn parse_choice(input: &str) -> PResult<'_, Choice> {
    let (input, operand1) = parse_identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, operator) = alt((
        value(ChoiceOperator::Precedes, tag("precedes")),
        value(ChoiceOperator::Follows, tag("follows")),
    ))(input)?;
    let (input, _) = multispace1(input)?;
    let (input, operand2) = parse_identifier(input)?;
    let (input, tolerance) = opt(preceded(keyword("WITHIN"), parse_duration_range))(input)?;

    let choice = Choice::new(operator, operand1, operand2);
    Ok((
        input,
        match tolerance {
            Some(range) => choice.within(range),
            None => choice,
        },
    ))
}

/// Parse `YIELD: <format>`
fn parse_yield_section(input: &str) -> PResult<'_, YieldFormat> {
    preceded(keyword("YIELD:"), cut(parse_yield_format))(input)
}

fn parse_yield_format(input: &str) -> PResult<'_, YieldFormat> {
    alt((
        value(YieldFormat::DataPoints, keyword("data points")),
        value(YieldFormat::AllPeriods, keyword("all periods")),
        value(YieldFormat::LongestPeriod, keyword("longest period")),
        value(YieldFormat::ShortestPeriod, keyword("shortest period")),
        map(
            preceded(
                pair(tag("samples"), multispace1),
                separated_list1(symbol(','), parse_identifier),
            ),
            YieldFormat::SampleSet,
        ),
        map(
            preceded(pair(tag("sample"), multispace1), parse_identifier),
            YieldFormat::Sample,
        ),
    ))(input)
}

/// Parse `[a,b] unit`, `(a,] unit` and the like; either number may be omitted
fn parse_duration_range(input: &str) -> PResult<'_, DurationRange> {
    let (input, lower_inclusive) = alt((value(true, char('[')), value(false, char('('))))(input)?;
    let (input, lower) = opt(delimited(multispace0, parse_number, multispace0))(input)?;
    let (input, _) = symbol(',')(input)?;
    let (input, upper) = opt(delimited(multispace0, parse_number, multispace0))(input)?;
    let (input, upper_inclusive) = alt((value(true, char(']')), value(false, char(')'))))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, unit) = parse_time_unit(input)?;

    let bound = |v: f64, inclusive: bool| {
        if inclusive {
            RangeBound::inclusive(v)
        } else {
            RangeBound::exclusive(v)
        }
    };
    semantic(
        input,
        DurationRange::new(
            lower.map(|v| bound(v, lower_inclusive)),
            upper.map(|v| bound(v, upper_inclusive)),
            unit,
        ),
    )
}

fn parse_time_unit(input: &str) -> PResult<'_, TimeUnit> {
    map_opt(take_while1(|c: char| c.is_ascii_alphabetic()), TimeUnit::from_keyword)(input)
}

/// Parse an identifier, validating it
fn parse_identifier(input: &str) -> PResult<'_, Identifier> {
    let (input, name) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)?;
    semantic(input, Identifier::new(name))
}

/// Parse a quoted string
fn parse_quoted_string(input: &str) -> PResult<'_, &str> {
    delimited(char('"'), take_while1(|c: char| c != '"'), char('"'))(input)
}

/// Parse a quoted RFC 3339 instant into epoch millis
fn parse_instant_literal(input: &str) -> PResult<'_, i64> {
    let (input, raw) = parse_quoted_string(input)?;
    semantic(input, instant_millis(raw))
}

/// Parse a quoted `"<start>/<end>"` period
fn parse_period_literal(input: &str) -> PResult<'_, (i64, i64)> {
    let (input, raw) = parse_quoted_string(input)?;
    let period = raw
        .split_once('/')
        .ok_or_else(|| QueryError::Parse(format!("Expected '<start>/<end>', got '{}'", raw)))
        .and_then(|(start, end)| Ok((instant_millis(start)?, instant_millis(end)?)));
    semantic(input, period)
}

/// Strict RFC 3339 with a `T` separator
fn instant_millis(raw: &str) -> QueryResult<i64> {
    let invalid = || QueryError::Parse(format!("Invalid instant '{}'", raw));
    if raw.as_bytes().get(10) != Some(&b'T') {
        return Err(invalid());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| invalid())
}

/// Parse a signed decimal number
fn parse_number(input: &str) -> PResult<'_, f64> {
    map_opt(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        |s: &str| s.parse::<f64>().ok(),
    )(input)
}
