//! Periods, time units and duration ranges
//!
//! A `Period` is a closed interval `[start, end]` of epoch milliseconds with
//! a sequence index. Events produce period sets; the choice operator merges
//! periods of two events; duration ranges constrain period lengths and gaps.

use crate::query::error::{QueryError, QueryResult};
use crate::query::identifier::Identifier;
use serde::{Deserialize, Serialize};

/// Time units usable in duration and tolerance ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    /// Length of one unit in milliseconds
    pub fn millis(&self) -> i64 {
        match self {
            Self::Millis => 1,
            Self::Seconds => 1000,
            Self::Minutes => 60 * 1000,
            Self::Hours => 3600 * 1000,
            Self::Days => 24 * 3600 * 1000,
            Self::Weeks => 7 * 24 * 3600 * 1000,
        }
    }

    /// Express a millisecond span in this unit
    pub fn convert(&self, millis: i64) -> f64 {
        millis as f64 / self.millis() as f64
    }

    /// Parse from the query keyword
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "millis" => Some(Self::Millis),
            "seconds" => Some(Self::Seconds),
            "minutes" => Some(Self::Minutes),
            "hours" => Some(Self::Hours),
            "days" => Some(Self::Days),
            "weeks" => Some(Self::Weeks),
            _ => None,
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Millis => write!(f, "millis"),
            Self::Seconds => write!(f, "seconds"),
            Self::Minutes => write!(f, "minutes"),
            Self::Hours => write!(f, "hours"),
            Self::Days => write!(f, "days"),
            Self::Weeks => write!(f, "weeks"),
        }
    }
}

/// One end of a duration range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub value: f64,
    pub inclusive: bool,
}

impl RangeBound {
    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// A numeric interval over durations with independently inclusive bounds
///
/// A missing lower bound behaves like `0` inclusive, a missing upper bound
/// leaves the range open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationRange {
    lower: Option<RangeBound>,
    upper: Option<RangeBound>,
    unit: TimeUnit,
}

impl DurationRange {
    /// Create a validated range
    pub fn new(
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
        unit: TimeUnit,
    ) -> QueryResult<Self> {
        let range = Self { lower, upper, unit };

        for bound in [lower, upper].into_iter().flatten() {
            if !bound.value.is_finite() || bound.value < 0.0 {
                return Err(QueryError::InvalidConfiguration(format!(
                    "range {} has a bound that is negative or not finite",
                    range
                )));
            }
        }

        if let (Some(l), Some(u)) = (lower, upper) {
            let empty = l.value > u.value || (l.value == u.value && !(l.inclusive && u.inclusive));
            if empty {
                return Err(QueryError::InvalidConfiguration(format!(
                    "range {} has a lower bound greater than its upper bound",
                    range
                )));
            }
        }

        Ok(range)
    }

    /// Closed range `[lower, upper]`
    pub fn closed(lower: f64, upper: f64, unit: TimeUnit) -> QueryResult<Self> {
        Self::new(
            Some(RangeBound::inclusive(lower)),
            Some(RangeBound::inclusive(upper)),
            unit,
        )
    }

    pub fn lower(&self) -> Option<RangeBound> {
        self.lower
    }

    pub fn upper(&self) -> Option<RangeBound> {
        self.upper
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Check whether a millisecond span, expressed in this range's unit, lies within it
    pub fn contains_millis(&self, millis: i64) -> bool {
        let value = self.unit.convert(millis);

        let lower = self.lower.unwrap_or(RangeBound::inclusive(0.0));
        let above_lower = if lower.inclusive {
            value >= lower.value
        } else {
            value > lower.value
        };

        let below_upper = match self.upper {
            None => true,
            Some(u) if u.inclusive => value <= u.value,
            Some(u) => value < u.value,
        };

        above_lower && below_upper
    }
}

impl std::fmt::Display for DurationRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = match self.lower {
            Some(b) if !b.inclusive => '(',
            _ => '[',
        };
        let close = match self.upper {
            Some(b) if b.inclusive => ']',
            _ => ')',
        };
        let lower = self.lower.map(|b| b.value.to_string()).unwrap_or_default();
        let upper = self.upper.map(|b| b.value.to_string()).unwrap_or_default();
        write!(f, "{}{},{}{} {}", open, lower, upper, close, self.unit)
    }
}

/// A closed time interval with a sequence index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Position within the owning period set
    pub index: usize,
    /// First instant (inclusive), epoch millis
    pub start: i64,
    /// Last instant (inclusive), epoch millis
    pub end: i64,
    /// Sentinel marker for "no period"
    pub empty: bool,
}

impl Period {
    /// Create a period
    pub fn new(index: usize, start: i64, end: i64) -> Self {
        Self {
            index,
            start,
            end,
            empty: false,
        }
    }

    /// The "no matching period" sentinel
    pub fn empty() -> Self {
        Self {
            index: 0,
            start: 0,
            end: 0,
            empty: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Length of the period in milliseconds, saturating at `i64::MAX`
    pub fn duration_millis(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }
}

/// An ordered collection of periods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodSet {
    periods: Vec<Period>,
}

impl PeriodSet {
    pub fn new(periods: Vec<Period>) -> Self {
        Self { periods }
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Period> {
        self.periods.iter()
    }

    pub fn as_slice(&self) -> &[Period] {
        &self.periods
    }

    /// The period with the greatest duration, ties going to the lowest index
    pub fn longest(&self) -> Option<&Period> {
        self.periods.iter().reduce(|best, p| {
            if p.duration_millis() > best.duration_millis()
                || (p.duration_millis() == best.duration_millis() && p.index < best.index)
            {
                p
            } else {
                best
            }
        })
    }

    /// The period with the smallest duration, ties going to the lowest index
    pub fn shortest(&self) -> Option<&Period> {
        self.periods.iter().reduce(|best, p| {
            if p.duration_millis() < best.duration_millis()
                || (p.duration_millis() == best.duration_millis() && p.index < best.index)
            {
                p
            } else {
                best
            }
        })
    }
}

impl FromIterator<Period> for PeriodSet {
    fn from_iter<T: IntoIterator<Item = Period>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for PeriodSet {
    type Item = Period;
    type IntoIter = std::vec::IntoIter<Period>;

    fn into_iter(self) -> Self::IntoIter {
        self.periods.into_iter()
    }
}

/// A period tagged with the event that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedPeriod {
    pub period: Period,
    pub event: Identifier,
}

impl AnnotatedPeriod {
    pub fn new(period: Period, event: Identifier) -> Self {
        Self { period, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_convert() {
        assert_eq!(TimeUnit::Seconds.convert(5000), 5.0);
        assert_eq!(TimeUnit::Minutes.convert(90_000), 1.5);
        assert_eq!(TimeUnit::Weeks.millis(), 604_800_000);
        assert_eq!(TimeUnit::from_keyword("hours"), Some(TimeUnit::Hours));
        assert_eq!(TimeUnit::from_keyword("fortnights"), None);
    }

    #[test]
    fn test_closed_range_bounds() {
        let range = DurationRange::closed(0.0, 5.0, TimeUnit::Seconds).unwrap();

        assert!(range.contains_millis(0));
        assert!(range.contains_millis(5000));
        assert!(!range.contains_millis(5001));
        assert!(!range.contains_millis(6000));
    }

    #[test]
    fn test_exclusive_bounds() {
        let range = DurationRange::new(
            Some(RangeBound::exclusive(1.0)),
            Some(RangeBound::exclusive(3.0)),
            TimeUnit::Minutes,
        )
        .unwrap();

        assert!(!range.contains_millis(60_000));
        assert!(range.contains_millis(60_001));
        assert!(range.contains_millis(179_999));
        assert!(!range.contains_millis(180_000));
    }

    #[test]
    fn test_open_ended_range() {
        let at_least = DurationRange::new(Some(RangeBound::inclusive(2.0)), None, TimeUnit::Seconds)
            .unwrap();
        assert!(!at_least.contains_millis(1999));
        assert!(at_least.contains_millis(i64::MAX / 2));

        let at_most = DurationRange::new(None, Some(RangeBound::inclusive(2.0)), TimeUnit::Seconds)
            .unwrap();
        assert!(at_most.contains_millis(0));
        assert!(!at_most.contains_millis(-1));
        assert!(!at_most.contains_millis(2001));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            DurationRange::closed(5.0, 1.0, TimeUnit::Seconds),
            Err(QueryError::InvalidConfiguration(_))
        ));
        assert!(DurationRange::new(
            Some(RangeBound::inclusive(1.0)),
            Some(RangeBound::exclusive(1.0)),
            TimeUnit::Seconds
        )
        .is_err());
        assert!(DurationRange::closed(-1.0, 1.0, TimeUnit::Seconds).is_err());
        assert!(DurationRange::closed(1.0, 1.0, TimeUnit::Seconds).is_ok());
    }

    #[test]
    fn test_range_display() {
        let range = DurationRange::new(
            Some(RangeBound::exclusive(1.0)),
            Some(RangeBound::inclusive(2.5)),
            TimeUnit::Hours,
        )
        .unwrap();
        assert_eq!(range.to_string(), "(1,2.5] hours");

        let range = DurationRange::new(None, Some(RangeBound::exclusive(3.0)), TimeUnit::Days)
            .unwrap();
        assert_eq!(range.to_string(), "[,3) days");
    }

    #[test]
    fn test_longest_and_shortest_tie_break() {
        let set = PeriodSet::new(vec![
            Period::new(0, 0, 10),
            Period::new(1, 20, 40),
            Period::new(2, 50, 70),
            Period::new(3, 80, 90),
        ]);

        assert_eq!(set.longest().map(|p| p.index), Some(1));
        assert_eq!(set.shortest().map(|p| p.index), Some(0));
        assert!(PeriodSet::default().longest().is_none());
    }

    #[test]
    fn test_empty_period_sentinel() {
        let empty = Period::empty();
        assert!(empty.is_empty());
        assert!(!Period::new(0, 1, 2).is_empty());
    }
}
