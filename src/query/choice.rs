//! Temporal choice between two events
//!
//! The operator scans the merged, start-ordered periods of its two operand
//! events and emits one period per adjacent pair in the requested order:
//!
//! ```text
//! low:   [---]        [--]
//! high:        [----]       [-]
//!
//! low precedes high -> [----------]  [--------]
//! ```
//!
//! Only directly adjacent pairs qualify; a period separated from its partner
//! by a third period does not.

use crate::query::ast::{Choice, ChoiceOperator};
use crate::query::identifier::Identifier;
use crate::query::period::{AnnotatedPeriod, Period, PeriodSet};

impl Choice {
    /// Merge the operands' periods in `(start, declaration index)` order
    ///
    /// `event_periods` lists every event's periods in declaration order;
    /// periods of events that are not operands are left out.
    pub fn annotated_periods(&self, event_periods: &[(Identifier, PeriodSet)]) -> Vec<AnnotatedPeriod> {
        let mut annotated: Vec<(usize, AnnotatedPeriod)> = event_periods
            .iter()
            .enumerate()
            .filter(|(_, (id, _))| id == self.operand1() || id == self.operand2())
            .flat_map(|(order, (id, periods))| {
                periods
                    .iter()
                    .map(move |p| (order, AnnotatedPeriod::new(*p, id.clone())))
            })
            .collect();

        annotated.sort_by_key(|(order, a)| (a.period.start, *order));
        annotated.into_iter().map(|(_, a)| a).collect()
    }

    /// Combine annotated periods, already sorted by start
    pub fn evaluate(&self, annotated: &[AnnotatedPeriod]) -> PeriodSet {
        let (first, second) = match self.operator() {
            ChoiceOperator::Precedes => (self.operand1(), self.operand2()),
            ChoiceOperator::Follows => (self.operand2(), self.operand1()),
        };

        annotated
            .windows(2)
            .filter(|pair| {
                let (previous, current) = (&pair[0], &pair[1]);
                previous.event == *first
                    && current.event == *second
                    && self.tolerance().map_or(true, |range| {
                        range.contains_millis(
                            current.period.start.saturating_sub(previous.period.end),
                        )
                    })
            })
            .enumerate()
            .map(|(index, pair)| Period::new(index, pair[0].period.start, pair[1].period.end))
            .collect()
    }
}
