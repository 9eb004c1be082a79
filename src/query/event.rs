//! Event period detection

use crate::query::ast::Event;
use crate::query::error::QueryResult;
use crate::query::period::{Period, PeriodSet};
use crate::series::DataPoint;

impl Event {
    /// Collapse maximal runs of matching points into periods
    ///
    /// `points` must be sorted by timestamp. A run spans from its first to its
    /// last matching point. Runs outside the duration range are dropped and
    /// the survivors are indexed from zero in detection order.
    pub fn detect_periods(&self, points: &[DataPoint]) -> QueryResult<PeriodSet> {
        let mut runs: Vec<(i64, i64)> = Vec::new();
        let mut current: Option<(i64, i64)> = None;

        for point in points {
            if self.definition().evaluate(point)? {
                current = match current {
                    Some((start, _)) => Some((start, point.timestamp)),
                    None => Some((point.timestamp, point.timestamp)),
                };
            } else if let Some(run) = current.take() {
                runs.push(run);
            }
        }
        runs.extend(current);

        let detected = runs.len();
        let periods: PeriodSet = runs
            .into_iter()
            .filter(|(start, end)| match self.duration() {
                Some(range) => range.contains_millis(end.saturating_sub(*start)),
                None => true,
            })
            .enumerate()
            .map(|(index, (start, end))| Period::new(index, start, end))
            .collect();

        tracing::debug!(
            event = %self.identifier(),
            detected,
            kept = periods.len(),
            "Detected event periods"
        );

        Ok(periods)
    }
}
