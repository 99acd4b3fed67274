//! Daily aggregation of scored events into a sparse day × factor matrix.
//!
//! Every factor tag contributes `impact_score × strength × sign(polarity)` to
//! the cell of its event's day. Corroborating events on the same day add up
//! rather than being averaged.

use crate::{EngineError, FactorCatalog, Result, ScoredEvent, parallel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Accumulated contributions for one (day, factor) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorCell {
    /// Signed sum of contributions; polarity decides attribution direction
    pub net_score: f64,
    /// Sum of contribution magnitudes, always non-negative
    pub intensity: f64,
    /// Number of factor tags that contributed
    pub event_count: usize,
}

/// Sparse mapping `date → factor_code → accumulated score`.
///
/// Absent (date, factor) pairs are implicitly zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyFactorMatrix {
    cells: BTreeMap<(NaiveDate, String), FactorCell>,
}

impl DailyFactorMatrix {
    /// Cell for a (date, factor) pair, if any event touched it.
    pub fn get(&self, date: NaiveDate, factor_code: &str) -> Option<&FactorCell> {
        self.cells.get(&(date, factor_code.to_string()))
    }

    /// Signed raw score for a (date, factor) pair; zero when absent.
    pub fn score(&self, date: NaiveDate, factor_code: &str) -> f64 {
        self.get(date, factor_code).map_or(0.0, |c| c.net_score)
    }

    /// Magnitude for a (date, factor) pair; zero when absent.
    pub fn intensity(&self, date: NaiveDate, factor_code: &str) -> f64 {
        self.get(date, factor_code).map_or(0.0, |c| c.intensity)
    }

    /// Iterate over populated cells ordered by date, then factor code.
    pub fn cells(&self) -> impl Iterator<Item = (NaiveDate, &str, &FactorCell)> {
        self.cells
            .iter()
            .map(|((date, code), cell)| (*date, code.as_str(), cell))
    }

    /// Every factor code observed, in code order.
    pub fn factor_codes(&self) -> Vec<&str> {
        self.cells
            .keys()
            .map(|(_, code)| code.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// First and last populated dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.cells.keys().next()?.0;
        let last = self.cells.keys().next_back()?.0;
        Some((first, last))
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no event was aggregated.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Bucket scored events by day and factor.
///
/// Fails fast with [`EngineError::UnknownFactor`] on the first tag (in input
/// order) whose code the catalog does not define. The result does not depend
/// on the order of `scored_events`: each cell's contributions are summed in
/// ascending value order.
pub fn aggregate(
    scored_events: &[ScoredEvent],
    catalog: &FactorCatalog,
) -> Result<DailyFactorMatrix> {
    for scored in scored_events {
        for tag in &scored.event.factor_tags {
            if !catalog.contains(&tag.factor_code) {
                return Err(EngineError::UnknownFactor {
                    event_id: scored.event.id.clone(),
                    factor_code: tag.factor_code.clone(),
                });
            }
        }
    }

    let per_event = parallel::map_slice(
        scored_events,
        |scored| {
            scored
                .event
                .factor_tags
                .iter()
                .map(|tag| {
                    let contribution =
                        scored.impact_score * tag.strength * tag.polarity.sign();
                    ((scored.event.timestamp, tag.factor_code.clone()), contribution)
                })
                .collect::<Vec<_>>()
        },
        false,
    );

    let mut contributions: BTreeMap<(NaiveDate, String), Vec<f64>> = BTreeMap::new();
    for (key, value) in per_event.into_iter().flatten() {
        contributions.entry(key).or_default().push(value);
    }

    let cells = contributions
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_by(f64::total_cmp);
            let cell = FactorCell {
                net_score: values.iter().sum(),
                intensity: values.iter().map(|v| v.abs()).sum(),
                event_count: values.len(),
            };
            (key, cell)
        })
        .collect::<BTreeMap<_, _>>();

    tracing::debug!(
        events = scored_events.len(),
        cells = cells.len(),
        "aggregated daily factor scores"
    );
    Ok(DailyFactorMatrix { cells })
}
