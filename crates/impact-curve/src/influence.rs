//! Rolling influence calculator: the Impact Factor Curve.
//!
//! For each calendar day the magnitude of every observed factor is summed over
//! a trailing window of `window_days` calendar days, then the day is
//! normalized so its factor weights sum to one. Days with no signal anywhere
//! in their window are left out of the curve.

use crate::{DailyFactorMatrix, EngineError, Result};
use chrono::{Days, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest accepted trailing window, in calendar days.
pub const MAX_WINDOW_DAYS: usize = 3660;

/// Inclusive span of calendar days; `start` is never after `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl CalendarRange {
    /// Create a range; `start` must not be after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(EngineError::Configuration(format!(
                "calendar start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering every populated day of a matrix.
    pub fn spanning(matrix: &DailyFactorMatrix) -> Option<Self> {
        matrix
            .date_range()
            .and_then(|(start, end)| Self::new(start, end).ok())
    }

    /// First day.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day.
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Smallest range covering both.
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Number of days in the range.
    pub fn num_days(&self) -> usize {
        usize::try_from((self.end - self.start).num_days()).map_or(0, |days| days + 1)
    }

    /// Iterate over the days in the range.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Normalized influence of one factor on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceCurvePoint {
    /// Calendar day
    pub date: NaiveDate,
    /// Catalog factor code
    pub factor_code: String,
    /// Share of the day's trailing intensity, in [0, 1]
    pub influence: f64,
    /// Trailing sum of contribution magnitudes
    pub trailing_intensity: f64,
    /// Trailing sum of signed contributions
    pub net_score: f64,
}

/// Average influence of a factor over a span of the curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorInfluence {
    /// Catalog factor code
    pub factor_code: String,
    /// Mean normalized influence
    pub influence: f64,
}

/// Impact Factor Curve: points ordered by date, then factor code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfluenceCurve {
    /// Trailing window the curve was built with
    pub window_days: usize,
    /// Curve points
    pub points: Vec<InfluenceCurvePoint>,
}

impl InfluenceCurve {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Distinct dates present, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.points.iter().map(|p| p.date).collect();
        dates.dedup();
        dates
    }

    /// Most recent date on the curve.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Points of one date.
    pub fn points_on(&self, date: NaiveDate) -> &[InfluenceCurvePoint] {
        let start = self.points.partition_point(|p| p.date < date);
        let end = self.points.partition_point(|p| p.date <= date);
        &self.points[start..end]
    }

    /// Points of the most recent date.
    pub fn latest_points(&self) -> &[InfluenceCurvePoint] {
        let Some(date) = self.latest_date() else {
            return &[];
        };
        self.points_on(date)
    }

    /// Points of the most recent date on or before `date`.
    pub fn points_as_of(&self, date: NaiveDate) -> &[InfluenceCurvePoint] {
        let end = self.points.partition_point(|p| p.date <= date);
        let Some(last) = end.checked_sub(1) else {
            return &[];
        };
        self.points_on(self.points[last].date)
    }

    /// Rank factors by mean influence over the last `recent_days` calendar days.
    ///
    /// The mean is taken over the curve dates in that span, counting a factor
    /// absent on a date as zero. Ties order by factor code.
    pub fn average_influence(&self, recent_days: usize, top_n: usize) -> Vec<FactorInfluence> {
        let Some(latest) = self.latest_date() else {
            return Vec::new();
        };
        let cutoff = latest
            .checked_sub_days(Days::new(recent_days as u64))
            .unwrap_or(NaiveDate::MIN);

        let recent: Vec<&InfluenceCurvePoint> =
            self.points.iter().filter(|p| p.date > cutoff).collect();
        let mut dates: Vec<NaiveDate> = recent.iter().map(|p| p.date).collect();
        dates.dedup();
        if dates.is_empty() {
            return Vec::new();
        }

        let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
        for point in recent {
            *sums.entry(point.factor_code.as_str()).or_default() += point.influence;
        }

        let mut ranked: Vec<FactorInfluence> = sums
            .into_iter()
            .map(|(code, sum)| FactorInfluence {
                factor_code: code.to_string(),
                influence: sum / dates.len() as f64,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.influence
                .total_cmp(&a.influence)
                .then_with(|| a.factor_code.cmp(&b.factor_code))
        });
        ranked.truncate(top_n);
        ranked
    }

    /// Export as a DataFrame with columns `date`, `factor_code`, `influence`,
    /// `trailing_intensity` and `net_score`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self
            .points
            .iter()
            .map(|p| p.date.format("%Y-%m-%d").to_string())
            .collect();
        let codes: Vec<String> = self.points.iter().map(|p| p.factor_code.clone()).collect();
        let influence: Vec<f64> = self.points.iter().map(|p| p.influence).collect();
        let intensity: Vec<f64> = self.points.iter().map(|p| p.trailing_intensity).collect();
        let net: Vec<f64> = self.points.iter().map(|p| p.net_score).collect();

        let df = df! {
            "date" => dates,
            "factor_code" => codes,
            "influence" => influence,
            "trailing_intensity" => intensity,
            "net_score" => net,
        }?;

        Ok(df)
    }
}

/// Compute the Impact Factor Curve.
///
/// `calendar` selects the days to emit; by default it is the span of the
/// matrix. Cells dated before the calendar start still feed the trailing
/// windows of the first days. Missing days count as zero, so a window always
/// spans `window_days` calendar days including non-trading days.
pub fn rolling_influence(
    daily_matrix: &DailyFactorMatrix,
    window_days: usize,
    calendar: Option<CalendarRange>,
) -> Result<InfluenceCurve> {
    if window_days == 0 || window_days > MAX_WINDOW_DAYS {
        return Err(EngineError::Configuration(format!(
            "window_days must be between 1 and {MAX_WINDOW_DAYS}, got {window_days}"
        )));
    }

    let mut curve = InfluenceCurve {
        window_days,
        points: Vec::new(),
    };
    let Some(range) = calendar.or_else(|| CalendarRange::spanning(daily_matrix)) else {
        return Ok(curve);
    };

    // Dense arrays indexed by factor, then by day offset from `origin`.
    let codes = daily_matrix.factor_codes();
    let factor_index: BTreeMap<&str, usize> =
        codes.iter().enumerate().map(|(i, code)| (*code, i)).collect();
    let origin = range
        .start()
        .checked_sub_days(Days::new(window_days as u64 - 1))
        .ok_or_else(|| {
            EngineError::Configuration(format!(
                "window of {window_days} days precedes the calendar"
            ))
        })?;
    let span = day_offset(origin, range.end())? + 1;

    let mut intensity = vec![vec![0.0_f64; span]; codes.len()];
    let mut net = vec![vec![0.0_f64; span]; codes.len()];
    for (date, code, cell) in daily_matrix.cells() {
        if date < origin || date > range.end() {
            continue;
        }
        let offset = day_offset(origin, date)?;
        let factor = factor_index[code];
        intensity[factor][offset] = cell.intensity;
        net[factor][offset] = cell.net_score;
    }

    let mut skipped = 0usize;
    for (day, date) in range.days().enumerate() {
        // Window [date - window_days + 1, date] in offsets from `origin`.
        let window = day..day + window_days;

        let trailing: Vec<f64> = intensity
            .iter()
            .map(|series| series[window.clone()].iter().sum())
            .collect();
        let total: f64 = trailing.iter().sum();
        if total <= 0.0 {
            skipped += 1;
            continue;
        }

        for (factor, trailing_intensity) in trailing.into_iter().enumerate() {
            if trailing_intensity <= 0.0 {
                continue;
            }
            curve.points.push(InfluenceCurvePoint {
                date,
                factor_code: codes[factor].to_string(),
                influence: trailing_intensity / total,
                trailing_intensity,
                net_score: net[factor][window.clone()].iter().sum(),
            });
        }
    }

    tracing::debug!(
        window_days,
        days = range.num_days(),
        skipped,
        points = curve.points.len(),
        "computed influence curve"
    );
    Ok(curve)
}

/// Days from `origin` to `date`; fails when `date` comes first.
fn day_offset(origin: NaiveDate, date: NaiveDate) -> Result<usize> {
    usize::try_from((date - origin).num_days()).map_err(|_| {
        EngineError::Configuration(format!("calendar day {date} precedes {origin}"))
    })
}
