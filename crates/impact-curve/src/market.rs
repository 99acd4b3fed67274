//! Daily market time series and price alignment.

use crate::{CalendarRange, EngineError, InfluenceCurve, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One trading day of market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Trading day
    pub date: NaiveDate,
    /// Gold close
    pub gold_price: f64,
    /// US dollar index close
    #[serde(default, alias = "dxy")]
    pub usd_index: Option<f64>,
    /// Real (or 10Y) yield
    #[serde(default, alias = "yield")]
    pub real_yield: Option<f64>,
    /// VIX close
    #[serde(default)]
    pub vix: Option<f64>,
}

/// Latest-day price summary for the brief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Trading day
    pub date: NaiveDate,
    /// Gold close
    pub gold_price: f64,
    /// Percent change from the previous trading day
    pub change_pct: f64,
    /// US dollar index close
    pub usd_index: Option<f64>,
    /// Real yield
    pub real_yield: Option<f64>,
    /// VIX close
    pub vix: Option<f64>,
}

/// Trading-day rows in ascending date order, one per day.
///
/// Gaps on non-trading days stay gaps: nothing is forward filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSeries {
    rows: Vec<MarketSnapshot>,
}

impl MarketSeries {
    /// Build a series, sorting rows by date.
    ///
    /// Fails on duplicate dates or a non-positive gold price.
    pub fn new(mut rows: Vec<MarketSnapshot>) -> Result<Self> {
        rows.sort_by_key(|r| r.date);

        for row in &rows {
            if !row.gold_price.is_finite() || row.gold_price <= 0.0 {
                return Err(EngineError::InvalidMarketRow {
                    date: row.date,
                    reason: format!("gold_price must be positive, got {}", row.gold_price),
                });
            }
        }
        if let Some(pair) = rows.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(EngineError::InvalidMarketRow {
                date: pair[0].date,
                reason: "duplicate trading day".to_string(),
            });
        }

        Ok(Self { rows })
    }

    /// Parse a JSON array of snapshot rows.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let rows: Vec<MarketSnapshot> = serde_json::from_str(json)?;
        Self::new(rows)
    }

    /// Rows in date order.
    pub fn rows(&self) -> &[MarketSnapshot] {
        &self.rows
    }

    /// Row for a trading day; `None` on non-trading days.
    pub fn get(&self, date: NaiveDate) -> Option<&MarketSnapshot> {
        self.rows
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// First through last trading day.
    pub fn date_range(&self) -> Option<CalendarRange> {
        CalendarRange::new(self.rows.first()?.date, self.rows.last()?.date).ok()
    }

    /// Number of trading days.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the series has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Summary of the most recent trading day.
    ///
    /// `change_pct` compares with the previous trading row, and is zero when
    /// there is only one row.
    pub fn latest_snapshot(&self) -> Option<PriceSnapshot> {
        let latest = self.rows.last()?;
        let change_pct = match self.rows.len() {
            0 | 1 => 0.0,
            n => {
                let prev = self.rows[n - 2].gold_price;
                (latest.gold_price - prev) / prev * 100.0
            }
        };

        Some(PriceSnapshot {
            date: latest.date,
            gold_price: latest.gold_price,
            change_pct,
            usd_index: latest.usd_index,
            real_yield: latest.real_yield,
            vix: latest.vix,
        })
    }

    /// Export as a DataFrame with columns `date`, `gold_price` and
    /// `price_change_pct` (null on the first row).
    pub fn to_frame(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self
            .rows
            .iter()
            .map(|r| r.date.format("%Y-%m-%d").to_string())
            .collect();
        let prices: Vec<f64> = self.rows.iter().map(|r| r.gold_price).collect();

        let df = df! {
            "date" => dates,
            "gold_price" => prices,
        }?
        .lazy()
        .with_column(
            ((col("gold_price") / col("gold_price").shift(lit(1)) - lit(1.0)) * lit(100.0))
                .alias("price_change_pct"),
        )
        .collect()?;

        Ok(df)
    }
}

/// Join the influence curve with trading-day prices.
///
/// Every curve row is kept; rows dated on non-trading days get null
/// `gold_price` and `price_change_pct`. Sorted by date, then factor code.
pub fn align_with_price(curve: &InfluenceCurve, series: &MarketSeries) -> Result<DataFrame> {
    let curve_df = curve.to_frame()?;
    let prices = series.to_frame()?;

    let aligned = curve_df
        .lazy()
        .join(
            prices.lazy(),
            [col("date")],
            [col("date")],
            JoinArgs::new(JoinType::Left),
        )
        .sort(
            ["date", "factor_code"],
            SortMultipleOptions::default().with_order_descending_multi([false, false]),
        )
        .collect()?;

    Ok(aligned)
}

/// One curve point with the trading-day price it is charted against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceOverlayPoint {
    /// Calendar day
    pub date: NaiveDate,
    /// Catalog factor code
    pub factor_code: String,
    /// Normalized influence
    pub influence: f64,
    /// Gold close; `None` on non-trading days
    pub gold_price: Option<f64>,
    /// Percent change from the previous trading day; `None` on non-trading days
    /// and on the first trading day
    pub price_change_pct: Option<f64>,
}

/// Curve points paired with prices, in curve order.
///
/// Row-wise view of [`align_with_price`] for JSON output.
pub fn price_overlay(
    curve: &InfluenceCurve,
    series: &MarketSeries,
) -> Result<Vec<PriceOverlayPoint>> {
    if curve.is_empty() {
        return Ok(Vec::new());
    }

    let aligned = align_with_price(curve, series)?;
    if aligned.height() != curve.len() {
        return Err(EngineError::Configuration(format!(
            "price alignment produced {} rows for {} curve points",
            aligned.height(),
            curve.len()
        )));
    }

    let dates = aligned.column("date")?.str()?;
    let codes = aligned.column("factor_code")?.str()?;
    let prices = aligned.column("gold_price")?.f64()?;
    let changes = aligned.column("price_change_pct")?.f64()?;

    curve
        .points
        .iter()
        .enumerate()
        .map(|(row, point)| {
            let date = point.date.format("%Y-%m-%d").to_string();
            if dates.get(row) != Some(date.as_str())
                || codes.get(row) != Some(point.factor_code.as_str())
            {
                return Err(EngineError::Configuration(format!(
                    "price alignment row {row} does not match curve point {date} {}",
                    point.factor_code
                )));
            }
            Ok(PriceOverlayPoint {
                date: point.date,
                factor_code: point.factor_code.clone(),
                influence: point.influence,
                gold_price: prices.get(row),
                price_change_pct: changes.get(row),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InfluenceCurvePoint;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn row(d: u32, price: f64) -> MarketSnapshot {
        MarketSnapshot {
            date: day(d),
            gold_price: price,
            usd_index: Some(103.2),
            real_yield: Some(1.9),
            vix: None,
        }
    }

    #[test]
    fn test_series_sorts_and_looks_up() {
        let series = MarketSeries::new(vec![row(3, 2010.0), row(1, 2000.0)]).unwrap();

        assert_eq!(series.rows()[0].date, day(1));
        assert!(series.get(day(2)).is_none());
        assert_eq!(series.get(day(3)).unwrap().gold_price, 2010.0);
        assert_eq!(
            series.date_range(),
            Some(CalendarRange::new(day(1), day(3)).unwrap())
        );
    }

    #[test]
    fn test_series_rejects_duplicates_and_bad_prices() {
        assert!(matches!(
            MarketSeries::new(vec![row(1, 2000.0), row(1, 2001.0)]),
            Err(EngineError::InvalidMarketRow { .. })
        ));
        assert!(matches!(
            MarketSeries::new(vec![row(1, 0.0)]),
            Err(EngineError::InvalidMarketRow { .. })
        ));
    }

    #[test]
    fn test_latest_snapshot_change() {
        let series = MarketSeries::new(vec![row(1, 2000.0), row(2, 2030.0)]).unwrap();
        let snapshot = series.latest_snapshot().unwrap();

        assert_eq!(snapshot.date, day(2));
        assert_relative_eq!(snapshot.change_pct, 1.5, epsilon = 1e-9);
        assert_eq!(snapshot.usd_index, Some(103.2));

        let single = MarketSeries::new(vec![row(1, 2000.0)]).unwrap();
        assert_eq!(single.latest_snapshot().unwrap().change_pct, 0.0);
        assert!(MarketSeries::default().latest_snapshot().is_none());
    }

    #[test]
    fn test_from_json_accepts_source_column_names() {
        let json = r#"[
            {"date": "2024-01-02", "gold_price": 2050.5, "dxy": 102.1, "yield": 1.8, "vix": 13.2},
            {"date": "2024-01-03", "gold_price": 2041.0}
        ]"#;
        let series = MarketSeries::from_json_str(json).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.rows()[0].usd_index, Some(102.1));
        assert_eq!(series.rows()[0].real_yield, Some(1.8));
        assert_eq!(series.rows()[1].vix, None);
    }

    #[test]
    fn test_align_leaves_non_trading_days_null() {
        let point = |d: u32| InfluenceCurvePoint {
            date: day(d),
            factor_code: "A1_REAL_YIELD".to_string(),
            influence: 1.0,
            trailing_intensity: 0.5,
            net_score: -0.5,
        };
        let curve = InfluenceCurve {
            window_days: 7,
            points: vec![point(1), point(2), point(3)],
        };
        let series = MarketSeries::new(vec![row(1, 2000.0), row(3, 2020.0)]).unwrap();

        let aligned = align_with_price(&curve, &series).unwrap();
        assert_eq!(aligned.height(), 3);

        let prices = aligned.column("gold_price").unwrap().f64().unwrap();
        assert_eq!(prices.get(0), Some(2000.0));
        assert_eq!(prices.get(1), None);
        assert_eq!(prices.get(2), Some(2020.0));

        let change = aligned.column("price_change_pct").unwrap().f64().unwrap();
        assert_relative_eq!(change.get(2).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_price_overlay_follows_curve_order() {
        let point = |d: u32, code: &str, influence: f64| InfluenceCurvePoint {
            date: day(d),
            factor_code: code.to_string(),
            influence,
            trailing_intensity: influence,
            net_score: influence,
        };
        let curve = InfluenceCurve {
            window_days: 7,
            points: vec![
                point(1, "A1_REAL_YIELD", 0.4),
                point(1, "D1_GEOPOLITICAL", 0.6),
                point(2, "A1_REAL_YIELD", 1.0),
                point(3, "A1_REAL_YIELD", 1.0),
            ],
        };
        let series = MarketSeries::new(vec![row(1, 2000.0), row(3, 2020.0)]).unwrap();

        let overlay = price_overlay(&curve, &series).unwrap();

        assert_eq!(overlay.len(), 4);
        assert_eq!(overlay[1].factor_code, "D1_GEOPOLITICAL");
        assert_eq!(overlay[1].gold_price, Some(2000.0));
        assert_eq!(overlay[1].price_change_pct, None);
        assert_eq!(overlay[2].gold_price, None);
        assert_eq!(overlay[3].date, day(3));
        assert_relative_eq!(overlay[3].price_change_pct.unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_price_overlay_of_empty_curve() {
        let series = MarketSeries::new(vec![row(1, 2000.0)]).unwrap();
        assert!(price_overlay(&InfluenceCurve::default(), &series).unwrap().is_empty());
    }
}
