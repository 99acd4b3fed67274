//! Daily brief synthesis.
//!
//! Reduces the scored events, the latest curve points and a price snapshot
//! into "what happened", "why it matters" and "what to watch".

use crate::{
    BriefConfig, EngineError, EventType, FactorCatalog, FactorDomain, InfluenceCurvePoint,
    PriceSnapshot, Result, ScoredEvent,
};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Default brief title.
pub const DEFAULT_TITLE: &str = "Today in Gold";

/// Scheduled macro event from an external calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroCalendarEntry {
    /// Event name, e.g. "US CPI"
    pub name: String,
    /// Classification, when known
    #[serde(default)]
    pub event_type: Option<EventType>,
    /// Expected date; undated entries never make the watch list
    #[serde(default, alias = "next_date")]
    pub expected_date: Option<NaiveDate>,
    /// Expected market impact, e.g. "High"
    #[serde(default)]
    pub impact: String,
    /// Recurrence description, e.g. "Monthly, ~13th"
    #[serde(default)]
    pub schedule: String,
}

/// One entry under "what happened".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Event identifier
    pub id: String,
    /// Calendar day
    pub date: NaiveDate,
    /// Headline
    pub headline: String,
    /// Classification
    pub event_type: EventType,
    /// Impact score
    pub impact_score: f64,
    /// Tagged factor codes
    pub factors: Vec<String>,
}

/// One entry under "why it matters".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorDriver {
    /// Catalog factor code
    pub factor_code: String,
    /// Catalog name
    pub factor_name: String,
    /// Catalog domain
    pub domain: Option<FactorDomain>,
    /// Normalized influence on the curve date
    pub influence: f64,
    /// Distinct events in the trailing window tagging this factor
    pub event_count: usize,
    /// Headline of the highest-impact such event
    pub sample_event: Option<String>,
}

/// The daily brief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefPayload {
    /// Title
    pub title: String,
    /// As-of day (latest trading day)
    pub date: NaiveDate,
    /// Whether this brief was carried over from an earlier run
    #[serde(default)]
    pub stale: bool,
    /// Latest price summary
    pub price_snapshot: PriceSnapshot,
    /// Top events by impact
    pub what_happened: Vec<EventSummary>,
    /// Top factors by influence
    pub why_it_matters: Vec<FactorDriver>,
    /// Upcoming scheduled events
    pub watch_next: Vec<MacroCalendarEntry>,
}

impl BriefPayload {
    /// Render the brief as plain text for a console.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let ps = &self.price_snapshot;

        let _ = writeln!(out, "{rule}");
        let _ = write!(out, "{} - {}", self.title, self.date);
        if self.stale {
            let _ = write!(out, " (stale)");
        }
        let _ = writeln!(out, "\n{rule}");

        let _ = writeln!(out, "\nPRICE SNAPSHOT");
        let _ = writeln!(out, "   Gold: ${:.2} ({:+.2}%)", ps.gold_price, ps.change_pct);
        if let Some(dxy) = ps.usd_index {
            let _ = writeln!(out, "   USD Index: {dxy:.2}");
        }
        if let Some(real_yield) = ps.real_yield {
            let _ = writeln!(out, "   Real Yield: {real_yield:.2}%");
        }
        if let Some(vix) = ps.vix {
            let _ = writeln!(out, "   VIX: {vix:.2}");
        }

        let _ = writeln!(out, "\nWHAT HAPPENED");
        for (i, event) in self.what_happened.iter().enumerate() {
            let headline: String = event.headline.chars().take(70).collect();
            let _ = writeln!(out, "   {}. {headline}", i + 1);
            let _ = writeln!(
                out,
                "      Impact: {:.2} | Factors: {}",
                event.impact_score,
                event.factors.join(", ")
            );
        }

        let _ = writeln!(out, "\nWHY IT MAY MATTER");
        for driver in &self.why_it_matters {
            let _ = writeln!(out, "   * {}", driver.factor_name);
            let _ = writeln!(
                out,
                "     Influence: {:.1}% | Events: {}",
                driver.influence * 100.0,
                driver.event_count
            );
            if let Some(sample) = &driver.sample_event {
                let sample: String = sample.chars().take(60).collect();
                let _ = writeln!(out, "     Example: {sample}");
            }
        }

        let _ = writeln!(out, "\nWHAT TO WATCH NEXT");
        for entry in &self.watch_next {
            match entry.expected_date {
                Some(date) => {
                    let _ = writeln!(out, "   * {} ({date})", entry.name);
                }
                None => {
                    let _ = writeln!(out, "   * {} ({})", entry.name, entry.schedule);
                }
            }
        }

        let _ = writeln!(out, "\n{rule}");
        out
    }
}

/// Builds [`BriefPayload`]s from one run's scored data.
#[derive(Debug, Clone)]
pub struct BriefSynthesizer<'a> {
    catalog: &'a FactorCatalog,
    config: BriefConfig,
    window_days: usize,
    title: String,
}

impl<'a> BriefSynthesizer<'a> {
    /// Create a synthesizer; `window_days` must match the curve's window.
    pub fn new(catalog: &'a FactorCatalog, config: BriefConfig, window_days: usize) -> Self {
        Self {
            catalog,
            config,
            window_days,
            title: DEFAULT_TITLE.to_string(),
        }
    }

    /// Override the brief title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Synthesize the brief.
    ///
    /// With no scored events, returns `previous` marked stale, or fails with
    /// [`EngineError::InsufficientData`] when there is none. A missing price
    /// snapshot is also `InsufficientData`.
    pub fn synthesize(
        &self,
        scored_events: &[ScoredEvent],
        latest_influence_points: &[InfluenceCurvePoint],
        price_snapshot: Option<&PriceSnapshot>,
        upcoming_calendar: &[MacroCalendarEntry],
        previous: Option<&BriefPayload>,
    ) -> Result<BriefPayload> {
        if scored_events.is_empty() {
            return match previous {
                Some(prior) => {
                    tracing::warn!(date = %prior.date, "no scored events, reusing previous brief");
                    Ok(BriefPayload {
                        stale: true,
                        ..prior.clone()
                    })
                }
                None => Err(EngineError::InsufficientData(
                    "no scored events and no previous brief".to_string(),
                )),
            };
        }
        let Some(price) = price_snapshot else {
            return Err(EngineError::InsufficientData(
                "no price data for the brief".to_string(),
            ));
        };

        Ok(BriefPayload {
            title: self.title.clone(),
            date: price.date,
            stale: false,
            price_snapshot: price.clone(),
            what_happened: self.top_events(scored_events, price.date),
            why_it_matters: self.top_factors(scored_events, latest_influence_points, price.date),
            watch_next: self.watch_list(upcoming_calendar, price.date),
        })
    }

    fn top_events(&self, scored_events: &[ScoredEvent], as_of: NaiveDate) -> Vec<EventSummary> {
        let mut ranked: Vec<&ScoredEvent> = scored_events
            .iter()
            .filter(|s| s.event.timestamp <= as_of)
            .collect();
        // Stable sort keeps input order as the last tie-break.
        ranked.sort_by(|a, b| by_impact_then_recency(a, b));

        ranked
            .into_iter()
            .take(self.config.top_events)
            .map(|s| EventSummary {
                id: s.event.id.clone(),
                date: s.event.timestamp,
                headline: s.event.headline.clone(),
                event_type: s.event.event_type,
                impact_score: s.impact_score,
                factors: s
                    .event
                    .factor_tags
                    .iter()
                    .map(|t| t.factor_code.clone())
                    .collect(),
            })
            .collect()
    }

    fn top_factors(
        &self,
        scored_events: &[ScoredEvent],
        points: &[InfluenceCurvePoint],
        as_of: NaiveDate,
    ) -> Vec<FactorDriver> {
        let curve_date = points.first().map_or(as_of, |p| p.date);
        let window_start = curve_date
            .checked_sub_days(Days::new(self.window_days.saturating_sub(1) as u64))
            .unwrap_or(NaiveDate::MIN);

        let mut ranked: Vec<&InfluenceCurvePoint> = points.iter().collect();
        ranked.sort_by(|a, b| {
            b.influence
                .total_cmp(&a.influence)
                .then_with(|| a.factor_code.cmp(&b.factor_code))
        });

        ranked
            .into_iter()
            .take(self.config.top_factors)
            .map(|point| {
                let mut tagging: Vec<&ScoredEvent> = scored_events
                    .iter()
                    .filter(|s| {
                        s.event.timestamp >= window_start
                            && s.event.timestamp <= curve_date
                            && s.event.tags_factor(&point.factor_code)
                    })
                    .collect();
                tagging.sort_by(|a, b| by_impact_then_recency(a, b));

                let event_count = tagging
                    .iter()
                    .map(|s| s.event.id.as_str())
                    .collect::<BTreeSet<_>>()
                    .len();
                let definition = self.catalog.get(&point.factor_code);

                FactorDriver {
                    factor_code: point.factor_code.clone(),
                    factor_name: self.catalog.name_of(&point.factor_code).to_string(),
                    domain: definition.map(|d| d.domain),
                    influence: point.influence,
                    event_count,
                    sample_event: tagging.first().map(|s| s.event.headline.clone()),
                }
            })
            .collect()
    }

    fn watch_list(
        &self,
        calendar: &[MacroCalendarEntry],
        as_of: NaiveDate,
    ) -> Vec<MacroCalendarEntry> {
        let horizon_end = as_of
            .checked_add_days(Days::new(u64::from(self.config.watch_horizon_days)))
            .unwrap_or(NaiveDate::MAX);

        let mut upcoming: Vec<MacroCalendarEntry> = calendar
            .iter()
            .filter(|entry| {
                entry
                    .expected_date
                    .is_some_and(|d| d >= as_of && d <= horizon_end)
            })
            .cloned()
            .collect();
        upcoming.sort_by(|a, b| {
            a.expected_date
                .cmp(&b.expected_date)
                .then_with(|| a.name.cmp(&b.name))
        });
        upcoming.truncate(self.config.watch_limit);
        upcoming
    }
}

/// Higher impact first, then the more recent event.
fn by_impact_then_recency(a: &ScoredEvent, b: &ScoredEvent) -> Ordering {
    b.impact_score
        .total_cmp(&a.impact_score)
        .then_with(|| b.event.timestamp.cmp(&a.event.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Event, FactorTag, Polarity};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn scored(id: &str, d: u32, impact: f64, codes: &[&str]) -> ScoredEvent {
        ScoredEvent {
            event: Event {
                id: id.to_string(),
                timestamp: day(d),
                headline: format!("headline {id}"),
                event_type: EventType::MacroDataRelease,
                factor_tags: codes
                    .iter()
                    .map(|c| FactorTag::new(*c, Polarity::Positive, 0.5, 0.5))
                    .collect(),
                source: "test".to_string(),
            },
            impact_score: impact,
        }
    }

    fn point(d: u32, code: &str, influence: f64) -> InfluenceCurvePoint {
        InfluenceCurvePoint {
            date: day(d),
            factor_code: code.to_string(),
            influence,
            trailing_intensity: influence,
            net_score: influence,
        }
    }

    fn price(d: u32) -> PriceSnapshot {
        PriceSnapshot {
            date: day(d),
            gold_price: 2040.0,
            change_pct: 0.4,
            usd_index: Some(103.0),
            real_yield: None,
            vix: Some(13.0),
        }
    }

    fn calendar_entry(name: &str, date: Option<NaiveDate>) -> MacroCalendarEntry {
        MacroCalendarEntry {
            name: name.to_string(),
            event_type: Some(EventType::MacroDataRelease),
            expected_date: date,
            impact: "High".to_string(),
            schedule: "Monthly".to_string(),
        }
    }

    #[test]
    fn test_top_events_tie_breaks() {
        let catalog = FactorCatalog::with_defaults();
        let config = BriefConfig {
            top_events: 3,
            ..Default::default()
        };
        let synthesizer = BriefSynthesizer::new(&catalog, config, 7);
        let events = vec![
            scored("old", 10, 0.5, &["A1_REAL_YIELD"]),
            scored("low", 12, 0.1, &["A1_REAL_YIELD"]),
            scored("new", 12, 0.5, &["A1_REAL_YIELD"]),
            scored("new_second", 12, 0.5, &["A1_REAL_YIELD"]),
        ];

        let brief = synthesizer
            .synthesize(&events, &[], Some(&price(12)), &[], None)
            .unwrap();
        let ids: Vec<&str> = brief.what_happened.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "new_second", "old"]);
    }

    #[test]
    fn test_top_events_exclude_events_after_price_date() {
        let catalog = FactorCatalog::with_defaults();
        let synthesizer = BriefSynthesizer::new(&catalog, BriefConfig::default(), 7);
        let events = vec![
            scored("before", 9, 0.2, &["A1_REAL_YIELD"]),
            scored("same_day", 10, 0.3, &["A1_REAL_YIELD"]),
            scored("after", 11, 0.9, &["A1_REAL_YIELD"]),
        ];

        let brief = synthesizer
            .synthesize(&events, &[], Some(&price(10)), &[], None)
            .unwrap();
        let ids: Vec<&str> = brief.what_happened.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["same_day", "before"]);
    }

    #[test]
    fn test_top_factors_count_events_in_window() {
        let catalog = FactorCatalog::with_defaults();
        let synthesizer = BriefSynthesizer::new(&catalog, BriefConfig::default(), 3);
        let events = vec![
            scored("early", 1, 0.9, &["A1_REAL_YIELD"]),
            scored("a", 8, 0.3, &["A1_REAL_YIELD", "D1_GEOPOLITICAL"]),
            scored("b", 10, 0.6, &["A1_REAL_YIELD"]),
            scored("c", 10, 0.2, &["F1_ETF_FLOWS"]),
        ];
        let points = vec![
            point(10, "A1_REAL_YIELD", 0.6),
            point(10, "D1_GEOPOLITICAL", 0.1),
            point(10, "F1_ETF_FLOWS", 0.3),
        ];

        let brief = synthesizer
            .synthesize(&events, &points, Some(&price(10)), &[], None)
            .unwrap();

        let drivers = &brief.why_it_matters;
        assert_eq!(drivers.len(), 3);
        assert_eq!(drivers[0].factor_code, "A1_REAL_YIELD");
        assert_eq!(drivers[0].event_count, 2);
        assert_eq!(drivers[0].sample_event.as_deref(), Some("headline b"));
        assert_eq!(drivers[0].factor_name, "Real interest rates");
        assert_eq!(drivers[0].domain, Some(FactorDomain::MonetaryRates));
        assert_eq!(drivers[1].factor_code, "F1_ETF_FLOWS");
        assert_eq!(drivers[2].factor_code, "D1_GEOPOLITICAL");
        assert_eq!(drivers[2].event_count, 1);
    }

    #[test]
    fn test_watch_list_horizon() {
        let catalog = FactorCatalog::with_defaults();
        let synthesizer = BriefSynthesizer::new(&catalog, BriefConfig::default(), 7);
        let calendar = vec![
            calendar_entry("FOMC Meeting", Some(day(31))),
            calendar_entry("US CPI", Some(day(13))),
            calendar_entry("Past PCE", Some(day(5))),
            calendar_entry("Jobs Report", Some(day(12))),
            calendar_entry("Undated", None),
        ];
        let events = vec![scored("a", 10, 0.5, &["A1_REAL_YIELD"])];

        let brief = synthesizer
            .synthesize(&events, &[], Some(&price(10)), &calendar, None)
            .unwrap();
        let names: Vec<&str> = brief.watch_next.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Jobs Report", "US CPI"]);
    }

    #[test]
    fn test_empty_events_without_previous_is_insufficient() {
        let catalog = FactorCatalog::with_defaults();
        let synthesizer = BriefSynthesizer::new(&catalog, BriefConfig::default(), 7);

        let err = synthesizer
            .synthesize(&[], &[], Some(&price(10)), &[], None)
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }

    #[test]
    fn test_empty_events_fall_back_to_previous() {
        let catalog = FactorCatalog::with_defaults();
        let synthesizer = BriefSynthesizer::new(&catalog, BriefConfig::default(), 7);
        let events = vec![scored("a", 10, 0.5, &["A1_REAL_YIELD"])];
        let previous = synthesizer
            .synthesize(&events, &[], Some(&price(10)), &[], None)
            .unwrap();

        let carried = synthesizer
            .synthesize(&[], &[], Some(&price(11)), &[], Some(&previous))
            .unwrap();
        assert!(carried.stale);
        assert_eq!(carried.date, previous.date);
        assert_eq!(carried.what_happened, previous.what_happened);
    }

    #[test]
    fn test_missing_price_is_insufficient() {
        let catalog = FactorCatalog::with_defaults();
        let synthesizer = BriefSynthesizer::new(&catalog, BriefConfig::default(), 7);
        let events = vec![scored("a", 10, 0.5, &["A1_REAL_YIELD"])];

        assert!(matches!(
            synthesizer.synthesize(&events, &[], None, &[], None),
            Err(EngineError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_render_text() {
        let catalog = FactorCatalog::with_defaults();
        let synthesizer =
            BriefSynthesizer::new(&catalog, BriefConfig::default(), 7).with_title("Today in Gold");
        let events = vec![scored("a", 10, 0.5, &["A1_REAL_YIELD"])];
        let points = vec![point(10, "A1_REAL_YIELD", 1.0)];
        let brief = synthesizer
            .synthesize(&events, &points, Some(&price(10)), &[], None)
            .unwrap();

        let text = brief.render_text();
        assert!(text.contains("Today in Gold - 2024-01-10"));
        assert!(text.contains("Gold: $2040.00 (+0.40%)"));
        assert!(text.contains("Real interest rates"));
        assert!(text.contains("Influence: 100.0% | Events: 1"));
        assert!(!text.contains("Real Yield"));
    }
}
