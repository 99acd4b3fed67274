//! Per-event impact scoring.
//!
//! `impact = importance(event_type) × max(strength) × mean(confidence) × market_context`

use crate::{EngineError, Event, Result, ScoringConfig, parallel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Neutral market-context multiplier.
pub const NEUTRAL_CONTEXT: f64 = 1.0;

/// Source of the volatility/regime multiplier applied to event scores.
///
/// Implementations return `None` when no context is known for a day, in which
/// case scoring uses [`NEUTRAL_CONTEXT`].
pub trait MarketContext: Send + Sync + std::fmt::Debug {
    /// Multiplier for events dated `date`.
    fn multiplier(&self, date: NaiveDate) -> Option<f64>;
}

/// Context that never adjusts scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralContext;

impl MarketContext for NeutralContext {
    fn multiplier(&self, _date: NaiveDate) -> Option<f64> {
        None
    }
}

/// Caller-supplied multipliers keyed by day.
#[derive(Debug, Clone, Default)]
pub struct DailyContext {
    multipliers: BTreeMap<NaiveDate, f64>,
}

impl DailyContext {
    /// Create a context from per-day multipliers.
    pub const fn new(multipliers: BTreeMap<NaiveDate, f64>) -> Self {
        Self { multipliers }
    }
}

impl MarketContext for DailyContext {
    fn multiplier(&self, date: NaiveDate) -> Option<f64> {
        self.multipliers.get(&date).copied()
    }
}

/// An event together with its impact score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEvent {
    /// The scored event
    #[serde(flatten)]
    pub event: Event,
    /// Non-negative impact score
    pub impact_score: f64,
}

/// Score one event.
///
/// `market_context` defaults to [`NEUTRAL_CONTEXT`] when absent. An event
/// without factor tags fails with [`EngineError::InvalidEvent`]; a negative or
/// non-finite multiplier fails with [`EngineError::Configuration`].
pub fn score(event: &Event, market_context: Option<f64>, config: &ScoringConfig) -> Result<f64> {
    let tags = &event.factor_tags;
    if tags.is_empty() {
        return Err(EngineError::invalid_event(&event.id, "no factor tags"));
    }

    let context = market_context.unwrap_or(NEUTRAL_CONTEXT);
    if !context.is_finite() || context < 0.0 {
        return Err(EngineError::Configuration(format!(
            "market context multiplier must be a non-negative number, got {context}"
        )));
    }

    let max_strength = tags.iter().map(|t| t.strength).fold(0.0_f64, f64::max);
    let mean_confidence = tags.iter().map(|t| t.confidence).sum::<f64>() / tags.len() as f64;

    Ok(config.importance(event.event_type) * max_strength * mean_confidence * context)
}

/// Score a batch of events, preserving input order.
///
/// Runs across worker threads when the `parallel` feature is enabled; the
/// result is identical to sequential scoring.
pub fn score_events(
    events: &[Event],
    context: &dyn MarketContext,
    config: &ScoringConfig,
) -> Result<Vec<ScoredEvent>> {
    parallel::try_map_slice(
        events,
        |event| {
            let impact_score = score(event, context.multiplier(event.timestamp), config)?;
            Ok(ScoredEvent {
                event: event.clone(),
                impact_score,
            })
        },
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventType, FactorTag, Polarity};
    use approx::assert_relative_eq;

    fn event(event_type: EventType, tags: Vec<FactorTag>) -> Event {
        Event {
            id: "evt".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            headline: "headline".to_string(),
            event_type,
            factor_tags: tags,
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_score_formula() {
        let config = ScoringConfig::default();
        let e = event(
            EventType::CentralBankDecision,
            vec![
                FactorTag::new("A1_REAL_YIELD", Polarity::Negative, 0.8, 0.9),
                FactorTag::new("A2_POLICY_PATH", Polarity::Positive, 0.7, 0.8),
            ],
        );

        // 0.9 × 0.8 × mean(0.9, 0.8)
        let expected = 0.9 * 0.8 * 0.85;
        assert_relative_eq!(score(&e, None, &config).unwrap(), expected, epsilon = 1e-12);
        assert_relative_eq!(
            score(&e, Some(2.0), &config).unwrap(),
            expected * 2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_score_uses_custom_weights() {
        let config = ScoringConfig::default().with_importance(EventType::EtfFlow, 0.0);
        let e = event(
            EventType::EtfFlow,
            vec![FactorTag::new("F1_ETF_FLOWS", Polarity::Positive, 1.0, 1.0)],
        );
        assert_eq!(score(&e, None, &config).unwrap(), 0.0);
    }

    #[test]
    fn test_score_rejects_empty_tags() {
        let e = event(EventType::Sanctions, vec![]);
        let err = score(&e, None, &ScoringConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidEvent { .. }));
    }

    #[test]
    fn test_score_rejects_negative_context() {
        let e = event(
            EventType::Sanctions,
            vec![FactorTag::new("D3_SANCTIONS_RESERVES", Polarity::Positive, 0.5, 0.5)],
        );
        assert!(matches!(
            score(&e, Some(-1.0), &ScoringConfig::default()),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_score_events_applies_daily_context() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let context = DailyContext::new(BTreeMap::from([(day, 1.5)]));
        let config = ScoringConfig::default();
        let events = vec![event(
            EventType::MacroDataRelease,
            vec![FactorTag::new("B1_INFLATION_SURPRISE", Polarity::Positive, 1.0, 1.0)],
        )];

        let neutral = score_events(&events, &NeutralContext, &config).unwrap();
        let scaled = score_events(&events, &context, &config).unwrap();

        assert_relative_eq!(neutral[0].impact_score, 0.8);
        assert_relative_eq!(scaled[0].impact_score, 1.2, epsilon = 1e-12);
    }
}
