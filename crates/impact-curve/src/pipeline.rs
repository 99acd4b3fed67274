//! End-to-end analysis run.
//!
//! scoring → daily aggregation → rolling normalization → brief synthesis.
//! Every stage is a pure function of its inputs; a run holds no state beyond
//! its own local values.

use crate::{
    BriefPayload, BriefSynthesizer, CalendarRange, DailyFactorMatrix, EngineConfig, Event,
    FactorCatalog, FactorInfluence, InfluenceCurve, MacroCalendarEntry, MarketContext,
    MarketSeries, MarketSnapshot, NeutralContext, PriceOverlayPoint, Result, ScoredEvent,
    aggregate, price_overlay, rolling_influence, score_events,
};
use serde::{Deserialize, Serialize};

/// Materialized inputs of one run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInputs {
    /// Validated events
    pub events: Vec<Event>,
    /// Events dropped during validation, reported in the payload
    pub rejected_events: usize,
    /// Daily market series
    pub market: MarketSeries,
    /// Upcoming scheduled macro events
    pub calendar: Vec<MacroCalendarEntry>,
    /// Brief of an earlier run, used when this run has no events
    pub previous_brief: Option<BriefPayload>,
}

/// Output handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    /// Daily brief
    pub brief: BriefPayload,
    /// Full Impact Factor Curve
    pub influence_curve: InfluenceCurve,
    /// Curve points paired with trading-day prices, for charting
    pub price_overlay: Vec<PriceOverlayPoint>,
    /// Factors ranked by mean influence over the ranking span
    pub top_factors: Vec<FactorInfluence>,
    /// Scored events in input order
    pub events: Vec<ScoredEvent>,
    /// Trading-day market rows the run used
    pub market_data: Vec<MarketSnapshot>,
    /// Number of malformed events skipped
    pub rejected_events: usize,
}

/// Event span joined with `other`.
fn covering_range(
    matrix: &DailyFactorMatrix,
    other: Option<CalendarRange>,
) -> Option<CalendarRange> {
    match (CalendarRange::spanning(matrix), other) {
        (Some(events_span), Some(other)) => Some(events_span.union(other)),
        (events_span, other) => events_span.or(other),
    }
}

/// Compute only the Impact Factor Curve.
///
/// The curve covers the event span joined with `calendar`, when given.
pub fn influence_curve(
    events: &[Event],
    catalog: &FactorCatalog,
    config: &EngineConfig,
    context: &dyn MarketContext,
    calendar: Option<CalendarRange>,
) -> Result<InfluenceCurve> {
    config.validate()?;
    let scored = score_events(events, context, &config.scoring)?;
    let matrix = aggregate(&scored, catalog)?;
    rolling_influence(
        &matrix,
        config.window.window_days,
        covering_range(&matrix, calendar),
    )
}

/// Run the full analysis with a neutral market context.
pub fn run_analysis(
    inputs: &AnalysisInputs,
    catalog: &FactorCatalog,
    config: &EngineConfig,
) -> Result<AnalysisPayload> {
    run_analysis_with_context(inputs, catalog, config, &NeutralContext)
}

/// Run the full analysis.
///
/// Unknown factor codes, invalid configuration and missing data for the brief
/// propagate to the caller unmodified.
pub fn run_analysis_with_context(
    inputs: &AnalysisInputs,
    catalog: &FactorCatalog,
    config: &EngineConfig,
    context: &dyn MarketContext,
) -> Result<AnalysisPayload> {
    config.validate()?;

    let scored = score_events(&inputs.events, context, &config.scoring)?;
    let matrix = aggregate(&scored, catalog)?;

    let range = covering_range(&matrix, inputs.market.date_range());
    let curve = rolling_influence(&matrix, config.window.window_days, range)?;

    let price = inputs.market.latest_snapshot();
    let points = price
        .as_ref()
        .map_or_else(|| curve.latest_points(), |p| curve.points_as_of(p.date));
    let brief = BriefSynthesizer::new(catalog, config.brief, config.window.window_days)
        .synthesize(
            &scored,
            points,
            price.as_ref(),
            &inputs.calendar,
            inputs.previous_brief.as_ref(),
        )?;

    let top_factors =
        curve.average_influence(config.window.ranking_days, config.window.ranking_top);
    let overlay = price_overlay(&curve, &inputs.market)?;

    tracing::info!(
        events = scored.len(),
        rejected = inputs.rejected_events,
        curve_points = curve.len(),
        stale_brief = brief.stale,
        "analysis complete"
    );

    Ok(AnalysisPayload {
        brief,
        influence_curve: curve,
        price_overlay: overlay,
        top_factors,
        events: scored,
        market_data: inputs.market.rows().to_vec(),
        rejected_events: inputs.rejected_events,
    })
}
