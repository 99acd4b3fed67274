#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/impact-curve/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod brief;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod influence;
pub mod market;
mod parallel;
pub mod pipeline;
pub mod scoring;

// Re-export core types
pub use aggregate::{DailyFactorMatrix, FactorCell, aggregate};
pub use brief::{BriefPayload, BriefSynthesizer, EventSummary, FactorDriver, MacroCalendarEntry};
pub use catalog::{FactorCatalog, FactorDefinition, FactorDomain};
pub use config::{BriefConfig, EngineConfig, ScoringConfig, WindowConfig};
pub use error::{EngineError, Result};
pub use event::{Event, EventBatch, EventType, FactorTag, Polarity, parse_events};
pub use influence::{
    CalendarRange, FactorInfluence, InfluenceCurve, InfluenceCurvePoint, MAX_WINDOW_DAYS,
    rolling_influence,
};
pub use market::{
    MarketSeries, MarketSnapshot, PriceOverlayPoint, PriceSnapshot, align_with_price,
    price_overlay,
};
pub use pipeline::{
    AnalysisInputs, AnalysisPayload, influence_curve, run_analysis, run_analysis_with_context,
};
pub use scoring::{DailyContext, MarketContext, NeutralContext, ScoredEvent, score, score_events};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
