//! Engine configuration.
//!
//! Weight tables and window sizes are tuning parameters. They are passed
//! explicitly into the stages that use them so each stage can be tested with
//! synthetic settings.

use crate::{EngineError, EventType, MAX_WINDOW_DAYS, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Importance assigned to event types absent from a custom table.
pub const FALLBACK_IMPORTANCE: f64 = 0.5;

/// Configuration for event scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Importance weight per event type
    pub importance: BTreeMap<EventType, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let importance = BTreeMap::from([
            (EventType::CentralBankDecision, 0.9),
            (EventType::MacroDataRelease, 0.8),
            (EventType::GeopoliticalEscalation, 0.8),
            (EventType::Sanctions, 0.7),
            (EventType::CentralBankSpeech, 0.6),
            (EventType::PolicyAnnouncement, 0.6),
            (EventType::EtfFlow, 0.5),
            (EventType::MiningDisruption, 0.5),
        ]);
        Self { importance }
    }
}

impl ScoringConfig {
    /// Importance weight for an event type.
    pub fn importance(&self, event_type: EventType) -> f64 {
        self.importance
            .get(&event_type)
            .copied()
            .unwrap_or(FALLBACK_IMPORTANCE)
    }

    /// Override the importance of one event type.
    pub fn with_importance(mut self, event_type: EventType, weight: f64) -> Self {
        self.importance.insert(event_type, weight);
        self
    }
}

/// Configuration for the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Width of the trailing window in calendar days (default: 7)
    pub window_days: usize,
    /// Calendar days averaged when ranking factors over the curve (default: 7)
    pub ranking_days: usize,
    /// Factors kept in the curve ranking (default: 5)
    pub ranking_top: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            ranking_days: 7,
            ranking_top: 5,
        }
    }
}

/// Configuration for the daily brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefConfig {
    /// Events listed under "what happened" (default: 5)
    pub top_events: usize,
    /// Factors listed under "why it matters" (default: 3)
    pub top_factors: usize,
    /// Forward-looking horizon for the watch list, in days (default: 14)
    pub watch_horizon_days: u32,
    /// Maximum watch list length (default: 3)
    pub watch_limit: usize,
}

impl Default for BriefConfig {
    fn default() -> Self {
        Self {
            top_events: 5,
            top_factors: 3,
            watch_horizon_days: 14,
            watch_limit: 3,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Event scoring weights
    pub scoring: ScoringConfig,
    /// Trailing window settings
    pub window: WindowConfig,
    /// Brief settings
    pub brief: BriefConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// Missing sections and fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Reject parameter sets the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (event_type, weight) in &self.scoring.importance {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(EngineError::Configuration(format!(
                    "importance for {event_type} must be a non-negative number, got {weight}"
                )));
            }
        }
        if self.window.window_days == 0 || self.window.window_days > MAX_WINDOW_DAYS {
            return Err(EngineError::Configuration(format!(
                "window_days must be between 1 and {MAX_WINDOW_DAYS}, got {}",
                self.window.window_days
            )));
        }
        if self.window.ranking_days == 0 {
            return Err(EngineError::Configuration(
                "ranking_days must be at least 1".to_string(),
            ));
        }
        if self.brief.top_events == 0 {
            return Err(EngineError::Configuration(
                "top_events must be at least 1".to_string(),
            ));
        }
        if self.brief.top_factors == 0 {
            return Err(EngineError::Configuration(
                "top_factors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
