//! Canonical event model and batch validation.
//!
//! Events arrive from an external extraction service as a JSON array. Each
//! record is validated on its own: malformed records are skipped and counted,
//! the rest of the batch goes on.

use crate::{EngineError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{info, warn};

/// Closed set of event classifications.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// CPI, PCE, GDP, PMI, payrolls
    #[display("MACRO_DATA_RELEASE")]
    MacroDataRelease,
    /// Central bank speeches and testimony
    #[display("CENTRAL_BANK_SPEECH")]
    CentralBankSpeech,
    /// Rate decisions, QE/QT announcements
    #[display("CENTRAL_BANK_DECISION")]
    CentralBankDecision,
    /// Wars, conflicts, diplomatic tension
    #[display("GEOPOLITICAL_ESCALATION")]
    #[serde(alias = "GEOPOLITICAL")]
    GeopoliticalEscalation,
    /// Financial restrictions and trade measures
    #[display("SANCTIONS")]
    Sanctions,
    /// ETF inflows and outflows
    #[display("ETF_FLOW")]
    EtfFlow,
    /// Mine strikes, closures, output guidance
    #[display("MINING_DISRUPTION")]
    MiningDisruption,
    /// Fiscal and regulatory policy
    #[display("POLICY_ANNOUNCEMENT")]
    PolicyAnnouncement,
}

impl EventType {
    /// All eight event types.
    pub const ALL: [Self; 8] = [
        Self::MacroDataRelease,
        Self::CentralBankSpeech,
        Self::CentralBankDecision,
        Self::GeopoliticalEscalation,
        Self::Sanctions,
        Self::EtfFlow,
        Self::MiningDisruption,
        Self::PolicyAnnouncement,
    ];
}

impl FromStr for EventType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "MACRO_DATA_RELEASE" => Ok(Self::MacroDataRelease),
            "CENTRAL_BANK_SPEECH" => Ok(Self::CentralBankSpeech),
            "CENTRAL_BANK_DECISION" => Ok(Self::CentralBankDecision),
            "GEOPOLITICAL_ESCALATION" | "GEOPOLITICAL" => Ok(Self::GeopoliticalEscalation),
            "SANCTIONS" => Ok(Self::Sanctions),
            "ETF_FLOW" => Ok(Self::EtfFlow),
            "MINING_DISRUPTION" => Ok(Self::MiningDisruption),
            "POLICY_ANNOUNCEMENT" => Ok(Self::PolicyAnnouncement),
            _ => Err(EngineError::Configuration(format!("unknown event type {s}"))),
        }
    }
}

/// Direction of a factor's effect on the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "PolarityRepr", into = "i8")]
pub enum Polarity {
    /// Bearish for the asset
    Negative,
    /// Direction unclear
    #[default]
    Neutral,
    /// Bullish for the asset
    Positive,
}

impl Polarity {
    /// Attribution sign. Neutral tags attribute positively.
    pub const fn sign(self) -> f64 {
        match self {
            Self::Negative => -1.0,
            Self::Neutral | Self::Positive => 1.0,
        }
    }
}

impl From<Polarity> for i8 {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Negative => -1,
            Polarity::Neutral => 0,
            Polarity::Positive => 1,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolarityRepr {
    Int(i64),
    Text(String),
}

impl TryFrom<PolarityRepr> for Polarity {
    type Error = String;

    fn try_from(repr: PolarityRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            PolarityRepr::Int(-1) => Ok(Self::Negative),
            PolarityRepr::Int(0) => Ok(Self::Neutral),
            PolarityRepr::Int(1) => Ok(Self::Positive),
            PolarityRepr::Int(other) => Err(format!("polarity must be -1, 0 or 1, got {other}")),
            PolarityRepr::Text(text) => match text.trim() {
                "-" | "-1" => Ok(Self::Negative),
                "0" | "" => Ok(Self::Neutral),
                "+" | "1" | "+1" => Ok(Self::Positive),
                other => Err(format!("unrecognised polarity {other:?}")),
            },
        }
    }
}

/// One factor attribution on an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorTag {
    /// Catalog factor code
    pub factor_code: String,
    /// Direction of the effect
    pub polarity: Polarity,
    /// How strongly the factor is activated, in [0, 1]
    pub strength: f64,
    /// Extractor confidence in the attribution, in [0, 1]
    pub confidence: f64,
}

impl FactorTag {
    /// Create a factor tag.
    pub fn new(
        factor_code: impl Into<String>,
        polarity: Polarity,
        strength: f64,
        confidence: f64,
    ) -> Self {
        Self {
            factor_code: factor_code.into(),
            polarity,
            strength,
            confidence,
        }
    }
}

/// A classified market event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier
    pub id: String,
    /// Calendar day of the event (UTC)
    pub timestamp: NaiveDate,
    /// News headline
    pub headline: String,
    /// Event classification
    pub event_type: EventType,
    /// Factor attributions, never empty
    pub factor_tags: Vec<FactorTag>,
    /// Publisher
    pub source: String,
}

impl Event {
    /// Create a validated event.
    pub fn new(
        id: impl Into<String>,
        timestamp: NaiveDate,
        headline: impl Into<String>,
        event_type: EventType,
        factor_tags: Vec<FactorTag>,
        source: impl Into<String>,
    ) -> Result<Self> {
        let event = Self {
            id: id.into(),
            timestamp,
            headline: headline.into(),
            event_type,
            factor_tags,
            source: source.into(),
        };
        event.validate()?;
        Ok(event)
    }

    /// Check the record-level invariants.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::invalid_event("<missing>", "empty id"));
        }
        if self.factor_tags.is_empty() {
            return Err(EngineError::invalid_event(&self.id, "no factor tags"));
        }
        for tag in &self.factor_tags {
            if tag.factor_code.trim().is_empty() {
                return Err(EngineError::invalid_event(&self.id, "empty factor code"));
            }
            check_unit_interval(&self.id, "strength", tag.strength)?;
            check_unit_interval(&self.id, "confidence", tag.confidence)?;
        }
        Ok(())
    }

    /// Whether any tag references `factor_code`.
    pub fn tags_factor(&self, factor_code: &str) -> bool {
        self.factor_tags.iter().any(|t| t.factor_code == factor_code)
    }

    fn from_value(value: serde_json::Value, index: usize) -> Result<Self> {
        let raw: RawEvent = serde_json::from_value(value)
            .map_err(|e| EngineError::invalid_event(format!("#{index}"), e.to_string()))?;

        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| EngineError::invalid_event(format!("#{index}"), "missing id"))?;
        let timestamp = raw
            .timestamp
            .as_deref()
            .ok_or_else(|| EngineError::invalid_event(&id, "missing timestamp"))
            .and_then(|ts| parse_event_date(ts).ok_or_else(|| {
                EngineError::invalid_event(&id, format!("unparseable timestamp {ts:?}"))
            }))?;
        let event_type = raw
            .event_type
            .as_deref()
            .ok_or_else(|| EngineError::invalid_event(&id, "missing event_type"))?
            .parse::<EventType>()
            .map_err(|e| EngineError::invalid_event(&id, e.to_string()))?;

        let mut factor_tags = Vec::with_capacity(raw.factor_tags.len());
        for tag in raw.factor_tags {
            let factor_code = tag
                .factor_code
                .ok_or_else(|| EngineError::invalid_event(&id, "factor tag without code"))?;
            let strength = tag
                .strength
                .ok_or_else(|| EngineError::invalid_event(&id, "factor tag without strength"))?;
            let confidence = tag
                .confidence
                .ok_or_else(|| EngineError::invalid_event(&id, "factor tag without confidence"))?;
            factor_tags.push(FactorTag::new(
                factor_code.trim(),
                tag.polarity.unwrap_or_default(),
                strength,
                confidence,
            ));
        }

        let source = match raw.source {
            Some(RawSource::Name(name)) => name,
            Some(RawSource::Detailed { publisher }) => publisher,
            None => String::new(),
        };

        Self::new(id, timestamp, raw.headline, event_type, factor_tags, source)
    }
}

fn check_unit_interval(id: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::invalid_event(
            id,
            format!("{field} {value} outside [0, 1]"),
        ))
    }
}

/// Parse an event timestamp into its UTC calendar day.
///
/// Accepts `YYYY-MM-DD`, RFC 3339, RFC 2822 (RSS `pubDate`) and naive
/// `YYYY-MM-DDTHH:MM:SS` datetimes.
pub fn parse_event_date(timestamp: &str) -> Option<NaiveDate> {
    let ts = timestamp.trim();
    NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Events accepted from one extraction batch.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    /// Validated events in input order
    pub events: Vec<Event>,
    /// Number of records skipped as malformed
    pub rejected: usize,
}

/// Parse and validate a JSON array of event records.
///
/// A document that is not an array fails as a whole. Individual malformed
/// records, and repeats of an id already accepted, are skipped with a warning.
pub fn parse_events(json: &str) -> Result<EventBatch> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let total = values.len();

    let mut batch = EventBatch::default();
    let mut seen = HashSet::with_capacity(total);

    for (index, value) in values.into_iter().enumerate() {
        let parsed = Event::from_value(value, index).and_then(|event| {
            if seen.insert(event.id.clone()) {
                Ok(event)
            } else {
                Err(EngineError::invalid_event(&event.id, "duplicate id"))
            }
        });

        match parsed {
            Ok(event) => batch.events.push(event),
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "skipping malformed event");
                batch.rejected += 1;
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        accepted = batch.events.len(),
        rejected = batch.rejected,
        total,
        "validated event batch"
    );
    Ok(batch)
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default, alias = "event_id")]
    id: Option<String>,
    #[serde(default, alias = "timestamp_utc")]
    timestamp: Option<String>,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    factor_tags: Vec<RawFactorTag>,
    #[serde(default)]
    source: Option<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawFactorTag {
    #[serde(default, alias = "factor")]
    factor_code: Option<String>,
    #[serde(default)]
    polarity: Option<Polarity>,
    #[serde(default)]
    strength: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSource {
    Name(String),
    Detailed {
        #[serde(default)]
        publisher: String,
    },
}
