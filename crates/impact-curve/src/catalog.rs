//! Factor catalog for discovery and referential integrity.
//!
//! The catalog is the fixed namespace of factor codes an event may reference.
//! It is loaded once at startup, either from the built-in defaults or from a
//! JSON configuration document, and is read-only afterwards.

use crate::{EngineError, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Macro domain grouping related factor codes.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactorDomain {
    /// Monetary policy and interest rates
    #[display("Monetary & Rates")]
    MonetaryRates,
    /// Inflation and growth data
    #[display("Inflation & Growth")]
    InflationGrowth,
    /// Currency and liquidity conditions
    #[display("FX & Liquidity")]
    FxLiquidity,
    /// Risk sentiment and geopolitics
    #[display("Risk & Geopolitics")]
    RiskGeopolitics,
    /// Physical supply and demand
    #[display("Physical Market")]
    PhysicalMarket,
    /// Flows and positioning
    #[display("Market Microstructure")]
    MarketMicrostructure,
}

impl FactorDomain {
    /// All six domains in catalog order.
    pub const ALL: [Self; 6] = [
        Self::MonetaryRates,
        Self::InflationGrowth,
        Self::FxLiquidity,
        Self::RiskGeopolitics,
        Self::PhysicalMarket,
        Self::MarketMicrostructure,
    ];

    /// Letter every factor code of this domain starts with.
    pub const fn prefix(self) -> char {
        match self {
            Self::MonetaryRates => 'A',
            Self::InflationGrowth => 'B',
            Self::FxLiquidity => 'C',
            Self::RiskGeopolitics => 'D',
            Self::PhysicalMarket => 'E',
            Self::MarketMicrostructure => 'F',
        }
    }
}

/// Static catalog entry describing one factor code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorDefinition {
    /// Factor code (unique identifier, e.g. `A1_REAL_YIELD`)
    pub code: String,
    /// Domain the code belongs to
    pub domain: FactorDomain,
    /// Human-readable name
    pub name: String,
    /// Transmission mechanism to the asset price
    pub mechanism: String,
    /// Typical lag between the event and its price effect
    pub typical_lag: String,
    /// Market series that proxies this factor, if any
    pub proxy_series: Option<String>,
}

impl FactorDefinition {
    fn new(
        code: &str,
        domain: FactorDomain,
        name: &str,
        mechanism: &str,
        typical_lag: &str,
        proxy_series: Option<&str>,
    ) -> Self {
        Self {
            code: code.to_string(),
            domain,
            name: name.to_string(),
            mechanism: mechanism.to_string(),
            typical_lag: typical_lag.to_string(),
            proxy_series: proxy_series.map(str::to_string),
        }
    }
}

/// Registry of factor definitions keyed by code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactorCatalog {
    factors: BTreeMap<String, FactorDefinition>,
}

impl FactorCatalog {
    /// Create a new empty catalog.
    pub const fn new() -> Self {
        Self {
            factors: BTreeMap::new(),
        }
    }

    /// Built-in catalog: three factor codes per domain.
    pub fn with_defaults() -> Self {
        use FactorDomain::*;

        let mut catalog = Self::new();
        let defaults = [
            // Monetary & rates
            FactorDefinition::new(
                "A1_REAL_YIELD",
                MonetaryRates,
                "Real interest rates",
                "Higher real yields raise the opportunity cost of holding a non-yielding asset",
                "1-3D",
                Some("DFII10"),
            ),
            FactorDefinition::new(
                "A2_POLICY_PATH",
                MonetaryRates,
                "Policy rate path expectations",
                "Repricing of expected rate cuts or hikes moves yields and the dollar",
                "INTRADAY",
                Some("FEDFUNDS"),
            ),
            FactorDefinition::new(
                "A3_BALANCE_SHEET",
                MonetaryRates,
                "Central bank balance sheet",
                "QE expands liquidity and debases fiat; QT drains it",
                "1-6M",
                Some("WALCL"),
            ),
            // Inflation & growth
            FactorDefinition::new(
                "B1_INFLATION_SURPRISE",
                InflationGrowth,
                "Inflation surprise",
                "Prints above consensus lift hedging demand but also hawkish repricing",
                "INTRADAY",
                Some("CPIAUCSL"),
            ),
            FactorDefinition::new(
                "B2_INFLATION_EXPECTATIONS",
                InflationGrowth,
                "Inflation expectations",
                "Rising breakevens lower real yields for a given nominal rate",
                "1-4W",
                Some("T10YIE"),
            ),
            FactorDefinition::new(
                "B3_GROWTH_MOMENTUM",
                InflationGrowth,
                "Growth momentum",
                "Slowing growth pulls forward easing and supports defensive assets",
                "1-4W",
                Some("GDPC1"),
            ),
            // FX & liquidity
            FactorDefinition::new(
                "C1_USD_STRENGTH",
                FxLiquidity,
                "US dollar strength",
                "A stronger dollar makes dollar-priced gold more expensive abroad",
                "INTRADAY",
                Some("DX-Y.NYB"),
            ),
            FactorDefinition::new(
                "C2_GLOBAL_LIQUIDITY",
                FxLiquidity,
                "Global liquidity",
                "Broad money growth feeds demand for real assets",
                "1-6M",
                Some("M2SL"),
            ),
            FactorDefinition::new(
                "C3_EM_FX_STRESS",
                FxLiquidity,
                "Emerging-market FX stress",
                "Local currency weakness raises local gold prices and dampens import demand",
                "1-4W",
                None,
            ),
            // Risk & geopolitics
            FactorDefinition::new(
                "D1_GEOPOLITICAL",
                RiskGeopolitics,
                "Geopolitical risk",
                "Conflict escalation drives safe-haven demand",
                "INTRADAY",
                Some("GPR"),
            ),
            FactorDefinition::new(
                "D2_FINANCIAL_STRESS",
                RiskGeopolitics,
                "Financial market stress",
                "Equity drawdowns and credit stress trigger hedging flows or forced selling",
                "1-3D",
                Some("^VIX"),
            ),
            FactorDefinition::new(
                "D3_SANCTIONS_RESERVES",
                RiskGeopolitics,
                "Sanctions and reserve diversification",
                "Asset freezes push reserve managers toward assets outside the banking system",
                "1-6M",
                None,
            ),
            // Physical market
            FactorDefinition::new(
                "E1_CENTRAL_BANK_BUYING",
                PhysicalMarket,
                "Official sector purchases",
                "Persistent central bank accumulation absorbs supply",
                "1-6M",
                None,
            ),
            FactorDefinition::new(
                "E2_CONSUMER_DEMAND",
                PhysicalMarket,
                "Jewelry and bar demand",
                "Seasonal and price-sensitive consumer buying sets a floor under dips",
                "1-6M",
                None,
            ),
            FactorDefinition::new(
                "E3_MINE_SUPPLY",
                PhysicalMarket,
                "Mine supply",
                "Strikes, closures and output guidance change physical availability",
                "1-6M",
                None,
            ),
            // Market microstructure
            FactorDefinition::new(
                "F1_ETF_FLOWS",
                MarketMicrostructure,
                "ETF flows",
                "Creations and redemptions translate directly into bullion demand",
                "1-3D",
                Some("GLD"),
            ),
            FactorDefinition::new(
                "F2_FUTURES_POSITIONING",
                MarketMicrostructure,
                "Futures positioning",
                "Crowded speculative length amplifies moves in both directions",
                "1-4W",
                Some("CFTC_COT"),
            ),
            FactorDefinition::new(
                "F3_TECHNICAL_MOMENTUM",
                MarketMicrostructure,
                "Technical momentum",
                "Trend-following and stop levels reinforce price moves",
                "INTRADAY",
                Some("GC=F"),
            ),
        ];

        for definition in defaults {
            catalog.factors.insert(definition.code.clone(), definition);
        }

        catalog
    }

    /// Parse a catalog document.
    ///
    /// The document groups factor codes by domain:
    /// `{"domains": {"MONETARY_RATES": {"name": "...", "factors": {"A1_REAL_YIELD": {...}}}}}`.
    /// Every one of the six domains must be present.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;

        for domain in FactorDomain::ALL {
            if !document.domains.contains_key(&domain) {
                return Err(EngineError::Configuration(format!(
                    "factor catalog is missing domain {domain}"
                )));
            }
        }

        let mut catalog = Self::new();
        for (domain, entry) in document.domains {
            if entry.factors.is_empty() {
                return Err(EngineError::Configuration(format!(
                    "domain {domain} defines no factor codes"
                )));
            }
            for (code, factor) in entry.factors {
                catalog.register(FactorDefinition {
                    code,
                    domain,
                    name: factor.name,
                    mechanism: factor.mechanism,
                    typical_lag: factor.typical_lag,
                    proxy_series: factor.proxy_series,
                })?;
            }
        }

        tracing::debug!(factors = catalog.len(), "loaded factor catalog");
        Ok(catalog)
    }

    /// Load a catalog document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Register a factor definition.
    ///
    /// Fails on an empty or duplicate code, or a code whose prefix does not
    /// match its domain letter.
    pub fn register(&mut self, mut definition: FactorDefinition) -> Result<()> {
        let code = definition.code.trim().to_string();
        if code.is_empty() {
            return Err(EngineError::Configuration(
                "factor code must not be empty".to_string(),
            ));
        }
        if !code.starts_with(definition.domain.prefix()) {
            return Err(EngineError::Configuration(format!(
                "factor code {code} does not belong to domain {} (expected prefix {})",
                definition.domain,
                definition.domain.prefix()
            )));
        }
        if self.factors.contains_key(&code) {
            return Err(EngineError::Configuration(format!(
                "duplicate factor code {code}"
            )));
        }

        definition.code.clone_from(&code);
        self.factors.insert(code, definition);
        Ok(())
    }

    /// Get a factor definition by code.
    pub fn get(&self, code: &str) -> Option<&FactorDefinition> {
        self.factors.get(code)
    }

    /// Whether the catalog defines `code`.
    pub fn contains(&self, code: &str) -> bool {
        self.factors.contains_key(code)
    }

    /// Human-readable name for a code, falling back to the code itself.
    pub fn name_of<'a>(&'a self, code: &'a str) -> &'a str {
        self.get(code).map_or(code, |f| f.name.as_str())
    }

    /// Get factor definitions by domain.
    pub fn by_domain(&self, domain: FactorDomain) -> Vec<&FactorDefinition> {
        self.factors
            .values()
            .filter(|f| f.domain == domain)
            .collect()
    }

    /// Iterate over all definitions in code order.
    pub fn iter(&self) -> impl Iterator<Item = &FactorDefinition> {
        self.factors.values()
    }

    /// All factor codes in code order.
    pub fn codes(&self) -> Vec<&str> {
        self.factors.keys().map(|s| s.as_str()).collect()
    }

    /// Number of factor codes.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    domains: BTreeMap<FactorDomain, DomainDocument>,
}

#[derive(Debug, Deserialize)]
struct DomainDocument {
    factors: BTreeMap<String, FactorDocument>,
}

#[derive(Debug, Deserialize)]
struct FactorDocument {
    name: String,
    #[serde(default)]
    mechanism: String,
    #[serde(default)]
    typical_lag: String,
    #[serde(default)]
    proxy_series: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_domain() {
        let catalog = FactorCatalog::with_defaults();

        assert_eq!(catalog.len(), 18);
        for domain in FactorDomain::ALL {
            let factors = catalog.by_domain(domain);
            assert_eq!(factors.len(), 3, "domain {domain}");
            assert!(
                factors
                    .iter()
                    .all(|f| f.code.starts_with(domain.prefix()))
            );
        }
    }

    #[test]
    fn test_lookup() {
        let catalog = FactorCatalog::with_defaults();

        assert!(catalog.contains("A1_REAL_YIELD"));
        assert!(!catalog.contains("Z9_NONEXISTENT"));
        assert_eq!(catalog.name_of("D1_GEOPOLITICAL"), "Geopolitical risk");
        assert_eq!(catalog.name_of("Z9_NONEXISTENT"), "Z9_NONEXISTENT");
        assert_eq!(
            catalog.get("C1_USD_STRENGTH").unwrap().domain,
            FactorDomain::FxLiquidity
        );
    }

    #[test]
    fn test_register_rejects_duplicates_and_wrong_prefix() {
        let mut catalog = FactorCatalog::with_defaults();

        let duplicate = catalog.get("A1_REAL_YIELD").unwrap().clone();
        assert!(matches!(
            catalog.register(duplicate),
            Err(EngineError::Configuration(_))
        ));

        let misplaced = FactorDefinition::new(
            "B9_MISPLACED",
            FactorDomain::MonetaryRates,
            "Misplaced",
            "",
            "",
            None,
        );
        assert!(matches!(
            catalog.register(misplaced),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_catalogs_compare_by_content() {
        let defaults = FactorCatalog::with_defaults();

        let mut rebuilt = FactorCatalog::new();
        let mut definitions: Vec<FactorDefinition> = defaults.iter().cloned().collect();
        definitions.reverse();
        for definition in definitions {
            rebuilt.register(definition).unwrap();
        }
        assert_eq!(rebuilt, defaults);

        let mut renamed = defaults.clone();
        renamed.factors.get_mut("A1_REAL_YIELD").unwrap().name = "Real rates".to_string();
        assert_ne!(renamed, defaults);
    }

    #[test]
    fn test_from_json_requires_all_domains() {
        let json = r#"{
            "domains": {
                "MONETARY_RATES": {
                    "name": "Monetary",
                    "factors": {"A1_REAL_YIELD": {"name": "Real yields"}}
                }
            }
        }"#;

        let err = FactorCatalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_from_json_minimal_catalog() {
        let json = r#"{
            "domains": {
                "MONETARY_RATES": {
                    "factors": {"A1_REAL_YIELD": {"name": "Real yields", "proxy_series": "DFII10"}}
                },
                "INFLATION_GROWTH": {"factors": {"B1_CPI": {"name": "CPI"}}},
                "FX_LIQUIDITY": {"factors": {"C1_USD": {"name": "Dollar"}}},
                "RISK_GEOPOLITICS": {"factors": {"D1_GEOPOLITICAL": {"name": "Geopolitics"}}},
                "PHYSICAL_MARKET": {"factors": {"E1_MINES": {"name": "Mines"}}},
                "MARKET_MICROSTRUCTURE": {"factors": {"F1_ETF": {"name": "ETF"}}}
            }
        }"#;

        let catalog = FactorCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 6);
        assert_eq!(
            catalog.get("A1_REAL_YIELD").unwrap().proxy_series.as_deref(),
            Some("DFII10")
        );
        assert_eq!(catalog.codes()[0], "A1_REAL_YIELD");
    }
}
