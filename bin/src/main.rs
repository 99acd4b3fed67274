//! CLI for the impact-curve factor engine.
//!
//! Lists the factor catalog, and runs the scoring pipeline over event and
//! market files, writing the influence curve and daily brief as JSON.

use clap::{Parser, Subcommand};
use impact_curve::{
    AnalysisInputs, BriefPayload, EngineConfig, FactorCatalog, FactorDomain, MacroCalendarEntry,
    MarketSeries, NeutralContext, Result, influence_curve, parse_events, run_analysis,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "impact-curve")]
#[command(about = "Factor scoring and impact curves from market events", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the factor catalog grouped by domain
    Factors {
        /// Catalog file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Show information about a specific factor
    Info {
        /// Factor code, e.g. A1_REAL_YIELD
        code: String,
        /// Catalog file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Run the full analysis and emit the payload as JSON
    Analyze {
        /// Extracted events (JSON array)
        #[arg(long)]
        events: PathBuf,
        /// Daily market series (JSON array)
        #[arg(long)]
        market: PathBuf,
        /// Upcoming macro calendar (JSON array)
        #[arg(long)]
        calendar: Option<PathBuf>,
        /// Catalog file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Brief from an earlier run, reused when there are no events
        #[arg(long)]
        previous: Option<PathBuf>,
        /// Write the payload here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the curve aligned with trading-day prices here
        #[arg(long)]
        aligned: Option<PathBuf>,
        /// Also print the brief as text to stderr
        #[arg(long)]
        text: bool,
    },
    /// Emit only the influence curve as JSON
    Curve {
        /// Extracted events (JSON array)
        #[arg(long)]
        events: PathBuf,
        /// Trailing window in calendar days
        #[arg(long)]
        window_days: Option<usize>,
        /// Catalog file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout carries only the JSON payload.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Factors { catalog } => {
            list_factors(&load_catalog(catalog.as_deref())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info { code, catalog } => {
            let found = show_factor_info(&load_catalog(catalog.as_deref())?, &code);
            Ok(if found { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Analyze {
            events,
            market,
            calendar,
            catalog,
            config,
            previous,
            output,
            aligned,
            text,
        } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let config = load_config(config.as_deref())?;

            let batch = parse_events(&read(&events)?)?;
            let inputs = AnalysisInputs {
                events: batch.events,
                rejected_events: batch.rejected,
                market: MarketSeries::from_json_str(&read(&market)?)?,
                calendar: match calendar {
                    Some(path) => serde_json::from_str::<Vec<MacroCalendarEntry>>(&read(&path)?)?,
                    None => Vec::new(),
                },
                previous_brief: match previous {
                    Some(path) => Some(serde_json::from_str::<BriefPayload>(&read(&path)?)?),
                    None => None,
                },
            };

            let payload = run_analysis(&inputs, &catalog, &config)?;
            if text {
                eprint!("{}", payload.brief.render_text());
            }
            if let Some(path) = aligned.as_deref() {
                write_json(
                    &serde_json::to_string_pretty(&payload.price_overlay)?,
                    Some(path),
                )?;
            }
            write_json(&serde_json::to_string_pretty(&payload)?, output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Curve {
            events,
            window_days,
            catalog,
        } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let mut config = EngineConfig::default();
            if let Some(window_days) = window_days {
                config.window.window_days = window_days;
            }

            let batch = parse_events(&read(&events)?)?;
            let curve = influence_curve(&batch.events, &catalog, &config, &NeutralContext, None)?;
            write_json(&serde_json::to_string_pretty(&curve)?, None)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "reading input");
    Ok(std::fs::read_to_string(path)?)
}

fn load_catalog(path: Option<&Path>) -> Result<FactorCatalog> {
    path.map_or_else(|| Ok(FactorCatalog::with_defaults()), FactorCatalog::load)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    path.map_or_else(|| Ok(EngineConfig::default()), EngineConfig::load)
}

fn write_json(json: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(path = %path.display(), "payload written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// List the catalog grouped by domain.
fn list_factors(catalog: &FactorCatalog) {
    println!("Factor Catalog ({} factors)\n", catalog.len());

    for domain in FactorDomain::ALL {
        let factors = catalog.by_domain(domain);
        if factors.is_empty() {
            continue;
        }
        println!("{} {}:", domain.prefix(), domain);
        for definition in factors {
            println!("  {} - {}", definition.code, definition.name);
        }
        println!();
    }
}

/// Show one factor definition; unknown codes list what is available.
fn show_factor_info(catalog: &FactorCatalog, code: &str) -> bool {
    let Some(definition) = catalog.get(code) else {
        eprintln!("Error: Factor '{code}' not found");
        eprintln!("\nAvailable factors:");
        for code in catalog.codes() {
            eprintln!("  {code}");
        }
        return false;
    };

    println!("Factor: {}", definition.code);
    println!("Name: {}", definition.name);
    println!("Domain: {}", definition.domain);
    println!("Mechanism: {}", definition.mechanism);
    println!("Typical lag: {}", definition.typical_lag);
    if let Some(proxy) = &definition.proxy_series {
        println!("Proxy series: {proxy}");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "impact-curve",
            "analyze",
            "--events",
            "events.json",
            "--market",
            "market.json",
            "--aligned",
            "overlay.json",
            "--text",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                events,
                market,
                calendar,
                output,
                aligned,
                text,
                ..
            } => {
                assert_eq!(events, PathBuf::from("events.json"));
                assert_eq!(market, PathBuf::from("market.json"));
                assert!(calendar.is_none());
                assert!(output.is_none());
                assert_eq!(aligned, Some(PathBuf::from("overlay.json")));
                assert!(text);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_analyze_writes_aligned_overlay() {
        let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../crates/impact-curve/data");
        let out_dir = std::env::temp_dir().join(format!("impact-curve-cli-{}", std::process::id()));
        std::fs::create_dir_all(&out_dir).unwrap();
        let output = out_dir.join("payload.json");
        let aligned = out_dir.join("overlay.json");

        run(Commands::Analyze {
            events: data.join("sample_events.json"),
            market: data.join("sample_market.json"),
            calendar: Some(data.join("macro_calendar.json")),
            catalog: None,
            config: None,
            previous: None,
            output: Some(output.clone()),
            aligned: Some(aligned.clone()),
            text: false,
        })
        .unwrap();

        let payload: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let overlay: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&aligned).unwrap()).unwrap();
        assert_eq!(overlay, payload["price_overlay"]);
        assert!(!overlay.as_array().unwrap().is_empty());

        std::fs::remove_dir_all(&out_dir).unwrap();
    }

    #[test]
    fn test_analyze_requires_market() {
        assert!(Cli::try_parse_from(["impact-curve", "analyze", "--events", "e.json"]).is_err());
    }

    #[test]
    fn test_default_catalog_covers_every_domain() {
        let catalog = load_catalog(None).unwrap();
        for domain in FactorDomain::ALL {
            assert!(!catalog.by_domain(domain).is_empty(), "{domain} is empty");
        }
    }

    #[test]
    fn test_info_unknown_code_fails() {
        let catalog = FactorCatalog::with_defaults();
        assert!(!show_factor_info(&catalog, "Z9_NONEXISTENT"));
        assert!(show_factor_info(&catalog, "A1_REAL_YIELD"));
    }
}
