//! # Zakat CLI
//!
//! Shows live gold/silver rates and computes Zakat from a saved form.
//!
//! ## Usage
//! ```bash
//! # Current metal rates (cached for 8 hours)
//! zakat-cli rates
//!
//! # Force a refetch, or keep watching for updates
//! zakat-cli rates --refresh
//! zakat-cli rates --watch
//!
//! # Compute Zakat for a TOML or JSON form
//! zakat-cli calculate household.toml
//!
//! # Write a sample config file
//! zakat-cli init
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use zakat_core::units::TROY_OUNCE_IN_GRAMS;
use zakat_core::{PriceDefaults, ZakatError, ZakatForm, compute};
use zakat_providers::{
    MetalRateSnapshot, PriceFeed, RateReport, RateService, RateServiceConfig, RateSource, SpotPrices,
    spawn_refresh_task,
};

mod config_loader;
mod output;

use config_loader::CliConfig;

/// Zakat calculator with live metal rates
#[derive(Parser, Debug)]
#[command(name = "zakat-cli")]
#[command(author = "zakatrs contributors")]
#[command(version)]
#[command(about = "Zakat calculator with live gold/silver rates", long_about = None)]
struct Args {
    /// Enable file logging to logs/ directory
    #[arg(long, global = true, default_value = "false")]
    log: bool,

    /// Never contact the rate feed; use configured prices
    #[arg(long, global = true, default_value = "false")]
    offline: bool,

    /// Gold price per gram used offline or when the feed fails
    #[arg(long, global = true)]
    gold_price: Option<Decimal>,

    /// Silver price per gram used offline or when the feed fails
    #[arg(long, global = true)]
    silver_price: Option<Decimal>,

    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show current gold and silver rates
    Rates {
        /// Fetch from the feed even if cached rates are fresh
        #[arg(long)]
        refresh: bool,

        /// Print the rate report as JSON
        #[arg(long)]
        json: bool,

        /// Keep running and print rates whenever they are refreshed
        #[arg(long)]
        watch: bool,
    },
    /// Compute Zakat from a form file (.toml or .json)
    Calculate {
        form: PathBuf,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a sample config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CliConfig::load_from(path),
        None => CliConfig::load(),
    };

    let _file_guard = init_logging(args.log || config.enable_logging.unwrap_or(false))?;

    match &args.command {
        Commands::Rates { refresh, json, watch } => run_rates(&args, &config, *refresh, *json, *watch).await,
        Commands::Calculate { form, json } => run_calculate(&args, &config, form, *json).await,
        Commands::Init { force } => run_init(&args, *force),
    }
}

/// Logs go to stderr so `--json` output stays parseable. With file logging,
/// a daily rolling file under `logs/` is added.
fn init_logging(
    to_file: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    if to_file {
        std::fs::create_dir_all("logs")?;

        let file_appender = tracing_appender::rolling::daily("logs", "zakat.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let env_filter = tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("zakat=debug".parse()?);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .init();

        info!("--- Zakat Session Started [{}] ---", chrono::Utc::now());
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("zakat=info".parse()?),
            )
            .init();
        Ok(None)
    }
}

fn is_offline(args: &Args, config: &CliConfig) -> bool {
    args.offline || config.offline.unwrap_or(false) || !cfg!(feature = "live-pricing")
}

fn price_defaults(args: &Args, config: &CliConfig) -> Result<PriceDefaults, Box<dyn std::error::Error>> {
    Ok(config.price_defaults(args.gold_price, args.silver_price)?)
}

#[cfg(feature = "live-pricing")]
fn live_feed(config: &CliConfig) -> Result<Arc<dyn PriceFeed>, ZakatError> {
    Ok(Arc::new(zakat_providers::GoldPriceFeed::new(&config.network_config())))
}

#[cfg(not(feature = "live-pricing"))]
fn live_feed(_config: &CliConfig) -> Result<Arc<dyn PriceFeed>, ZakatError> {
    Err(ZakatError::ConfigurationError(
        "Built without the live-pricing feature".to_string(),
    ))
}

fn rate_service(config: &CliConfig) -> Result<RateService, Box<dyn std::error::Error>> {
    let cache = config.rate_cache()?;
    debug!(cache = %cache.path().display(), "Using rate cache");
    Ok(RateService::new(live_feed(config)?, Arc::new(cache), RateServiceConfig::default()))
}

/// Rates built from the configured per-gram prices, for offline runs.
fn offline_report(defaults: &PriceDefaults) -> Result<RateReport, ZakatError> {
    let per_ounce = |per_gram: Decimal| {
        per_gram
            .checked_mul(TROY_OUNCE_IN_GRAMS)
            .ok_or_else(|| ZakatError::ConfigurationError(format!("Price {} per gram is too large", per_gram)))
    };
    let spot = SpotPrices {
        gold_per_ounce: per_ounce(defaults.gold_price_per_gram)?,
        silver_per_ounce: per_ounce(defaults.silver_price_per_gram)?,
    };
    let mut snapshot = MetalRateSnapshot::from_spot(spot, chrono::Utc::now());
    snapshot.gold.per_gram = defaults.gold_price_per_gram;
    snapshot.silver.per_gram = defaults.silver_price_per_gram;
    Ok(RateReport {
        snapshot,
        source: RateSource::Fallback,
        error: None,
    })
}

/// Per-gram (gold, silver) prices for holdings without their own. When the
/// feed failed, explicitly configured prices win over the built-in fallback.
fn market_prices(
    report: &RateReport,
    gold_configured: Option<Decimal>,
    silver_configured: Option<Decimal>,
) -> (Decimal, Decimal) {
    let gold = report.snapshot.gold_price_per_gram();
    let silver = report.snapshot.silver_price_per_gram();
    if !report.is_fallback() {
        return (gold, silver);
    }
    (gold_configured.unwrap_or(gold), silver_configured.unwrap_or(silver))
}

async fn with_spinner<F: std::future::Future<Output = RateReport>>(quiet: bool, work: F) -> RateReport {
    if quiet {
        return work.await;
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Fetching metal rates...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let report = work.await;
    spinner.finish_and_clear();
    report
}

async fn run_rates(
    args: &Args,
    config: &CliConfig,
    refresh: bool,
    json: bool,
    watch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if is_offline(args, config) {
        let report = offline_report(&price_defaults(args, config)?)?;
        return print_rates(&report, "Offline metal rates", json);
    }

    let service = rate_service(config)?;
    let report = with_spinner(json, async {
        if refresh {
            service.refresh().await
        } else {
            service.get_rates().await
        }
    })
    .await;
    print_rates(&report, "Metal rates", json)?;

    if !watch {
        return Ok(());
    }

    let _refresh = spawn_refresh_task(service.clone());
    let mut last_seen = report.last_updated();
    let mut poll = tokio::time::interval(service.config().check_interval);
    if !json {
        println!("{}", "Watching for rate updates (Ctrl-C to stop)".dimmed());
    }
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = poll.tick() => {
                if let Some(current) = service.current()
                    && current.last_updated() != last_seen
                {
                    last_seen = current.last_updated();
                    print_rates(&current, "Metal rates", json)?;
                }
            }
        }
    }
    Ok(())
}

fn print_rates(report: &RateReport, heading: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let value = serde_json::json!({
            "source": output::source_label(report.source),
            "lastUpdated": report.last_updated(),
            "error": report.error,
            "rates": report.snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", output::render_rates(report, heading));
    }
    Ok(())
}

async fn run_calculate(
    args: &Args,
    config: &CliConfig,
    form_path: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let form = ZakatForm::load(form_path)?;
    let defaults = price_defaults(args, config)?;
    let settings = config.apply_to(form.settings, defaults);
    settings.validate()?;

    let assets = if is_offline(args, config) {
        info!("Offline: unset metal prices use configured defaults");
        form.assets
    } else {
        let report = with_spinner(json, rate_service(config)?.get_rates()).await;
        if let Some(error) = &report.error {
            warn!("{}", error);
            if !json {
                eprintln!("{}", error.yellow());
            }
        }
        let (gold, silver) = market_prices(
            &report,
            args.gold_price.or(config.gold_price),
            args.silver_price.or(config.silver_price),
        );
        form.assets.with_market_prices(gold, silver)
    };

    let result = compute(&assets, &form.liabilities, &settings)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", output::render_result(&result));
    }
    Ok(())
}

fn run_init(args: &Args, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => CliConfig::config_path().ok_or("Could not determine config directory")?,
    };

    if path.exists() && !force {
        println!("Config already exists at {} (use --force to overwrite)", path.display());
        return Ok(());
    }

    CliConfig::create_sample(&path)?;
    println!("{} {}", "Wrote".green(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use zakat_core::prelude::*;

    fn report(source: RateSource) -> RateReport {
        RateReport {
            snapshot: MetalRateSnapshot::fallback(chrono::Utc::now()),
            source,
            error: None,
        }
    }

    #[test]
    fn test_configured_prices_replace_fallback_rates() {
        let fallback = report(RateSource::Fallback);
        assert_eq!(market_prices(&fallback, Some(dec!(90)), None), (dec!(90), dec!(0.92)));
        assert_eq!(market_prices(&fallback, None, None), (dec!(80.38), dec!(0.92)));

        // Live rates are never overridden.
        let live = report(RateSource::Live);
        assert_eq!(market_prices(&live, Some(dec!(90)), Some(dec!(2))), (dec!(80.38), dec!(0.92)));
    }

    #[test]
    fn test_configured_gold_price_sets_nisab_after_feed_failure() {
        let (gold, silver) = market_prices(&report(RateSource::Fallback), Some(dec!(100)), None);
        let assets = AssetSnapshot::new().cash_bank(8000).gold_weight(10).with_market_prices(gold, silver);
        let result = compute(&assets, &LiabilitySnapshot::new(), &CalculationSettings::new()).unwrap();

        assert_eq!(result.total_assets, dec!(9000));
        assert_eq!(result.nisab_threshold, dec!(8500));
        assert!(result.is_payable);
    }

    #[test]
    fn test_offline_report_uses_configured_gram_prices() {
        let defaults = PriceDefaults::new(90, 1).unwrap();
        let report = offline_report(&defaults).unwrap();
        assert_eq!(report.snapshot.gold.per_gram, dec!(90));
        assert_eq!(report.snapshot.silver.per_gram, dec!(1));
        assert!(report.is_fallback());

        let huge = PriceDefaults::new(Decimal::MAX, 1).unwrap();
        assert!(offline_report(&huge).is_err());
    }
}
