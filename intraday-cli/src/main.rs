//! Intraday CLI: fetch, batch and summarize commands.
//!
//! Commands:
//! - `fetch`: fetch and aggregate the listed symbols, write one JSON per symbol
//! - `batch`: select symbols from a company table and fetch them
//! - `summarize`: print yearly and monthly rollups from a written file

mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use intraday_core::config::IntradayConfig;
use intraday_core::data::{
    AlphaVantageEndpoint, ConsoleProgress, DataError, HttpTransport, RateLimitedFetcher,
    SelectionRule, SliceOrchestrator, SymbolProgress, Universe,
};
use intraday_core::fetch_ticker_series;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "intraday",
    about = "Intraday CLI: minute-data slice downloader and OHLCV rollups"
)]
struct Cli {
    /// Alpha Vantage API key.
    #[arg(long, env = "ALPHAVANTAGE_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and aggregate symbols, writing {output_dir}/{SYMBOL}.json.
    Fetch {
        /// Symbols to fetch (e.g., IBM AAPL MSFT).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Output directory. Overrides output.dir from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Symbols processed at the same time. Overrides output.jobs.
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Fetch every symbol a company table selects.
    Batch {
        /// Company table CSV (symbol, name, last sale, market cap, IPO year, sector, industry).
        #[arg(long)]
        companies: PathBuf,

        /// Only companies in this sector.
        #[arg(long)]
        sector: Option<String>,

        /// Also include companies of any sector with a billion-dollar market cap.
        #[arg(long, default_value_t = false, requires = "sector")]
        include_billion_caps: bool,

        /// Output directory. Overrides output.dir from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Symbols processed at the same time. Overrides output.jobs.
        #[arg(long)]
        jobs: Option<usize>,

        /// List the selected symbols without fetching anything.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Print yearly and monthly rollups from a written series file.
    Summarize {
        /// Path to a {SYMBOL}.json file.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            symbols,
            output_dir,
            jobs,
        } => {
            let config = load_config(cli.config.as_deref(), output_dir, jobs)?;
            let universe = Universe::from_symbols(symbols);
            let symbols = universe.select(&SelectionRule::All);
            run_fetch(&config, cli.api_key, &symbols)
        }
        Commands::Batch {
            companies,
            sector,
            include_billion_caps,
            output_dir,
            jobs,
            dry_run,
        } => {
            let config = load_config(cli.config.as_deref(), output_dir, jobs)?;
            let universe = Universe::from_company_csv(&companies)?;
            let rule = selection_rule(sector, include_billion_caps);
            let symbols = universe.select(&rule);
            info!(
                companies = universe.ticker_count(),
                selected = symbols.len(),
                "company table loaded"
            );
            if dry_run {
                for symbol in &symbols {
                    println!("{symbol}");
                }
                return Ok(());
            }
            run_fetch(&config, cli.api_key, &symbols)
        }
        Commands::Summarize { path } => {
            let series = output::read_series(&path)?;
            print!("{}", output::render_summary(&series));
            Ok(())
        }
    }
}

fn load_config(
    path: Option<&Path>,
    output_dir: Option<PathBuf>,
    jobs: Option<usize>,
) -> Result<IntradayConfig> {
    let mut config = match path {
        Some(p) => IntradayConfig::from_file(p)?,
        None => IntradayConfig::default(),
    };
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    if let Some(jobs) = jobs {
        config.output.jobs = jobs;
    }
    config.validate()?;
    Ok(config)
}

fn selection_rule(sector: Option<String>, include_billion_caps: bool) -> SelectionRule {
    match sector {
        Some(sector) if include_billion_caps => SelectionRule::SectorOrMarketCapSuffix {
            sector,
            suffix: "B".into(),
        },
        Some(sector) => SelectionRule::Sector(sector),
        None => SelectionRule::All,
    }
}

/// Fetch, aggregate and write every symbol, `output.jobs` at a time.
///
/// All symbols share one fetcher, so `fetch.concurrency` bounds provider calls
/// across the whole run.
fn run_fetch(config: &IntradayConfig, api_key: Option<String>, symbols: &[String]) -> Result<()> {
    let Some(api_key) = api_key else {
        bail!("no API key: pass --api-key or set ALPHAVANTAGE_API_KEY");
    };
    if symbols.is_empty() {
        bail!("no symbols selected");
    }

    let transport = HttpTransport::new(
        config.provider.request_timeout(),
        &config.provider.user_agent,
    )?;
    let fetcher = Arc::new(RateLimitedFetcher::new(
        Arc::new(transport),
        config.fetch.clone(),
    )?);
    let endpoint = AlphaVantageEndpoint::new(config.provider.base_url.clone(), api_key)?;
    let orchestrator = SliceOrchestrator::new(Arc::clone(&fetcher), endpoint);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.output.jobs)
        .thread_name(|i| format!("intraday-symbol-{i}"))
        .build()
        .context("failed to build symbol thread pool")?;

    let progress = ConsoleProgress;
    let total = symbols.len();
    let started = AtomicUsize::new(0);

    let results: Vec<(String, Result<(), DataError>)> = pool.install(|| {
        symbols
            .par_iter()
            .map(|symbol| {
                let position = started.fetch_add(1, Ordering::Relaxed) + 1;
                progress.symbol_started(symbol, position, total);
                let result = process_symbol(&orchestrator, config, symbol);
                progress.symbol_finished(symbol, &result);
                (symbol.clone(), result)
            })
            .collect()
    });

    let failed: Vec<_> = results.iter().filter(|(_, r)| r.is_err()).collect();
    progress.run_finished(total - failed.len(), total);

    let stats = fetcher.stats();
    info!(
        completed = stats.completed,
        retries = stats.retries,
        transport_failures = stats.transport_failures,
        malformed_payloads = stats.malformed_payloads,
        throttle_notices = stats.throttle_notices,
        abandoned = stats.abandoned,
        "fetch statistics"
    );

    if !failed.is_empty() {
        for (symbol, result) in &failed {
            if let Err(e) = result {
                error!(symbol = %symbol, error = %e, "symbol failed");
            }
        }
        bail!("{} of {total} symbols failed", failed.len());
    }
    Ok(())
}

fn process_symbol(
    orchestrator: &SliceOrchestrator,
    config: &IntradayConfig,
    symbol: &str,
) -> Result<(), DataError> {
    let series = fetch_ticker_series(orchestrator, symbol)?;
    let path = output::write_series(&config.output.dir, &series, config.output.pretty)
        .map_err(|e| DataError::Other(format!("{e:#}")))?;
    info!(symbol, path = %path.display(), "series written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fetch_with_overrides() {
        let cli = Cli::try_parse_from([
            "intraday", "fetch", "IBM", "AAPL", "--output-dir", "out", "--jobs", "2", "--api-key", "K",
        ])
        .unwrap();
        assert_eq!(cli.api_key.as_deref(), Some("K"));
        match cli.command {
            Commands::Fetch {
                symbols,
                output_dir,
                jobs,
            } => {
                assert_eq!(symbols, vec!["IBM", "AAPL"]);
                assert_eq!(output_dir, Some(PathBuf::from("out")));
                assert_eq!(jobs, Some(2));
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn billion_caps_require_sector() {
        assert!(Cli::try_parse_from([
            "intraday", "batch", "--companies", "c.csv", "--include-billion-caps",
        ])
        .is_err());
    }

    #[test]
    fn selection_rule_from_flags() {
        assert_eq!(selection_rule(None, false), SelectionRule::All);
        assert_eq!(
            selection_rule(Some("Technology".into()), false),
            SelectionRule::Sector("Technology".into())
        );
        assert_eq!(
            selection_rule(Some("Technology".into()), true),
            SelectionRule::SectorOrMarketCapSuffix {
                sector: "Technology".into(),
                suffix: "B".into(),
            }
        );
    }

    #[test]
    fn overrides_apply_on_top_of_config() {
        let config = load_config(None, Some(PathBuf::from("technology")), Some(8)).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("technology"));
        assert_eq!(config.output.jobs, 8);
        assert!(load_config(None, None, Some(0)).is_err());
    }

    #[test]
    fn fetch_without_key_fails_fast() {
        let err = run_fetch(&IntradayConfig::default(), None, &["IBM".to_string()]).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
