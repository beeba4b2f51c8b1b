//! Stockbase CLI: maintain and query the local stock database.
//!
//! Commands:
//! - `download` / `update` / `repair` run a maintenance pass
//! - `prune` deactivates symbols the source no longer lists
//! - `symbols sync` / `symbols import` refresh the symbol universe
//! - `info`, `search`, `industry`, `bars` read from the store

mod config;
mod main_lib;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use config::{Config, SourceKind};
use main_lib::{build_services, init_tracing, AppServices};
use stockbase_core::calendar::market_today;
use stockbase_core::maintenance::{CancellationFlag, MaintenanceMode, RunSummary};
use stockbase_core::symbols::{import_symbol_list, Symbol};

/// `bars --end X` without `--start` reads from here.
fn earliest_query_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Parser)]
#[command(name = "stockbase", about = "Local time-series stock database", version)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "STOCKBASE_DB_PATH")]
    db_path: Option<String>,

    /// Data source.
    #[arg(long, global = true, value_enum, env = "STOCKBASE_SOURCE")]
    source: Option<SourceKind>,

    /// Directory of `<SYMBOL>_prices.csv` files for `--source csv`.
    #[arg(long, global = true, env = "STOCKBASE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Symbols processed in parallel.
    #[arg(long, global = true, env = "STOCKBASE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Print results as JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full history for new symbols, delta for the rest.
    Download {
        /// Symbols to process. Defaults to every active symbol.
        symbols: Vec<String>,
    },
    /// Fetch bars after the latest stored date.
    Update {
        /// Symbols to process. Defaults to every active symbol.
        symbols: Vec<String>,
    },
    /// Re-request missing trading days inside the stored span.
    Repair {
        /// Symbols to process. Defaults to every active symbol.
        symbols: Vec<String>,
    },
    /// Deactivate symbols absent from the source listing.
    Prune,
    /// Symbol universe management.
    Symbols {
        #[command(subcommand)]
        action: SymbolsAction,
    },
    /// Summary of what the database holds.
    Info,
    /// Find symbols by code or name.
    Search { keyword: String },
    /// List symbols in one industry.
    Industry { industry: String },
    /// Print stored bars for one symbol.
    Bars {
        symbol: String,

        /// Start date (YYYY-MM-DD). Defaults to the start of history.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum SymbolsAction {
    /// Upsert every symbol the source lists.
    Sync,
    /// Upsert symbols from a `Code,Name,Market,Industry,Type` CSV file.
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config = Config::from_env();
    let cli = Cli::parse();
    init_tracing();

    let config = config.with_overrides(cli.db_path, cli.source, cli.data_dir, cli.concurrency);
    let services = build_services(&config)?;

    match cli.command {
        Commands::Download { symbols } => {
            run_maintenance(&services, MaintenanceMode::Download, symbols, cli.json).await
        }
        Commands::Update { symbols } => {
            run_maintenance(&services, MaintenanceMode::Update, symbols, cli.json).await
        }
        Commands::Repair { symbols } => {
            run_maintenance(&services, MaintenanceMode::Repair, symbols, cli.json).await
        }
        Commands::Prune => {
            let summary = services.maintenance.prune().await?;
            if cli.json {
                print_json(&summary)?;
            } else if !summary.listing_available {
                println!("Source cannot list symbols; nothing pruned.");
            } else {
                println!(
                    "Checked {} symbols, deactivated {} ({} on markets the listing skips)",
                    summary.checked,
                    summary.deactivated.len(),
                    summary.skipped
                );
                for code in &summary.deactivated {
                    println!("  {}", code);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Symbols { action } => {
            match action {
                SymbolsAction::Sync => {
                    let count = services.maintenance.sync_symbols().await?;
                    println!("Synced {} symbols", count);
                }
                SymbolsAction::Import { path } => {
                    let summary = import_symbol_list(services.symbol_store.as_ref(), &path)
                        .await
                        .with_context(|| format!("failed to import {}", path.display()))?;
                    if cli.json {
                        print_json(&summary)?;
                    } else {
                        println!(
                            "Imported {} symbols ({} skipped)",
                            summary.imported, summary.skipped
                        );
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info => {
            let info = services.query.database_info()?;
            if cli.json {
                print_json(&info)?;
            } else {
                println!("Database:      {}", services.storage.db_path());
                println!(
                    "Symbols:       {} ({} active)",
                    info.total_symbols, info.active_symbols
                );
                println!(
                    "Bars:          {} across {} symbols",
                    info.total_bars, info.symbols_with_bars
                );
                match (info.first_date, info.last_date) {
                    (Some(first), Some(last)) => println!("Date range:    {} .. {}", first, last),
                    _ => println!("Date range:    -"),
                }
                println!("Open gaps:     {}", info.open_gaps);
                for market in &info.markets {
                    println!("  {:<10} {}", market.market, market.count);
                }
                match info.last_maintenance_at {
                    Some(at) => println!("Last run:      {}", at.to_rfc3339()),
                    None => println!("Last run:      never"),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Search { keyword } => {
            let symbols = services.query.search_symbols(&keyword)?;
            print_symbols(&symbols, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Industry { industry } => {
            let symbols = services.query.symbols_by_industry(&industry)?;
            print_symbols(&symbols, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Bars { symbol, start, end } => {
            let bars = match (start, end) {
                (None, None) => services.query.get_bars_default(&symbol)?,
                (start, end) => {
                    let end = end.unwrap_or_else(|| market_today(Utc::now()));
                    let start = start.unwrap_or_else(earliest_query_date);
                    if start > end {
                        bail!("--start {} is after --end {}", start, end);
                    }
                    services.query.get_bars(&symbol, start, end)?
                }
            };
            if cli.json {
                print_json(&bars)?;
            } else {
                for bar in &bars {
                    println!(
                        "{} {:>10} {:>10} {:>10} {:>10} {:>14}",
                        bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_symbols(symbols: &[Symbol], json: bool) -> Result<()> {
    if json {
        return print_json(symbols);
    }
    for symbol in symbols {
        println!(
            "{:<8} {:<16} {:<6} {:<12} {}",
            symbol.code,
            symbol.name.as_deref().unwrap_or("-"),
            symbol.market.as_deref().unwrap_or("-"),
            symbol.industry.as_deref().unwrap_or("-"),
            symbol.status
        );
    }
    Ok(())
}

async fn run_maintenance(
    services: &AppServices,
    mode: MaintenanceMode,
    symbols: Vec<String>,
    json: bool,
) -> Result<ExitCode> {
    let cancel = CancellationFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing symbols in flight and skipping the rest");
            on_signal.cancel();
        }
    });

    let symbols = (!symbols.is_empty()).then_some(symbols);
    let summary = services.maintenance.run(mode, symbols, &cancel).await?;
    print_summary(&summary, json)?;

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }

    println!("{}", summary.summary());
    for failure in summary.failures() {
        println!(
            "  {} failed: {}",
            failure.symbol,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
