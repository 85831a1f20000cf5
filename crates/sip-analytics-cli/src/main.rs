mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::metrics::{MetricsArgs, PortfolioArgs};
use commands::overlap::OverlapArgs;
use commands::returns::{CagrArgs, XirrArgs};
use commands::tax::TaxArgs;

/// Deterministic mutual-fund portfolio analytics
#[derive(Parser)]
#[command(
    name = "sipa",
    version,
    about = "Deterministic mutual-fund portfolio analytics",
    long_about = "Computes fund and portfolio risk/return metrics (XIRR, CAGR, Sharpe, \
                  Sortino, Beta, Alpha, drawdown, volatility), FIFO capital-gains tax \
                  by financial year, and pairwise holding overlap, all in decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log engine diagnostics to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Risk/return metrics for one fund
    Metrics(MetricsArgs),
    /// Per-fund and value-weighted portfolio metrics
    Portfolio(PortfolioArgs),
    /// FIFO capital-gains events and financial-year liability
    Tax(TaxArgs),
    /// Pairwise holding overlap between funds
    Overlap(OverlapArgs),
    /// XIRR of dated cash flows
    Xirr(XirrArgs),
    /// Compound annual growth rate between two NAVs
    Cagr(CagrArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match input::config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Metrics(args) => commands::metrics::run_metrics(args, &config),
        Commands::Portfolio(args) => commands::metrics::run_portfolio(args, &config),
        Commands::Tax(args) => commands::tax::run_tax(args, &config),
        Commands::Overlap(args) => commands::overlap::run_overlap(args, &config),
        Commands::Xirr(args) => commands::returns::run_xirr(args, &config),
        Commands::Cagr(args) => commands::returns::run_cagr(args),
        Commands::Version => {
            println!("sipa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
