use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use sip_analytics_core::metrics::{
    compute_fund_metrics_with, compute_portfolio_metrics, FundMetricsInput,
};
use sip_analytics_core::status::Issue;
use sip_analytics_core::{EngineConfig, NavPoint};

use super::{envelope, read_request};

/// Arguments for single-fund metrics
#[derive(Args)]
pub struct MetricsArgs {
    /// Path to JSON request: { fund, benchmark_series?, as_of_date }
    #[arg(long)]
    pub input: Option<String>,

    /// Override the request's as-of date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Annualised risk-free rate (overrides config)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

/// Arguments for portfolio metrics
#[derive(Args)]
pub struct PortfolioArgs {
    /// Path to JSON request: { funds, benchmark_series?, as_of_date }
    #[arg(long)]
    pub input: Option<String>,

    /// Override the request's as-of date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Annualised risk-free rate (overrides config)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct FundRequest {
    fund: FundMetricsInput,
    #[serde(default)]
    benchmark_series: Option<Vec<NavPoint>>,
    as_of_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct PortfolioRequest {
    funds: Vec<FundMetricsInput>,
    #[serde(default)]
    benchmark_series: Option<Vec<NavPoint>>,
    as_of_date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct MetricsAssumptions {
    as_of_date: NaiveDate,
    risk_free_rate: Decimal,
    periods_per_year: u32,
    days_per_year: u32,
    benchmark: bool,
}

fn resolve(
    config: &EngineConfig,
    risk_free_rate: Option<Decimal>,
    flag_as_of: Option<NaiveDate>,
    request_as_of: Option<NaiveDate>,
) -> Result<(EngineConfig, NaiveDate), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    if let Some(rf) = risk_free_rate {
        config.risk_free_rate = rf;
        config.validate()?;
    }
    let as_of = flag_as_of
        .or(request_as_of)
        .ok_or("as_of_date is required (request field or --as-of)")?;
    Ok((config, as_of))
}

fn assumptions(config: &EngineConfig, as_of_date: NaiveDate, benchmark: bool) -> MetricsAssumptions {
    MetricsAssumptions {
        as_of_date,
        risk_free_rate: config.risk_free_rate,
        periods_per_year: config.periods_per_year,
        days_per_year: config.days_per_year,
        benchmark,
    }
}

pub fn run_metrics(args: MetricsArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let request: FundRequest = read_request(args.input.as_deref(), "fund metrics")?;
    let (config, as_of) = resolve(config, args.risk_free_rate, args.as_of, request.as_of_date)?;

    let started = Instant::now();
    let record = compute_fund_metrics_with(
        &request.fund,
        request.benchmark_series.as_deref(),
        &config,
        as_of,
    );
    envelope(
        "XIRR (Newton-Raphson, bisection fallback); CAGR 1/3/5y; daily-return Sharpe, Sortino, Beta/Alpha, drawdown, volatility",
        &assumptions(&config, as_of, request.benchmark_series.is_some()),
        &record.issues,
        started,
        &record,
    )
}

pub fn run_portfolio(args: PortfolioArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let request: PortfolioRequest = read_request(args.input.as_deref(), "portfolio metrics")?;
    let (config, as_of) = resolve(config, args.risk_free_rate, args.as_of, request.as_of_date)?;

    let started = Instant::now();
    let result = compute_portfolio_metrics(
        &request.funds,
        request.benchmark_series.as_deref(),
        &config,
        as_of,
    );
    let issues: Vec<Issue> = result
        .funds
        .iter()
        .chain(std::iter::once(&result.portfolio))
        .flat_map(|r| r.issues.iter().cloned())
        .collect();
    envelope(
        "Per-fund metrics; portfolio XIRR over pooled cash flows; risk metrics on a current-value-weighted synthetic index",
        &assumptions(&config, as_of, request.benchmark_series.is_some()),
        &issues,
        started,
        &result,
    )
}
