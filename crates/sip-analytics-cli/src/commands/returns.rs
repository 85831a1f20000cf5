use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use sip_analytics_core::metrics::compute_cagr;
use sip_analytics_core::time_value::{xirr, DatedFlow};
use sip_analytics_core::EngineConfig;

use super::{envelope, read_request};

/// Arguments for XIRR
#[derive(Args)]
pub struct XirrArgs {
    /// Path to JSON array of { date, amount }
    #[arg(long)]
    pub input: Option<String>,

    /// Dated flows "DATE:AMOUNT" (comma-separated, e.g. "2023-01-01:-10000,2024-01-01:11500")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub flows: Option<Vec<String>>,
}

/// Arguments for CAGR
#[derive(Args)]
pub struct CagrArgs {
    /// Starting NAV
    #[arg(long)]
    pub start_nav: Decimal,

    /// Ending NAV
    #[arg(long)]
    pub end_nav: Decimal,

    /// Horizon in years
    #[arg(long)]
    pub years: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
struct FlowInput {
    date: NaiveDate,
    amount: Decimal,
}

#[derive(Serialize)]
struct XirrOutput {
    xirr: Decimal,
    num_flows: usize,
    first_date: NaiveDate,
    last_date: NaiveDate,
}

#[derive(Serialize)]
struct CagrOutput {
    cagr: Decimal,
    growth_multiple: Decimal,
    years: Decimal,
}

fn parse_flow(raw: &str) -> Result<DatedFlow, Box<dyn std::error::Error>> {
    let (date, amount) = raw
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("flow '{raw}' must look like 2024-01-01:-1000"))?;
    let date: NaiveDate = date
        .parse()
        .map_err(|e| format!("bad date in flow '{raw}': {e}"))?;
    let amount: Decimal = amount
        .parse()
        .map_err(|e| format!("bad amount in flow '{raw}': {e}"))?;
    Ok((date, amount))
}

pub fn run_xirr(args: XirrArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let mut flows: Vec<DatedFlow> = match args.flows {
        Some(raw) => raw.iter().map(|f| parse_flow(f)).collect::<Result<_, _>>()?,
        None => read_request::<Vec<FlowInput>>(args.input.as_deref(), "XIRR")?
            .into_iter()
            .map(|f| (f.date, f.amount))
            .collect(),
    };
    flows.sort_by_key(|(date, _)| *date);

    let started = Instant::now();
    let rate = xirr(&flows, &config.xirr, config.days_per_year)?;
    let output = XirrOutput {
        xirr: rate,
        num_flows: flows.len(),
        first_date: flows.first().map(|f| f.0).ok_or("no cash flows")?,
        last_date: flows.last().map(|f| f.0).ok_or("no cash flows")?,
    };
    envelope(
        "XIRR: Newton-Raphson with bisection fallback",
        &config.xirr,
        &[],
        started,
        &output,
    )
}

pub fn run_cagr(args: CagrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let started = Instant::now();
    let cagr = compute_cagr(args.start_nav, args.end_nav, args.years)?;
    let output = CagrOutput {
        cagr,
        growth_multiple: args.end_nav / args.start_nav,
        years: args.years,
    };
    envelope(
        "CAGR = (end / start)^(1 / years) - 1",
        &serde_json::json!({ "start_nav": args.start_nav, "end_nav": args.end_nav }),
        &[],
        started,
        &output,
    )
}
