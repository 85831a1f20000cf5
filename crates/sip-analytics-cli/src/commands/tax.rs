use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

use sip_analytics_core::config::TaxRateTable;
use sip_analytics_core::tax::{
    compute_tax_events, estimate_unrealised, summarize_liability, FinancialYearLiability,
    TaxEvent, UnrealisedRun,
};
use sip_analytics_core::{EngineConfig, FundCategory, Issue, Nav, RunStatus, Transaction};

use super::{envelope, read_request};

/// Arguments for capital-gains tax computation
#[derive(Args)]
pub struct TaxArgs {
    /// Path to JSON request: { transactions, categories, as_of_date, current_navs? }
    #[arg(long)]
    pub input: Option<String>,

    /// Override the request's as-of date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Treat every non-equity redemption as short-term
    #[arg(long)]
    pub debt_always_short_term: bool,
}

#[derive(Debug, Deserialize)]
struct TaxRequest {
    transactions: Vec<Transaction>,
    #[serde(default)]
    categories: BTreeMap<String, FundCategory>,
    as_of_date: Option<NaiveDate>,
    /// Latest NAV per fund; enables the unrealised-gain estimate
    #[serde(default)]
    current_navs: Option<BTreeMap<String, Nav>>,
}

#[derive(Serialize)]
struct TaxOutput {
    status: RunStatus,
    total_tax: Decimal,
    liability: Vec<FinancialYearLiability>,
    events: Vec<TaxEvent>,
    issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unrealised: Option<UnrealisedRun>,
}

pub fn run_tax(args: TaxArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let request: TaxRequest = read_request(args.input.as_deref(), "tax computation")?;
    let as_of = args
        .as_of
        .or(request.as_of_date)
        .ok_or("as_of_date is required (request field or --as-of)")?;
    let table = TaxRateTable {
        non_equity_always_short_term: config.tax.non_equity_always_short_term
            || args.debt_always_short_term,
        ..config.tax.clone()
    };

    let started = Instant::now();
    let run = compute_tax_events(&request.transactions, &request.categories, &table, as_of);
    let liability = summarize_liability(&run.events, &table);
    let unrealised = request
        .current_navs
        .as_ref()
        .map(|navs| estimate_unrealised(&request.transactions, navs, &request.categories, &table, as_of));

    let output = TaxOutput {
        status: run.status,
        total_tax: liability.iter().map(|l| l.total_tax).sum(),
        liability,
        events: run.events,
        issues: run.issues,
        unrealised,
    };
    envelope(
        "FIFO lot matching per fund; LTCG/STCG by holding period; exemption applied per financial year (April-March)",
        &table,
        &output.issues,
        started,
        &output,
    )
}
