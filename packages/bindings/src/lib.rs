use std::collections::BTreeMap;

use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sip_analytics_core::config::{OverlapThresholds, TaxRateTable, XirrSettings};
use sip_analytics_core::metrics::FundMetricsInput;
use sip_analytics_core::tax::TaxEvent;
use sip_analytics_core::{EngineConfig, FundCategory, HoldingRecord, NavPoint, Transaction};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse<'a, T: Deserialize<'a>>(input_json: &'a str) -> NapiResult<T> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

fn render<T: Serialize>(output: &T) -> NapiResult<String> {
    serde_json::to_string(output).map_err(to_napi_error)
}

/// Validated engine settings, falling back to defaults when the request carries none.
fn engine_config(config: Option<EngineConfig>) -> NapiResult<EngineConfig> {
    let config = config.unwrap_or_default();
    config.validate().map_err(to_napi_error)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FundMetricsRequest {
    fund: FundMetricsInput,
    #[serde(default)]
    benchmark_series: Option<Vec<NavPoint>>,
    as_of_date: NaiveDate,
    #[serde(default)]
    config: Option<EngineConfig>,
}

#[derive(Deserialize)]
struct PortfolioMetricsRequest {
    funds: Vec<FundMetricsInput>,
    #[serde(default)]
    benchmark_series: Option<Vec<NavPoint>>,
    as_of_date: NaiveDate,
    #[serde(default)]
    config: Option<EngineConfig>,
}

#[napi]
pub fn compute_fund_metrics(input_json: String) -> NapiResult<String> {
    let req: FundMetricsRequest = parse(&input_json)?;
    let config = engine_config(req.config)?;
    let record = sip_analytics_core::metrics::compute_fund_metrics_with(
        &req.fund,
        req.benchmark_series.as_deref(),
        &config,
        req.as_of_date,
    );
    render(&record)
}

#[napi]
pub fn compute_portfolio_metrics(input_json: String) -> NapiResult<String> {
    let req: PortfolioMetricsRequest = parse(&input_json)?;
    let config = engine_config(req.config)?;
    let output = sip_analytics_core::metrics::compute_portfolio_metrics(
        &req.funds,
        req.benchmark_series.as_deref(),
        &config,
        req.as_of_date,
    );
    render(&output)
}

// ---------------------------------------------------------------------------
// Time value
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct XirrRequest {
    flows: Vec<(NaiveDate, Decimal)>,
    #[serde(default)]
    settings: XirrSettings,
}

#[napi]
pub fn xirr(input_json: String) -> NapiResult<String> {
    let mut req: XirrRequest = parse(&input_json)?;
    req.flows.sort_by_key(|(date, _)| *date);
    let days_per_year = EngineConfig::default().days_per_year;
    let rate = sip_analytics_core::time_value::xirr(&req.flows, &req.settings, days_per_year)
        .map_err(to_napi_error)?;
    render(&rate)
}

// ---------------------------------------------------------------------------
// Tax
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TaxEventsRequest {
    transactions: Vec<Transaction>,
    #[serde(default)]
    categories: BTreeMap<String, FundCategory>,
    as_of_date: NaiveDate,
    #[serde(default)]
    rate_table: TaxRateTable,
}

#[derive(Deserialize)]
struct LiabilityRequest {
    events: Vec<TaxEvent>,
    #[serde(default)]
    rate_table: TaxRateTable,
}

#[derive(Deserialize)]
struct UnrealisedRequest {
    transactions: Vec<Transaction>,
    current_navs: BTreeMap<String, Decimal>,
    #[serde(default)]
    categories: BTreeMap<String, FundCategory>,
    as_of_date: NaiveDate,
    #[serde(default)]
    rate_table: TaxRateTable,
}

#[napi]
pub fn compute_tax_events(input_json: String) -> NapiResult<String> {
    let req: TaxEventsRequest = parse(&input_json)?;
    let run = sip_analytics_core::tax::compute_tax_events(
        &req.transactions,
        &req.categories,
        &req.rate_table,
        req.as_of_date,
    );
    render(&run)
}

#[napi]
pub fn summarize_liability(input_json: String) -> NapiResult<String> {
    let req: LiabilityRequest = parse(&input_json)?;
    render(&sip_analytics_core::tax::summarize_liability(
        &req.events,
        &req.rate_table,
    ))
}

#[napi]
pub fn estimate_unrealised(input_json: String) -> NapiResult<String> {
    let req: UnrealisedRequest = parse(&input_json)?;
    let run = sip_analytics_core::tax::estimate_unrealised(
        &req.transactions,
        &req.current_navs,
        &req.categories,
        &req.rate_table,
        req.as_of_date,
    );
    render(&run)
}

// ---------------------------------------------------------------------------
// Overlap
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct OverlapRequest {
    holdings: Vec<HoldingRecord>,
    #[serde(default)]
    thresholds: OverlapThresholds,
}

#[napi]
pub fn compute_overlap(input_json: String) -> NapiResult<String> {
    let req: OverlapRequest = parse(&input_json)?;
    let grouped = sip_analytics_core::overlap::group_holdings(&req.holdings);
    render(&sip_analytics_core::overlap::compute_overlap_report(
        &grouped,
        &req.thresholds,
    ))
}
