use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::series::returns::{up_to, validate_points, NavSeries};
use crate::status::{Issue, IssueKind};
use crate::time_value::{xirr, DatedFlow};
use crate::types::{Money, Nav, NavPoint, Rate, Transaction, Units};
use crate::AnalyticsResult;

use super::risk::{
    annualised_volatility, beta_alpha, cagr_over, max_drawdown, sharpe_ratio, sortino_ratio,
};

/// Risk statistics already computed by an upstream collaborator (e.g. a
/// peer-data provider). Present fields replace the engine's own values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecomputedRisk {
    pub sharpe: Option<Decimal>,
    pub sortino: Option<Decimal>,
    pub beta: Option<Decimal>,
    pub alpha: Option<Rate>,
    pub volatility_ann: Option<Rate>,
    pub max_drawdown: Option<Rate>,
}

/// Everything the engine needs for one fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundMetricsInput {
    pub fund_id: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub nav_series: Vec<NavPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precomputed: Option<PrecomputedRisk>,
}

/// Computed analytics for one fund (or the whole portfolio) as of a date.
///
/// A metric that could not be computed is `None` (serialised as `null`)
/// and has an entry in `issues` saying why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub fund_id: String,
    pub as_of_date: NaiveDate,
    pub xirr: Option<Rate>,
    pub cagr_1y: Option<Rate>,
    pub cagr_3y: Option<Rate>,
    pub cagr_5y: Option<Rate>,
    pub sharpe: Option<Decimal>,
    pub sortino: Option<Decimal>,
    pub beta: Option<Decimal>,
    pub alpha: Option<Rate>,
    pub max_drawdown: Option<Rate>,
    pub volatility_ann: Option<Rate>,
    pub current_value: Option<Money>,
    pub invested_amount: Option<Money>,
    pub unrealised_gain: Option<Money>,
    pub units_held: Option<Units>,
    pub latest_nav: Option<Nav>,
    pub issues: Vec<Issue>,
}

impl MetricRecord {
    pub fn empty(fund_id: impl Into<String>, as_of_date: NaiveDate) -> Self {
        Self {
            fund_id: fund_id.into(),
            as_of_date,
            xirr: None,
            cagr_1y: None,
            cagr_3y: None,
            cagr_5y: None,
            sharpe: None,
            sortino: None,
            beta: None,
            alpha: None,
            max_drawdown: None,
            volatility_ann: None,
            current_value: None,
            invested_amount: None,
            unrealised_gain: None,
            units_held: None,
            latest_nav: None,
            issues: Vec::new(),
        }
    }

    /// True when any sub-computation failed
    pub fn is_partial(&self) -> bool {
        self.issues.iter().any(|i| i.is_error())
    }

    /// Number of analytics fields that hold a value
    pub fn computed_count(&self) -> usize {
        [
            self.xirr,
            self.cagr_1y,
            self.cagr_3y,
            self.cagr_5y,
            self.sharpe,
            self.sortino,
            self.beta,
            self.alpha,
            self.max_drawdown,
            self.volatility_ann,
            self.current_value,
            self.invested_amount,
            self.unrealised_gain,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }

    fn settle<T>(&mut self, metric: &str, result: AnalyticsResult<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(fund = %self.fund_id, metric, error = %e, "metric not computable");
                self.issues.push(Issue::error(format!("{}/{}", self.fund_id, metric), &e));
                None
            }
        }
    }

    fn clear_issues_for(&mut self, metric: &str) {
        let scope = format!("{}/{}", self.fund_id, metric);
        self.issues.retain(|i| i.scope != scope);
    }
}

/// Net position of a fund from its ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Position {
    pub units: Units,
    pub invested: Money,
}

/// Transactions of `fund_id` dated on or before `as_of`, with invalid rows
/// reported and dropped.
pub(crate) fn usable_transactions<'a>(
    fund_id: &str,
    transactions: &'a [Transaction],
    as_of: NaiveDate,
    issues: &mut Vec<Issue>,
) -> Vec<&'a Transaction> {
    let mut usable = Vec::with_capacity(transactions.len());
    for tx in transactions {
        if tx.fund_id != fund_id {
            debug!(fund = fund_id, other = %tx.fund_id, "ignoring transaction of another fund");
            continue;
        }
        if tx.date > as_of {
            debug!(fund = fund_id, date = %tx.date, "ignoring transaction after as-of date");
            continue;
        }
        if tx.amount < Decimal::ZERO || tx.units < Decimal::ZERO {
            let err = AnalyticsError::InvalidInput {
                field: "transaction".into(),
                reason: format!(
                    "{} on {} has negative amount or units",
                    tx.kind, tx.date
                ),
            };
            issues.push(Issue::error(format!("{}/{}", fund_id, tx.date), &err));
            continue;
        }
        usable.push(tx);
    }
    usable
}

pub(crate) fn net_position(transactions: &[&Transaction]) -> Position {
    transactions.iter().fold(
        Position {
            units: Decimal::ZERO,
            invested: Decimal::ZERO,
        },
        |acc, tx| {
            if tx.kind.is_inflow() {
                Position {
                    units: acc.units + tx.units,
                    invested: acc.invested + tx.amount,
                }
            } else {
                Position {
                    units: acc.units - tx.units,
                    invested: acc.invested - tx.amount,
                }
            }
        },
    )
}

/// Investor cash flows: money in negative, money out positive, plus the
/// holding value as a terminal receipt on `as_of`.
pub(crate) fn investor_cashflows(
    transactions: &[&Transaction],
    terminal_value: Option<Money>,
    as_of: NaiveDate,
) -> Vec<DatedFlow> {
    let mut flows: Vec<DatedFlow> = transactions
        .iter()
        .map(|tx| {
            if tx.kind.is_inflow() {
                (tx.date, -tx.amount)
            } else {
                (tx.date, tx.amount)
            }
        })
        .collect();
    if let Some(value) = terminal_value.filter(|v| *v > Decimal::ZERO) {
        flows.push((as_of, value));
    }
    flows.sort_by_key(|(date, _)| *date);
    flows
}

/// Compute a fund's metric record with default engine settings and the
/// given risk-free rate.
pub fn compute_fund_metrics(
    fund_id: &str,
    transactions: &[Transaction],
    nav_series: &[NavPoint],
    benchmark_series: Option<&[NavPoint]>,
    risk_free_rate: Rate,
    as_of_date: NaiveDate,
) -> MetricRecord {
    let config = EngineConfig {
        risk_free_rate,
        ..EngineConfig::default()
    };
    evaluate_fund(
        fund_id,
        transactions,
        nav_series,
        benchmark_series,
        None,
        &config,
        as_of_date,
    )
}

/// Compute a fund's metric record from a bundled input and explicit config.
pub fn compute_fund_metrics_with(
    input: &FundMetricsInput,
    benchmark_series: Option<&[NavPoint]>,
    config: &EngineConfig,
    as_of_date: NaiveDate,
) -> MetricRecord {
    evaluate_fund(
        &input.fund_id,
        &input.transactions,
        &input.nav_series,
        benchmark_series,
        input.precomputed.as_ref(),
        config,
        as_of_date,
    )
}

fn evaluate_fund(
    fund_id: &str,
    transactions: &[Transaction],
    nav_series: &[NavPoint],
    benchmark_series: Option<&[NavPoint]>,
    precomputed: Option<&PrecomputedRisk>,
    config: &EngineConfig,
    as_of: NaiveDate,
) -> MetricRecord {
    debug!(fund = fund_id, %as_of, "computing fund metrics");
    let mut record = MetricRecord::empty(fund_id, as_of);

    let txns = usable_transactions(fund_id, transactions, as_of, &mut record.issues);
    let navs: &[NavPoint] = match validate_points(nav_series) {
        Ok(()) => up_to(nav_series, as_of),
        Err(e) => {
            record.settle::<()>("nav_series", Err(e));
            &[]
        }
    };
    record.latest_nav = navs.last().map(|p| p.nav);

    fill_position(&mut record, &txns, config, as_of);
    fill_risk_metrics(&mut record, navs, benchmark_series, config);

    if let Some(pre) = precomputed {
        apply_precomputed(&mut record, pre);
    }
    record
}

fn fill_position(
    record: &mut MetricRecord,
    txns: &[&Transaction],
    config: &EngineConfig,
    as_of: NaiveDate,
) {
    if txns.is_empty() {
        record.settle::<()>(
            "position",
            Err(AnalyticsError::InsufficientData(
                "no transactions on or before the as-of date".into(),
            )),
        );
        return;
    }

    let position = net_position(txns);
    record.invested_amount = Some(position.invested);

    if position.units < Decimal::ZERO {
        record.settle::<()>(
            "position",
            Err(AnalyticsError::InvalidInput {
                field: "transactions".into(),
                reason: format!("redeemed {} more units than purchased", -position.units),
            }),
        );
        return;
    }
    record.units_held = Some(position.units);

    record.current_value = if position.units.is_zero() {
        Some(Decimal::ZERO)
    } else {
        let latest = record.latest_nav;
        record.settle(
            "current_value",
            latest
                .map(|nav| position.units * nav)
                .ok_or_else(|| AnalyticsError::InsufficientData("no NAV to value the holding".into())),
        )
    };
    record.unrealised_gain = record.current_value.map(|v| v - position.invested);

    let xirr_result = match record.current_value {
        Some(value) => {
            let flows = investor_cashflows(txns, Some(value), as_of);
            xirr(&flows, &config.xirr, config.days_per_year)
        }
        None => Err(AnalyticsError::InsufficientData(
            "terminal holding value unknown".into(),
        )),
    };
    record.xirr = record.settle("xirr", xirr_result);
}

/// Return-series metrics on an already as-of-trimmed NAV window.
pub(crate) fn fill_risk_metrics(
    record: &mut MetricRecord,
    navs: &[NavPoint],
    benchmark_series: Option<&[NavPoint]>,
    config: &EngineConfig,
) {
    let series = match NavSeries::new(navs) {
        Ok(s) => s,
        Err(e) => {
            record.settle::<()>("risk", Err(e));
            return;
        }
    };
    let periods = config.periods_per_year;
    let rf = config.risk_free_rate;
    let as_of = record.as_of_date;
    let returns: Vec<Decimal> = series.returns().map(|r| r.value).collect();
    let nav_values: Vec<Nav> = series.navs().collect();

    record.cagr_1y = record.settle("cagr_1y", cagr_over(&series, as_of, 1));
    record.cagr_3y = record.settle("cagr_3y", cagr_over(&series, as_of, 3));
    record.cagr_5y = record.settle("cagr_5y", cagr_over(&series, as_of, 5));
    record.volatility_ann = record.settle("volatility_ann", annualised_volatility(&returns, periods));
    record.max_drawdown = record.settle("max_drawdown", max_drawdown(&nav_values));
    record.sharpe = record.settle("sharpe", sharpe_ratio(&returns, rf, periods));

    record.sortino = record.settle("sortino", sortino_ratio(&returns, rf, periods)).flatten();
    if record.sortino.is_none() && !record.issues.iter().any(|i| i.scope.ends_with("/sortino")) {
        let scope = format!("{}/sortino", record.fund_id);
        record.issues.push(Issue::warning(
            scope,
            IssueKind::DivisionByZero,
            "no negative excess returns; downside deviation undefined",
        ));
    }

    let beta_alpha_result = match benchmark_series {
        Some(bench) => validate_points(bench)
            .and_then(|()| beta_alpha(navs, up_to(bench, as_of), rf, periods)),
        None => Err(AnalyticsError::InsufficientData("no benchmark series supplied".into())),
    };
    match beta_alpha_result {
        Ok((beta, alpha)) => {
            record.beta = Some(beta);
            record.alpha = Some(alpha);
        }
        Err(e) => {
            record.settle::<()>("beta", Err(e.clone()));
            record.settle::<()>("alpha", Err(e));
        }
    }
}

fn apply_precomputed(record: &mut MetricRecord, pre: &PrecomputedRisk) {
    let overrides = [
        ("sharpe", pre.sharpe, &mut record.sharpe),
        ("sortino", pre.sortino, &mut record.sortino),
        ("beta", pre.beta, &mut record.beta),
        ("alpha", pre.alpha, &mut record.alpha),
        ("volatility_ann", pre.volatility_ann, &mut record.volatility_ann),
        ("max_drawdown", pre.max_drawdown, &mut record.max_drawdown),
    ];
    let mut replaced = Vec::new();
    for (metric, value, slot) in overrides {
        if let Some(v) = value {
            *slot = Some(v);
            replaced.push(metric);
        }
    }
    for metric in replaced {
        record.clear_issues_for(metric);
    }
}
