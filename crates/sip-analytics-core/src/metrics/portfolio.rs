use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::series::returns::{carry_forward, up_to, validate_points};
use crate::status::{error_count, Issue, IssueKind, RunStatus};
use crate::time_value::{xirr, DatedFlow};
use crate::types::{Money, NavPoint, Rate};

use super::fund::{
    compute_fund_metrics_with, fill_risk_metrics, investor_cashflows, usable_transactions,
    FundMetricsInput, MetricRecord,
};

/// Identifier carried by the portfolio-level record
pub const PORTFOLIO_ID: &str = "PORTFOLIO";

/// Starting level of the synthetic portfolio index
const INDEX_BASE: Decimal = Decimal::ONE_HUNDRED;

/// Decimal places kept on each index level
const INDEX_DP: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundWeight {
    pub fund_id: String,
    pub current_value: Money,
    pub weight: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub portfolio: MetricRecord,
    pub funds: Vec<MetricRecord>,
    pub weights: Vec<FundWeight>,
    pub status: RunStatus,
}

/// Per-fund metric records, one per input in input order. Funds are
/// independent; with the `parallel` feature they are computed on the
/// rayon pool.
pub fn compute_metrics_batch(
    funds: &[FundMetricsInput],
    benchmark_series: Option<&[NavPoint]>,
    config: &EngineConfig,
    as_of_date: NaiveDate,
) -> Vec<MetricRecord> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        funds
            .par_iter()
            .map(|f| compute_fund_metrics_with(f, benchmark_series, config, as_of_date))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        funds
            .iter()
            .map(|f| compute_fund_metrics_with(f, benchmark_series, config, as_of_date))
            .collect()
    }
}

/// Value-weighted portfolio metrics.
///
/// XIRR is solved over the union of every fund's cash flows. Risk metrics
/// and CAGR are recomputed on a synthetic index whose daily return is the
/// current-value-weighted sum of fund returns over the union calendar,
/// carrying each fund's NAV forward over its gaps.
pub fn compute_portfolio_metrics(
    funds: &[FundMetricsInput],
    benchmark_series: Option<&[NavPoint]>,
    config: &EngineConfig,
    as_of_date: NaiveDate,
) -> PortfolioMetrics {
    let records = compute_metrics_batch(funds, benchmark_series, config, as_of_date);
    let mut portfolio = MetricRecord::empty(PORTFOLIO_ID, as_of_date);

    let weights = value_weights(&records);
    if weights.is_empty() {
        portfolio.issues.push(Issue::error(
            format!("{PORTFOLIO_ID}/weights"),
            &AnalyticsError::InsufficientData("no fund has a positive current value".into()),
        ));
    }

    for record in records.iter().filter(|r| r.current_value.is_none()) {
        portfolio.issues.push(Issue::warning(
            format!("{PORTFOLIO_ID}/{}", record.fund_id),
            IssueKind::InsufficientData,
            "fund excluded from portfolio totals: current value unknown",
        ));
    }

    let valued = || records.iter().filter(|r| r.current_value.is_some());
    let current: Money = valued().filter_map(|r| r.current_value).sum();
    let invested: Money = valued().filter_map(|r| r.invested_amount).sum();
    if valued().next().is_some() {
        portfolio.current_value = Some(current);
        portfolio.invested_amount = Some(invested);
        portfolio.unrealised_gain = Some(current - invested);
    }

    portfolio.xirr = portfolio_xirr(funds, &records, config, as_of_date, &mut portfolio.issues);

    if !weights.is_empty() {
        let index = portfolio_index(funds, &weights, as_of_date);
        debug!(points = index.len(), "built synthetic portfolio index");
        fill_risk_metrics(&mut portfolio, &index, benchmark_series, config);
    }

    let computed: usize =
        portfolio.computed_count() + records.iter().map(|r| r.computed_count()).sum::<usize>();
    let failed: usize =
        error_count(&portfolio.issues) + records.iter().map(|r| error_count(&r.issues)).sum::<usize>();
    let status = RunStatus::derive(computed, failed);
    info!(funds = records.len(), ?status, "portfolio metrics computed");

    PortfolioMetrics {
        portfolio,
        funds: records,
        weights,
        status,
    }
}

fn value_weights(records: &[MetricRecord]) -> Vec<FundWeight> {
    let positive: Vec<(&str, Money)> = records
        .iter()
        .filter_map(|r| {
            r.current_value
                .filter(|v| *v > Decimal::ZERO)
                .map(|v| (r.fund_id.as_str(), v))
        })
        .collect();
    let total: Money = positive.iter().map(|(_, v)| *v).sum();
    if total.is_zero() {
        return Vec::new();
    }
    positive
        .into_iter()
        .map(|(fund_id, v)| FundWeight {
            fund_id: fund_id.to_string(),
            current_value: v,
            weight: v / total,
        })
        .collect()
}

fn portfolio_xirr(
    funds: &[FundMetricsInput],
    records: &[MetricRecord],
    config: &EngineConfig,
    as_of: NaiveDate,
    issues: &mut Vec<Issue>,
) -> Option<Rate> {
    let mut flows: Vec<DatedFlow> = Vec::new();
    let mut scratch = Vec::new();

    for (input, record) in funds.iter().zip(records) {
        if record.current_value.is_none() {
            continue;
        }
        let txns = usable_transactions(&input.fund_id, &input.transactions, as_of, &mut scratch);
        flows.extend(investor_cashflows(&txns, record.current_value, as_of));
    }
    flows.sort_by_key(|(date, _)| *date);

    match xirr(&flows, &config.xirr, config.days_per_year) {
        Ok(rate) => Some(rate),
        Err(e) => {
            issues.push(Issue::error(format!("{PORTFOLIO_ID}/xirr"), &e));
            None
        }
    }
}

/// Synthetic value-weighted index starting at 100 on the latest first
/// observation among the weighted funds.
fn portfolio_index(funds: &[FundMetricsInput], weights: &[FundWeight], as_of: NaiveDate) -> Vec<NavPoint> {
    let windows: Vec<(&[NavPoint], Rate)> = weights
        .iter()
        .filter_map(|w| {
            let input = funds.iter().find(|f| f.fund_id == w.fund_id)?;
            validate_points(&input.nav_series).ok()?;
            let window = up_to(&input.nav_series, as_of);
            (!window.is_empty()).then_some((window, w.weight))
        })
        .collect();

    let Some(start) = windows.iter().map(|(pts, _)| pts[0].date).max() else {
        return Vec::new();
    };
    let calendar: Vec<NaiveDate> = windows
        .iter()
        .flat_map(|(pts, _)| pts.iter().map(|p| p.date))
        .filter(|d| *d >= start)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let carried: Vec<(Vec<Decimal>, Rate)> = windows
        .iter()
        .map(|(pts, w)| {
            let navs = carry_forward(pts, &calendar).into_iter().flatten().collect();
            (navs, *w)
        })
        .collect();

    let mut level = INDEX_BASE;
    let mut index = Vec::with_capacity(calendar.len());
    for (t, date) in calendar.iter().enumerate() {
        if t > 0 {
            let r: Decimal = carried
                .iter()
                .map(|(navs, w)| *w * (navs[t] / navs[t - 1] - Decimal::ONE))
                .sum();
            level = (level * (Decimal::ONE + r)).round_dp(INDEX_DP);
        }
        index.push(NavPoint::new(PORTFOLIO_ID, *date, level));
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Transaction, TransactionKind};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn fund(id: &str, units: Decimal, navs: &[(NaiveDate, Decimal)]) -> FundMetricsInput {
        FundMetricsInput {
            fund_id: id.into(),
            transactions: vec![Transaction {
                fund_id: id.into(),
                date: navs[0].0,
                kind: TransactionKind::Purchase,
                amount: units * navs[0].1,
                units,
                nav: Some(navs[0].1),
            }],
            nav_series: navs.iter().map(|(dt, v)| NavPoint::new(id, *dt, *v)).collect(),
            precomputed: None,
        }
    }

    #[test]
    fn test_weights_follow_current_value() {
        let funds = vec![
            fund("A", dec!(10), &[(d(2024, 1, 1), dec!(10)), (d(2024, 1, 2), dec!(30))]),
            fund("B", dec!(10), &[(d(2024, 1, 1), dec!(10)), (d(2024, 1, 2), dec!(10))]),
        ];
        let out = compute_portfolio_metrics(&funds, None, &EngineConfig::default(), d(2024, 1, 2));
        assert_eq!(out.weights.len(), 2);
        assert_eq!(out.weights[0].weight, dec!(0.75));
        assert_eq!(out.weights[1].weight, dec!(0.25));
        assert_eq!(out.portfolio.current_value, Some(dec!(400)));
        assert_eq!(out.portfolio.invested_amount, Some(dec!(200)));
    }

    #[test]
    fn test_index_carries_gaps_forward() {
        let funds = vec![
            fund("A", dec!(1), &[(d(2024, 1, 1), dec!(100)), (d(2024, 1, 3), dec!(110))]),
            fund("B", dec!(1), &[(d(2024, 1, 1), dec!(100)), (d(2024, 1, 2), dec!(100)), (d(2024, 1, 3), dec!(110))]),
        ];
        let weights = vec![
            FundWeight { fund_id: "A".into(), current_value: dec!(110), weight: dec!(0.5) },
            FundWeight { fund_id: "B".into(), current_value: dec!(110), weight: dec!(0.5) },
        ];
        let index = portfolio_index(&funds, &weights, d(2024, 1, 3));
        let levels: Vec<Decimal> = index.iter().map(|p| p.nav).collect();
        // A is flat on the 2nd (carried), both gain 10% by the 3rd
        assert_eq!(levels, vec![dec!(100), dec!(100), dec!(110)]);
    }

    #[test]
    fn test_batch_preserves_input_order() {
        let funds = vec![
            fund("Z", dec!(1), &[(d(2024, 1, 1), dec!(10)), (d(2024, 1, 2), dec!(11))]),
            fund("A", dec!(1), &[(d(2024, 1, 1), dec!(10)), (d(2024, 1, 2), dec!(11))]),
        ];
        let out = compute_metrics_batch(&funds, None, &EngineConfig::default(), d(2024, 1, 2));
        let ids: Vec<&str> = out.iter().map(|r| r.fund_id.as_str()).collect();
        assert_eq!(ids, vec!["Z", "A"]);
    }

    #[test]
    fn test_no_valued_fund_is_reported() {
        let out = compute_portfolio_metrics(&[], None, &EngineConfig::default(), d(2024, 1, 2));
        assert!(out.weights.is_empty());
        assert_eq!(out.portfolio.current_value, None);
        assert_eq!(out.status, RunStatus::Skipped);
    }
}
