use chrono::{Days, NaiveDate};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sip_analytics_core::config::EngineConfig;
use sip_analytics_core::metrics::{
    compute_fund_metrics, compute_portfolio_metrics, FundMetricsInput, MetricRecord,
};
use sip_analytics_core::time_value::xirr;
use sip_analytics_core::{IssueKind, NavPoint, RunStatus, Severity, Transaction, TransactionKind};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn purchase(fund: &str, date: NaiveDate, amount: Decimal, units: Decimal) -> Transaction {
    Transaction {
        fund_id: fund.into(),
        date,
        kind: TransactionKind::Purchase,
        amount,
        units,
        nav: Some(amount / units),
    }
}

/// Daily NAVs that rise every day by alternating steps, starting at 10
fn rising_series(fund: &str, start: NaiveDate, days: u64) -> Vec<NavPoint> {
    (0..=days)
        .map(|i| {
            let odd_step = if i % 2 == 1 { dec!(0.015) } else { Decimal::ZERO };
            let nav = dec!(10) + Decimal::from(i / 2) * dec!(0.02) + odd_step;
            NavPoint::new(fund, start + Days::new(i), nav)
        })
        .collect()
}

fn has_issue(record: &MetricRecord, metric: &str, severity: Severity) -> bool {
    let scope = format!("{}/{}", record.fund_id, metric);
    record
        .issues
        .iter()
        .any(|i| i.scope == scope && i.severity == severity)
}

// ===========================================================================
// XIRR
// ===========================================================================

#[test]
fn test_xirr_single_lump_sum_one_year() {
    // 10,000 grows to 11,500 over exactly 365 days
    let flows = vec![(d(2023, 1, 1), dec!(-10000)), (d(2024, 1, 1), dec!(11500))];
    let cfg = EngineConfig::default();
    let rate = xirr(&flows, &cfg.xirr, cfg.days_per_year).unwrap();
    assert!((rate - dec!(0.15)).abs() < dec!(0.0001), "got {rate}");
}

#[test]
fn test_xirr_all_flows_on_one_date_is_unsolvable() {
    let flows = vec![(d(2024, 1, 1), dec!(-1000)), (d(2024, 1, 1), dec!(1000))];
    let cfg = EngineConfig::default();
    let err = xirr(&flows, &cfg.xirr, cfg.days_per_year).unwrap_err();
    assert!(err.to_string().contains("XIRR unsolvable"), "got {err}");
}

#[test]
fn test_fund_bought_on_as_of_date_has_no_xirr() {
    let txns = vec![Transaction {
        fund_id: "F1".into(),
        date: d(2024, 1, 2),
        kind: TransactionKind::Sip,
        amount: dec!(1000),
        units: dec!(100),
        nav: Some(dec!(10)),
    }];
    let navs = vec![
        NavPoint::new("F1", d(2024, 1, 1), dec!(9.9)),
        NavPoint::new("F1", d(2024, 1, 2), dec!(10)),
    ];
    let rec = compute_fund_metrics("F1", &txns, &navs, None, dec!(0.065), d(2024, 1, 2));

    assert_eq!(rec.current_value, Some(dec!(1000)));
    assert_eq!(rec.xirr, None);
    assert!(rec
        .issues
        .iter()
        .any(|i| i.scope == "F1/xirr" && i.kind == IssueKind::XirrUnsolvable));
}

#[test]
fn test_fund_xirr_uses_terminal_holding_value() {
    let txns = vec![purchase("F1", d(2023, 1, 1), dec!(10000), dec!(1000))];
    let navs = vec![
        NavPoint::new("F1", d(2023, 1, 1), dec!(10)),
        NavPoint::new("F1", d(2024, 1, 1), dec!(11.5)),
    ];
    let rec = compute_fund_metrics("F1", &txns, &navs, None, dec!(0.065), d(2024, 1, 1));

    assert_eq!(rec.current_value, Some(dec!(11500)));
    assert_eq!(rec.invested_amount, Some(dec!(10000)));
    assert_eq!(rec.unrealised_gain, Some(dec!(1500)));
    let x = rec.xirr.unwrap();
    assert!((x - dec!(0.15)).abs() < dec!(0.0001), "got {x}");
    let c = rec.cagr_1y.unwrap();
    assert!((c - dec!(0.15)).abs() < dec!(0.0000001), "got {c}");
}

#[test]
fn test_xirr_unsolvable_is_scoped_to_the_metric() {
    // A zero-cost switch-in leaves only the positive terminal flow
    let txns = vec![Transaction {
        fund_id: "F1".into(),
        date: d(2023, 6, 1),
        kind: TransactionKind::SwitchIn,
        amount: Decimal::ZERO,
        units: dec!(10),
        nav: None,
    }];
    let navs = rising_series("F1", d(2023, 1, 1), 400);
    let rec = compute_fund_metrics("F1", &txns, &navs, None, dec!(0.065), d(2024, 2, 5));

    assert_eq!(rec.xirr, None);
    assert!(rec.issues.iter().any(|i| i.kind == IssueKind::XirrUnsolvable));
    // The other metrics are unaffected
    assert!(rec.volatility_ann.is_some());
    assert!(rec.cagr_1y.is_some());
    assert!(rec.is_partial());
}

// ===========================================================================
// Risk metrics
// ===========================================================================

#[test]
fn test_rising_series_has_no_drawdown_and_no_sortino() {
    let navs = rising_series("F1", d(2023, 1, 1), 400);
    let txns = vec![purchase("F1", d(2023, 1, 1), dec!(1000), dec!(100))];
    let rec = compute_fund_metrics("F1", &txns, &navs, None, dec!(0.065), d(2024, 2, 5));

    assert_eq!(rec.max_drawdown, Some(Decimal::ZERO));
    // Every daily excess return is positive: downside deviation undefined
    assert_eq!(rec.sortino, None);
    assert!(has_issue(&rec, "sortino", Severity::Warning));
    assert!(rec.sharpe.unwrap() > Decimal::ZERO);
}

#[test]
fn test_missing_history_leaves_long_horizon_cagr_absent() {
    let navs = rising_series("F1", d(2023, 1, 1), 400);
    let txns = vec![purchase("F1", d(2023, 1, 1), dec!(1000), dec!(100))];
    let rec = compute_fund_metrics("F1", &txns, &navs, None, dec!(0.065), d(2024, 2, 5));

    assert!(rec.cagr_1y.is_some());
    assert_eq!(rec.cagr_3y, None);
    assert_eq!(rec.cagr_5y, None);
    assert!(has_issue(&rec, "cagr_3y", Severity::Error));
}

#[test]
fn test_beta_against_itself_and_missing_benchmark() {
    let navs = rising_series("F1", d(2023, 1, 1), 60);
    let bench: Vec<NavPoint> = navs
        .iter()
        .map(|p| NavPoint::new("NIFTY50", p.date, p.nav * dec!(100)))
        .collect();
    let txns = vec![purchase("F1", d(2023, 1, 1), dec!(1000), dec!(100))];

    let with = compute_fund_metrics("F1", &txns, &navs, Some(&bench), dec!(0.065), d(2023, 3, 2));
    let beta = with.beta.unwrap();
    assert!((beta - Decimal::ONE).abs() < dec!(0.0000001), "got {beta}");

    let without = compute_fund_metrics("F1", &txns, &navs, None, dec!(0.065), d(2023, 3, 2));
    assert_eq!(without.beta, None);
    assert_eq!(without.alpha, None);
    assert!(has_issue(&without, "beta", Severity::Error));
    assert!(has_issue(&without, "alpha", Severity::Error));
}

#[test]
fn test_as_of_date_ignores_later_data() {
    let navs = rising_series("F1", d(2023, 1, 1), 400);
    let mut txns = vec![purchase("F1", d(2023, 1, 1), dec!(1000), dec!(100))];
    txns.push(purchase("F1", d(2024, 2, 1), dec!(5000), dec!(300)));

    let rec = compute_fund_metrics("F1", &txns, &navs, None, dec!(0.065), d(2023, 12, 31));
    assert_eq!(rec.units_held, Some(dec!(100)));
    assert_eq!(rec.latest_nav, Some(navs[364].nav));
}

// ===========================================================================
// Determinism
// ===========================================================================

#[test]
fn test_rerun_is_byte_identical() {
    let navs = rising_series("F1", d(2023, 1, 1), 400);
    let bench = rising_series("B", d(2023, 1, 1), 400);
    let txns = vec![
        purchase("F1", d(2023, 1, 1), dec!(1000), dec!(100)),
        purchase("F1", d(2023, 6, 1), dec!(2000), dec!(180)),
    ];
    let a = compute_fund_metrics("F1", &txns, &navs, Some(&bench), dec!(0.065), d(2024, 2, 5));
    let b = compute_fund_metrics("F1", &txns, &navs, Some(&bench), dec!(0.065), d(2024, 2, 5));
    assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
}

// ===========================================================================
// Portfolio
// ===========================================================================

#[test]
fn test_portfolio_is_value_weighted_and_partial_on_failures() {
    let funds = vec![
        FundMetricsInput {
            fund_id: "F1".into(),
            transactions: vec![purchase("F1", d(2023, 1, 1), dec!(1000), dec!(100))],
            nav_series: rising_series("F1", d(2023, 1, 1), 400),
            precomputed: None,
        },
        FundMetricsInput {
            fund_id: "F2".into(),
            transactions: vec![purchase("F2", d(2023, 3, 1), dec!(3000), dec!(300))],
            nav_series: rising_series("F2", d(2023, 3, 1), 300),
            precomputed: None,
        },
    ];
    let out = compute_portfolio_metrics(&funds, None, &EngineConfig::default(), d(2024, 1, 1));

    assert_eq!(out.funds.len(), 2);
    let total: Decimal = out.weights.iter().map(|w| w.weight).sum();
    assert!((total - Decimal::ONE).abs() < dec!(0.0000000001));
    assert!(out.weights[1].weight > out.weights[0].weight);

    let sum_values: Decimal = out.funds.iter().filter_map(|f| f.current_value).sum();
    assert_eq!(out.portfolio.current_value, Some(sum_values));
    assert!(out.portfolio.xirr.unwrap() > Decimal::ZERO);
    assert_eq!(out.portfolio.max_drawdown, Some(Decimal::ZERO));
    // No benchmark: beta fails everywhere, so the run is partial
    assert_eq!(out.status, RunStatus::Partial);
}
