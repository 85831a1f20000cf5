use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sip_analytics_core::config::OverlapThresholds;
use sip_analytics_core::overlap::{
    compute_overlap, compute_overlap_report, compute_overlap_with, group_holdings, OverlapFlag,
};
use sip_analytics_core::HoldingRecord;
use std::collections::BTreeMap;

fn disclosure_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()
}

fn holdings(fund: &str, rows: &[(&str, Decimal)]) -> Vec<HoldingRecord> {
    rows.iter()
        .map(|(isin, w)| HoldingRecord {
            fund_id: fund.into(),
            instrument_id: (*isin).into(),
            weight_pct: *w,
            as_of_date: disclosure_date(),
        })
        .collect()
}

fn two_fund_sample() -> Vec<HoldingRecord> {
    // A holds 1,2,3; B holds 2,3,4
    let mut rows = holdings("A", &[("ISIN001", dec!(30)), ("ISIN002", dec!(40)), ("ISIN003", dec!(30))]);
    rows.extend(holdings("B", &[("ISIN002", dec!(20)), ("ISIN003", dec!(50)), ("ISIN004", dec!(30))]));
    rows
}

#[test]
fn test_jaccard_and_weighted_overlap() {
    let pairs = compute_overlap(&group_holdings(&two_fund_sample()));

    assert_eq!(pairs.len(), 1);
    let p = &pairs[0];
    // 2 common out of 4 distinct
    assert_eq!(p.jaccard, dec!(0.5));
    assert_eq!(p.common_count, 2);
    // min(40, 20) + min(30, 50)
    assert_eq!(p.weighted_overlap_pct, dec!(50));
    assert_eq!(p.flag, OverlapFlag::Critical);
}

#[test]
fn test_identical_sets_have_jaccard_one_regardless_of_weights() {
    let mut rows = holdings("A", &[("X", dec!(60)), ("Y", dec!(40))]);
    rows.extend(holdings("B", &[("X", dec!(10)), ("Y", dec!(90))]));
    let p = &compute_overlap(&group_holdings(&rows))[0];
    assert_eq!(p.jaccard, Decimal::ONE);
    assert_eq!(p.weighted_overlap_pct, dec!(50));
}

#[test]
fn test_disjoint_sets_are_zero() {
    let mut rows = holdings("A", &[("X", dec!(60))]);
    rows.extend(holdings("B", &[("Y", dec!(40))]));
    let p = &compute_overlap(&group_holdings(&rows))[0];
    assert_eq!(p.jaccard, Decimal::ZERO);
    assert_eq!(p.weighted_overlap_pct, Decimal::ZERO);
    assert_eq!(p.common_count, 0);
    assert_eq!(p.flag, OverlapFlag::None);
}

#[test]
fn test_both_empty_sets_give_zero_not_nan() {
    // Funds that disclosed only zero-weight rows
    let mut rows = holdings("A", &[("X", Decimal::ZERO)]);
    rows.extend(holdings("B", &[("Y", Decimal::ZERO)]));
    let p = &compute_overlap(&group_holdings(&rows))[0];
    assert_eq!(p.jaccard, Decimal::ZERO);
}

#[test]
fn test_one_pair_per_combination() {
    let mut rows = Vec::new();
    for fund in ["D", "A", "C", "B"] {
        rows.extend(holdings(fund, &[("X", dec!(10))]));
    }
    let pairs = compute_overlap(&group_holdings(&rows));
    assert_eq!(pairs.len(), 6);
    assert!(pairs.iter().all(|p| p.fund_a < p.fund_b));
    let ids: Vec<(&str, &str)> = pairs.iter().map(|p| (p.fund_a.as_str(), p.fund_b.as_str())).collect();
    assert_eq!(ids[0], ("A", "B"));
    assert_eq!(ids[5], ("C", "D"));
}

#[test]
fn test_jaccard_rounded_to_four_places() {
    // 1 common out of 3 distinct
    let mut rows = holdings("A", &[("X", dec!(10)), ("Y", dec!(10))]);
    rows.extend(holdings("B", &[("X", dec!(10)), ("Z", dec!(10))]));
    let p = &compute_overlap(&group_holdings(&rows))[0];
    assert_eq!(p.jaccard, dec!(0.3333));
}

#[test]
fn test_thresholds_only_change_the_flag() {
    let grouped = group_holdings(&two_fund_sample());
    let strict = OverlapThresholds {
        warning_pct: dec!(60),
        critical_pct: dec!(80),
    };
    let default_pair = &compute_overlap(&grouped)[0];
    let strict_pair = &compute_overlap_with(&grouped, &strict)[0];
    assert_eq!(default_pair.weighted_overlap_pct, strict_pair.weighted_overlap_pct);
    assert_eq!(default_pair.jaccard, strict_pair.jaccard);
    assert_eq!(strict_pair.flag, OverlapFlag::None);
}

#[test]
fn test_empty_input_returns_no_pairs() {
    assert!(compute_overlap(&BTreeMap::new()).is_empty());
    assert!(compute_overlap(&group_holdings(&holdings("A", &[("X", dec!(10))]))).is_empty());
}

#[test]
fn test_invalid_weights_reported() {
    let mut rows = holdings("A", &[("X", dec!(-5)), ("Y", dec!(10))]);
    rows.extend(holdings("B", &[("Y", dec!(10))]));
    let report = compute_overlap_report(&group_holdings(&rows), &OverlapThresholds::default());
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.pairs[0].jaccard, Decimal::ONE);
}
