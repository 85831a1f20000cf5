use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::OverlapThresholds;
use crate::status::{Issue, IssueKind};
use crate::types::HoldingRecord;

/// Decimal places kept on Jaccard and weighted overlap
const OVERLAP_DP: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapFlag {
    #[default]
    None,
    Warning,
    Critical,
}

/// Similarity between two funds' latest disclosed portfolios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapPair {
    pub fund_a: String,
    pub fund_b: String,
    /// The older of the two disclosure dates
    pub as_of_date: NaiveDate,
    pub common_count: usize,
    pub jaccard: Decimal,
    pub weighted_overlap_pct: Decimal,
    pub flag: OverlapFlag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapReport {
    pub pairs: Vec<OverlapPair>,
    pub issues: Vec<Issue>,
}

/// A fund's holdings at its most recent disclosure date, one weight per
/// instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Disclosure {
    pub fund_id: String,
    pub as_of_date: NaiveDate,
    pub weights: BTreeMap<String, Decimal>,
}

/// Group flat holding rows by fund id
pub fn group_holdings(records: &[HoldingRecord]) -> BTreeMap<String, Vec<HoldingRecord>> {
    let mut grouped: BTreeMap<String, Vec<HoldingRecord>> = BTreeMap::new();
    for r in records {
        grouped.entry(r.fund_id.clone()).or_default().push(r.clone());
    }
    grouped
}

/// Latest disclosure of a fund. Rows on that date with weight outside
/// (0, 100] are dropped (negative or >100 with a warning); repeated rows
/// for one instrument are summed. `None` when the fund has no rows.
pub fn latest_disclosure(
    fund_id: &str,
    records: &[HoldingRecord],
    issues: &mut Vec<Issue>,
) -> Option<Disclosure> {
    let as_of_date = records.iter().map(|r| r.as_of_date).max()?;
    let mut weights: BTreeMap<String, Decimal> = BTreeMap::new();

    for r in records.iter().filter(|r| r.as_of_date == as_of_date) {
        if r.weight_pct.is_zero() {
            continue;
        }
        if r.weight_pct < Decimal::ZERO || r.weight_pct > Decimal::ONE_HUNDRED {
            warn!(fund = fund_id, instrument = %r.instrument_id, weight = %r.weight_pct, "dropping holding with out-of-range weight");
            issues.push(Issue::warning(
                format!("{}/{}", fund_id, r.instrument_id),
                IssueKind::InvalidInput,
                format!("weight {} outside (0, 100]; row dropped", r.weight_pct),
            ));
            continue;
        }
        *weights.entry(r.instrument_id.clone()).or_insert(Decimal::ZERO) += r.weight_pct;
    }

    Some(Disclosure {
        fund_id: fund_id.to_string(),
        as_of_date,
        weights,
    })
}

/// Jaccard index of two instrument sets; 0 when both are empty
pub fn jaccard(a: &BTreeMap<String, Decimal>, b: &BTreeMap<String, Decimal>) -> Decimal {
    let common = a.keys().filter(|k| b.contains_key(*k)).count();
    let union = a.len() + b.len() - common;
    if union == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(common) / Decimal::from(union)
}

/// Σ min(weight_a, weight_b) over common instruments, capped at 100
pub fn weighted_overlap(a: &BTreeMap<String, Decimal>, b: &BTreeMap<String, Decimal>) -> Decimal {
    let sum: Decimal = a
        .iter()
        .filter_map(|(k, wa)| b.get(k).map(|wb| (*wa).min(*wb)))
        .sum();
    sum.min(Decimal::ONE_HUNDRED)
}

pub fn classify_overlap(weighted_pct: Decimal, thresholds: &OverlapThresholds) -> OverlapFlag {
    if weighted_pct >= thresholds.critical_pct {
        OverlapFlag::Critical
    } else if weighted_pct >= thresholds.warning_pct {
        OverlapFlag::Warning
    } else {
        OverlapFlag::None
    }
}

fn pair(a: &Disclosure, b: &Disclosure, thresholds: &OverlapThresholds) -> OverlapPair {
    let common_count = a.weights.keys().filter(|k| b.weights.contains_key(*k)).count();
    let weighted_overlap_pct = weighted_overlap(&a.weights, &b.weights).round_dp(OVERLAP_DP);
    OverlapPair {
        fund_a: a.fund_id.clone(),
        fund_b: b.fund_id.clone(),
        as_of_date: a.as_of_date.min(b.as_of_date),
        common_count,
        jaccard: jaccard(&a.weights, &b.weights).round_dp(OVERLAP_DP),
        weighted_overlap_pct,
        flag: classify_overlap(weighted_overlap_pct, thresholds),
    }
}

/// Pairwise overlap with every row-level warning collected.
///
/// One pair per unordered combination of funds, `fund_a < fund_b`, in
/// lexicographic order. Funds without any holding rows are left out.
pub fn compute_overlap_report(
    holdings_by_fund: &BTreeMap<String, Vec<HoldingRecord>>,
    thresholds: &OverlapThresholds,
) -> OverlapReport {
    let mut issues = Vec::new();
    let mut disclosures = Vec::with_capacity(holdings_by_fund.len());
    for (fund_id, records) in holdings_by_fund {
        match latest_disclosure(fund_id, records, &mut issues) {
            Some(d) => disclosures.push(d),
            None => issues.push(Issue::warning(
                fund_id.as_str(),
                IssueKind::InsufficientData,
                "no holding disclosure; fund excluded from overlap",
            )),
        }
    }
    debug!(funds = disclosures.len(), "computing pairwise overlap");

    let combos: Vec<(usize, usize)> = (0..disclosures.len())
        .flat_map(|i| (i + 1..disclosures.len()).map(move |j| (i, j)))
        .collect();

    #[cfg(feature = "parallel")]
    let pairs: Vec<OverlapPair> = {
        use rayon::prelude::*;
        combos
            .par_iter()
            .map(|&(i, j)| pair(&disclosures[i], &disclosures[j], thresholds))
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let pairs: Vec<OverlapPair> = combos
        .iter()
        .map(|&(i, j)| pair(&disclosures[i], &disclosures[j], thresholds))
        .collect();

    let flagged = pairs.iter().filter(|p| p.flag != OverlapFlag::None).count();
    info!(pairs = pairs.len(), flagged, "overlap computed");
    OverlapReport { pairs, issues }
}

pub fn compute_overlap_with(
    holdings_by_fund: &BTreeMap<String, Vec<HoldingRecord>>,
    thresholds: &OverlapThresholds,
) -> Vec<OverlapPair> {
    compute_overlap_report(holdings_by_fund, thresholds).pairs
}

/// Pairwise overlap with the default warning/critical cutoffs
pub fn compute_overlap(holdings_by_fund: &BTreeMap<String, Vec<HoldingRecord>>) -> Vec<OverlapPair> {
    compute_overlap_with(holdings_by_fund, &OverlapThresholds::default())
}
