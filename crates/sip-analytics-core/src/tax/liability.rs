use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::TaxRateTable;
use crate::error::AnalyticsError;
use crate::status::{error_count, Issue, RunStatus};
use crate::types::{FundCategory, Money, Nav, TaxClass, Transaction, Units};

use super::calendar::{CategoryLookup, FinancialYear};
use super::engine::{
    classify, group_by_fund, replay_fund, resolve_category, GainClass, TaxEvent,
};

/// Aggregated liability for one (financial year, tax class) bucket.
///
/// Gains are netted against losses of the same classification within the
/// bucket. The yearly LTCG exemption is applied here and only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialYearLiability {
    pub financial_year: FinancialYear,
    pub tax_class: TaxClass,
    pub event_count: usize,
    pub ltcg_total: Money,
    pub stcg_total: Money,
    pub exemption_applied: Money,
    pub ltcg_taxable: Money,
    pub ltcg_tax: Money,
    pub stcg_tax: Money,
    pub total_tax: Money,
}

#[derive(Default)]
struct Bucket {
    count: usize,
    ltcg: Money,
    stcg: Money,
}

pub fn summarize_liability(events: &[TaxEvent], rate_table: &TaxRateTable) -> Vec<FinancialYearLiability> {
    let mut buckets: BTreeMap<(FinancialYear, TaxClass), Bucket> = BTreeMap::new();
    for e in events {
        let b = buckets.entry((e.financial_year, e.tax_class)).or_default();
        b.count += 1;
        match e.classification {
            GainClass::Ltcg => b.ltcg += e.gain,
            GainClass::Stcg => b.stcg += e.gain,
        }
    }

    buckets
        .into_iter()
        .map(|((financial_year, tax_class), b)| {
            let rates = rate_table.rates_for(tax_class);
            let ltcg_positive = b.ltcg.max(Decimal::ZERO);
            let exemption_applied = ltcg_positive.min(rates.ltcg_exemption);
            let ltcg_taxable = ltcg_positive - exemption_applied;
            let ltcg_tax = ltcg_taxable * rates.ltcg_rate;
            let stcg_tax = b.stcg.max(Decimal::ZERO) * rates.stcg_rate;
            debug!(%financial_year, ?tax_class, %ltcg_tax, %stcg_tax, "liability bucket");
            FinancialYearLiability {
                financial_year,
                tax_class,
                event_count: b.count,
                ltcg_total: b.ltcg,
                stcg_total: b.stcg,
                exemption_applied,
                ltcg_taxable,
                ltcg_tax,
                stcg_tax,
                total_tax: ltcg_tax + stcg_tax,
            }
        })
        .collect()
}

/// Open lots of one fund valued at its current NAV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnrealisedPosition {
    pub fund_id: String,
    pub category: FundCategory,
    pub units_held: Units,
    pub cost_basis: Money,
    pub market_value: Money,
    pub long_term_gain: Money,
    pub short_term_gain: Money,
    /// Tax if everything were redeemed on the as-of date, before exemption
    pub potential_tax: Money,
    pub open_lots: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnrealisedRun {
    pub positions: Vec<UnrealisedPosition>,
    pub issues: Vec<Issue>,
    pub status: RunStatus,
}

/// Replay each fund's FIFO ledger to `as_of_date` and value what is left.
pub fn estimate_unrealised<L>(
    transactions: &[Transaction],
    current_navs: &BTreeMap<String, Nav>,
    category_lookup: &L,
    rate_table: &TaxRateTable,
    as_of_date: NaiveDate,
) -> UnrealisedRun
where
    L: CategoryLookup + ?Sized,
{
    let mut positions = Vec::new();
    let mut issues = Vec::new();

    for (fund_id, txns) in group_by_fund(transactions, as_of_date) {
        let mut ledger = replay_fund(
            fund_id,
            txns,
            resolve_category(fund_id, &category_lookup, &mut issues),
            rate_table,
        );
        issues.append(&mut ledger.issues);
        let category = ledger.category;

        let open = ledger.queue.open_lots();
        if open.is_empty() {
            continue;
        }
        let Some(nav) = current_navs.get(fund_id).copied() else {
            issues.push(Issue::error(
                fund_id,
                &AnalyticsError::InsufficientData(format!("no current NAV for {fund_id}")),
            ));
            continue;
        };

        let class = category.tax_class();
        let rates = rate_table.rates_for(class);
        let mut position = UnrealisedPosition {
            fund_id: fund_id.to_string(),
            category,
            units_held: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            market_value: Decimal::ZERO,
            long_term_gain: Decimal::ZERO,
            short_term_gain: Decimal::ZERO,
            potential_tax: Decimal::ZERO,
            open_lots: open.len(),
        };
        for lot in open {
            let cost = lot.units_remaining * lot.cost_per_unit;
            let value = lot.units_remaining * nav;
            position.units_held += lot.units_remaining;
            position.cost_basis += cost;
            position.market_value += value;
            let holding_days = (as_of_date - lot.acquisition_date).num_days();
            match classify(holding_days, class, rate_table) {
                GainClass::Ltcg => position.long_term_gain += value - cost,
                GainClass::Stcg => position.short_term_gain += value - cost,
            }
        }
        position.potential_tax = position.long_term_gain.max(Decimal::ZERO) * rates.ltcg_rate
            + position.short_term_gain.max(Decimal::ZERO) * rates.stcg_rate;
        positions.push(position);
    }

    let failed = error_count(&issues);
    let status = if failed == 0 {
        RunStatus::Success
    } else {
        RunStatus::derive(positions.len(), failed)
    };
    UnrealisedRun {
        positions,
        issues,
        status,
    }
}
