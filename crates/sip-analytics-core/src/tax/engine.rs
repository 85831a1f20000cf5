use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::TaxRateTable;
use crate::error::AnalyticsError;
use crate::status::{error_count, Issue, IssueKind, RunStatus};
use crate::types::{FundCategory, Money, Rate, TaxClass, Transaction, Units};

use super::calendar::{CategoryLookup, FinancialYear};
use super::lots::{LotQueue, LotSlice};

/// Holding-period classification of a realised gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GainClass {
    #[serde(rename = "LTCG")]
    Ltcg,
    #[serde(rename = "STCG")]
    Stcg,
}

/// Part of a redemption matched against one purchase lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotConsumption {
    pub acquisition_date: NaiveDate,
    pub units: Units,
    pub cost_per_unit: Money,
    pub cost: Money,
    pub holding_days: i64,
    pub classification: GainClass,
}

/// Realised gain of one redemption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxEvent {
    pub fund_id: String,
    pub redemption_date: NaiveDate,
    pub units_redeemed: Units,
    pub cost_basis: Money,
    pub proceeds: Money,
    pub gain: Money,
    /// Classification of the earliest consumed lot
    pub classification: GainClass,
    pub tax_rate: Rate,
    /// Provisional: `max(gain, 0) × tax_rate`, before any yearly exemption
    pub tax_amount: Money,
    pub financial_year: FinancialYear,
    pub category: FundCategory,
    pub tax_class: TaxClass,
    /// Acquisition date of the earliest consumed lot
    pub acquisition_date: NaiveDate,
    pub holding_days: i64,
    /// Consumed lots straddle the long-term threshold
    pub mixed_holding_period: bool,
    pub lots: Vec<LotConsumption>,
}

/// Output of one tax run: events that could be computed plus every
/// per-redemption failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRun {
    pub events: Vec<TaxEvent>,
    pub issues: Vec<Issue>,
    pub status: RunStatus,
}

/// State left after replaying one fund's ledger
#[derive(Debug, Clone)]
pub(crate) struct FundLedger {
    pub category: FundCategory,
    pub queue: LotQueue,
    pub events: Vec<TaxEvent>,
    pub issues: Vec<Issue>,
}

pub fn classify(holding_days: i64, class: TaxClass, table: &TaxRateTable) -> GainClass {
    if class == TaxClass::NonEquity && table.non_equity_always_short_term {
        return GainClass::Stcg;
    }
    if holding_days >= table.long_term_days {
        GainClass::Ltcg
    } else {
        GainClass::Stcg
    }
}

pub fn rate_for(class: TaxClass, gain_class: GainClass, table: &TaxRateTable) -> Rate {
    let rates = table.rates_for(class);
    match gain_class {
        GainClass::Ltcg => rates.ltcg_rate,
        GainClass::Stcg => rates.stcg_rate,
    }
}

/// Transactions dated on or before `as_of`, grouped by fund in input order
pub(crate) fn group_by_fund(
    transactions: &[Transaction],
    as_of: NaiveDate,
) -> BTreeMap<&str, Vec<&Transaction>> {
    let mut by_fund: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions.iter().filter(|tx| tx.date <= as_of) {
        by_fund.entry(tx.fund_id.as_str()).or_default().push(tx);
    }
    by_fund
}

/// Resolve a fund's category, warning when the lookup has none
pub(crate) fn resolve_category(
    fund_id: &str,
    lookup: &impl CategoryLookup,
    issues: &mut Vec<Issue>,
) -> FundCategory {
    lookup.category_of(fund_id).unwrap_or_else(|| {
        warn!(fund = fund_id, "no category for fund; taxing as Other");
        issues.push(Issue::warning(
            fund_id,
            IssueKind::UnknownCategory,
            "fund category unknown; non-equity rates applied",
        ));
        FundCategory::Other
    })
}

/// Replay one fund's transactions through its FIFO ledger.
///
/// Transactions are stably sorted by date so same-day events keep their
/// record order. A failing row is reported and skipped; the ledger is only
/// touched by rows that succeed.
pub(crate) fn replay_fund(
    fund_id: &str,
    mut txns: Vec<&Transaction>,
    category: FundCategory,
    table: &TaxRateTable,
) -> FundLedger {
    txns.sort_by_key(|tx| tx.date);
    let class = category.tax_class();
    let mut ledger = FundLedger {
        category,
        queue: LotQueue::new(),
        events: Vec::new(),
        issues: Vec::new(),
    };

    for tx in txns {
        let scope = format!("{}/{}", fund_id, tx.date);
        if let Err(e) = check_row(tx) {
            ledger.issues.push(Issue::error(scope, &e));
            continue;
        }

        if tx.kind.is_inflow() {
            ledger.queue.push(tx.date, tx.units, tx.amount / tx.units);
            continue;
        }

        let Some(slices) = ledger.queue.consume(tx.units, table.unit_tolerance) else {
            let err = AnalyticsError::OverRedemption {
                fund_id: fund_id.to_string(),
                date: tx.date,
                requested: tx.units,
                available: ledger.queue.available(),
            };
            warn!(fund = fund_id, date = %tx.date, error = %err, "skipping redemption");
            ledger.issues.push(Issue::error(scope, &err));
            continue;
        };

        let event = build_event(fund_id, tx, &slices, category, class, table);
        if event.mixed_holding_period {
            ledger.issues.push(Issue::warning(
                scope,
                IssueKind::MixedHoldingPeriod,
                format!(
                    "redemption spans long- and short-term lots; classified {:?} by earliest lot",
                    event.classification
                ),
            ));
        }
        ledger.events.push(event);
    }
    ledger
}

fn check_row(tx: &Transaction) -> Result<(), AnalyticsError> {
    if tx.amount < Decimal::ZERO || tx.units <= Decimal::ZERO {
        return Err(AnalyticsError::InvalidInput {
            field: "transaction".into(),
            reason: format!(
                "{} on {} needs positive units and non-negative amount (units {}, amount {})",
                tx.kind, tx.date, tx.units, tx.amount
            ),
        });
    }
    Ok(())
}

fn build_event(
    fund_id: &str,
    tx: &Transaction,
    slices: &[LotSlice],
    category: FundCategory,
    class: TaxClass,
    table: &TaxRateTable,
) -> TaxEvent {
    let lots: Vec<LotConsumption> = slices
        .iter()
        .map(|s| {
            let holding_days = (tx.date - s.acquisition_date).num_days();
            LotConsumption {
                acquisition_date: s.acquisition_date,
                units: s.units,
                cost_per_unit: s.cost_per_unit,
                cost: s.cost(),
                holding_days,
                classification: classify(holding_days, class, table),
            }
        })
        .collect();

    let cost_basis: Money = lots.iter().map(|l| l.cost).sum();
    let gain = tx.amount - cost_basis;
    let (acquisition_date, holding_days, classification) = lots
        .first()
        .map(|l| (l.acquisition_date, l.holding_days, l.classification))
        .unwrap_or((tx.date, 0, GainClass::Stcg));
    let mixed_holding_period = lots.iter().any(|l| l.classification != classification);
    let tax_rate = rate_for(class, classification, table);

    TaxEvent {
        fund_id: fund_id.to_string(),
        redemption_date: tx.date,
        units_redeemed: tx.units,
        cost_basis,
        proceeds: tx.amount,
        gain,
        classification,
        tax_rate,
        tax_amount: gain.max(Decimal::ZERO) * tax_rate,
        financial_year: FinancialYear::for_date(tx.date),
        category,
        tax_class: class,
        acquisition_date,
        holding_days,
        mixed_holding_period,
        lots,
    }
}

/// FIFO-match every redemption against its fund's purchase lots.
///
/// Funds are independent (and run on the rayon pool with the `parallel`
/// feature); within a fund transactions are applied strictly in date
/// order. Events come out ordered by fund id then redemption date.
pub fn compute_tax_events<L>(
    transactions: &[Transaction],
    category_lookup: &L,
    rate_table: &TaxRateTable,
    as_of_date: NaiveDate,
) -> TaxRun
where
    L: CategoryLookup + Sync + ?Sized,
{
    let groups: Vec<(&str, Vec<&Transaction>)> = group_by_fund(transactions, as_of_date).into_iter().collect();
    debug!(funds = groups.len(), %as_of_date, "computing tax events");

    let run_fund = |(fund_id, txns): (&str, Vec<&Transaction>)| {
        let mut issues = Vec::new();
        let category = resolve_category(fund_id, &category_lookup, &mut issues);
        let mut ledger = replay_fund(fund_id, txns, category, rate_table);
        issues.append(&mut ledger.issues);
        (ledger.events, issues)
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<(Vec<TaxEvent>, Vec<Issue>)> = {
        use rayon::prelude::*;
        groups.into_par_iter().map(run_fund).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<(Vec<TaxEvent>, Vec<Issue>)> = groups.into_iter().map(run_fund).collect();

    let mut events = Vec::new();
    let mut issues = Vec::new();
    for (mut fund_events, mut fund_issues) in outcomes {
        events.append(&mut fund_events);
        issues.append(&mut fund_issues);
    }

    let failed = error_count(&issues);
    let status = if failed == 0 {
        RunStatus::Success
    } else {
        RunStatus::derive(events.len(), failed)
    };
    info!(events = events.len(), failed, ?status, "tax events computed");

    TaxRun {
        events,
        issues,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionKind;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tx(date: NaiveDate, kind: TransactionKind, amount: Decimal, units: Decimal) -> Transaction {
        Transaction {
            fund_id: "F1".into(),
            date,
            kind,
            amount,
            units,
            nav: None,
        }
    }

    #[test]
    fn test_classify_threshold_is_inclusive() {
        let table = TaxRateTable::default();
        assert_eq!(classify(365, TaxClass::EquityOriented, &table), GainClass::Ltcg);
        assert_eq!(classify(364, TaxClass::EquityOriented, &table), GainClass::Stcg);
    }

    #[test]
    fn test_non_equity_always_short_term_flag() {
        let table = TaxRateTable {
            non_equity_always_short_term: true,
            ..TaxRateTable::default()
        };
        assert_eq!(classify(2000, TaxClass::NonEquity, &table), GainClass::Stcg);
        assert_eq!(classify(2000, TaxClass::EquityOriented, &table), GainClass::Ltcg);
    }

    #[test]
    fn test_same_day_order_is_stable() {
        // Purchase listed before the same-day redemption must be applied first
        let txns = vec![
            tx(d(2024, 5, 1), TransactionKind::Purchase, dec!(1000), dec!(100)),
            tx(d(2024, 5, 1), TransactionKind::Redemption, dec!(500), dec!(50)),
        ];
        let refs: Vec<&Transaction> = txns.iter().collect();
        let ledger = replay_fund("F1", refs, FundCategory::Equity, &TaxRateTable::default());
        assert!(ledger.issues.is_empty());
        assert_eq!(ledger.events.len(), 1);
        assert_eq!(ledger.events[0].gain, Decimal::ZERO);
    }

    #[test]
    fn test_zero_unit_purchase_rejected() {
        let txns = vec![tx(d(2024, 5, 1), TransactionKind::Sip, dec!(1000), Decimal::ZERO)];
        let refs: Vec<&Transaction> = txns.iter().collect();
        let ledger = replay_fund("F1", refs, FundCategory::Equity, &TaxRateTable::default());
        assert_eq!(ledger.issues.len(), 1);
        assert_eq!(ledger.issues[0].kind, IssueKind::InvalidInput);
        assert!(ledger.queue.is_empty());
    }

    #[test]
    fn test_unknown_category_warns_and_uses_non_equity() {
        let txns = vec![
            tx(d(2023, 4, 1), TransactionKind::Purchase, dec!(1000), dec!(100)),
            tx(d(2024, 5, 1), TransactionKind::Redemption, dec!(1500), dec!(100)),
        ];
        let lookup: BTreeMap<String, FundCategory> = BTreeMap::new();
        let run = compute_tax_events(&txns, &lookup, &TaxRateTable::default(), d(2025, 1, 1));
        assert_eq!(run.events[0].tax_class, TaxClass::NonEquity);
        assert_eq!(run.issues[0].kind, IssueKind::UnknownCategory);
        assert_eq!(run.status, RunStatus::Success);
    }
}
