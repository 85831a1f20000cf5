use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalyticsError;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Fund units held, bought or redeemed. Always non-negative.
pub type Units = Decimal;

/// Net asset value per unit
pub type Nav = Decimal;

/// Kind of ledger event on a fund folio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Purchase,
    #[serde(rename = "SIP")]
    Sip,
    Redemption,
    #[serde(rename = "Switch-In")]
    SwitchIn,
    #[serde(rename = "Switch-Out")]
    SwitchOut,
}

impl TransactionKind {
    /// Purchases, SIP instalments and switch-ins add units (and a lot).
    pub fn is_inflow(&self) -> bool {
        matches!(
            self,
            TransactionKind::Purchase | TransactionKind::Sip | TransactionKind::SwitchIn
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "Purchase",
            TransactionKind::Sip => "SIP",
            TransactionKind::Redemption => "Redemption",
            TransactionKind::SwitchIn => "Switch-In",
            TransactionKind::SwitchOut => "Switch-Out",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts canonical labels as well as the raw labels found on
/// consolidated account statements ("Purchase Systematic",
/// "Redemption of Units", "Systematic Switch In", ...).
impl FromStr for TransactionKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let is_switch = lower.contains("switch") || lower.contains("transfer");

        if lower == "sip" || (lower.contains("systematic") && !is_switch) {
            return Ok(TransactionKind::Sip);
        }
        if lower.contains("purchase") {
            return Ok(TransactionKind::Purchase);
        }
        if lower.contains("redemption") {
            return Ok(TransactionKind::Redemption);
        }
        // Transfer rows carry the counterpart scheme name after the direction
        if lower.contains("transfer to") {
            return Ok(TransactionKind::SwitchOut);
        }
        if lower.contains("transfer from") {
            return Ok(TransactionKind::SwitchIn);
        }
        if is_switch {
            if lower.contains("out") {
                return Ok(TransactionKind::SwitchOut);
            }
            if lower.contains("in") {
                return Ok(TransactionKind::SwitchIn);
            }
        }

        Err(AnalyticsError::InvalidInput {
            field: "kind".into(),
            reason: format!("Unrecognised transaction type '{}'", s.trim()),
        })
    }
}

/// One ledger event on a fund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub fund_id: String,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    /// Currency amount of the event, always positive
    pub amount: Money,
    /// Units bought or redeemed, always positive
    pub units: Units,
    /// NAV at which the event was executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav: Option<Nav>,
}

/// One (fund, date) price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    pub fund_id: String,
    pub date: NaiveDate,
    pub nav: Nav,
}

impl NavPoint {
    pub fn new(fund_id: impl Into<String>, date: NaiveDate, nav: Nav) -> Self {
        Self {
            fund_id: fund_id.into(),
            date,
            nav,
        }
    }
}

/// One (fund, instrument) weight observation from a portfolio disclosure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub fund_id: String,
    pub instrument_id: String,
    /// Weight as a percentage in (0, 100]
    pub weight_pct: Decimal,
    pub as_of_date: NaiveDate,
}

/// SEBI-style fund category, as far as taxation cares
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundCategory {
    Equity,
    #[serde(alias = "Hybrid", alias = "Hybrid-Equity")]
    HybridEquity,
    #[serde(alias = "Hybrid-Debt")]
    HybridDebt,
    Debt,
    #[default]
    Other,
}

/// Tax treatment bucket a category falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaxClass {
    EquityOriented,
    NonEquity,
}

impl FundCategory {
    pub fn tax_class(&self) -> TaxClass {
        match self {
            FundCategory::Equity | FundCategory::HybridEquity => TaxClass::EquityOriented,
            FundCategory::HybridDebt | FundCategory::Debt | FundCategory::Other => {
                TaxClass::NonEquity
            }
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_canonical_labels() {
        assert_eq!("Purchase".parse::<TransactionKind>().unwrap(), TransactionKind::Purchase);
        assert_eq!("SIP".parse::<TransactionKind>().unwrap(), TransactionKind::Sip);
        assert_eq!("Redemption".parse::<TransactionKind>().unwrap(), TransactionKind::Redemption);
        assert_eq!("Switch-In".parse::<TransactionKind>().unwrap(), TransactionKind::SwitchIn);
        assert_eq!("Switch-Out".parse::<TransactionKind>().unwrap(), TransactionKind::SwitchOut);
    }

    #[test]
    fn test_kind_parses_statement_labels() {
        assert_eq!(
            "Purchase Systematic".parse::<TransactionKind>().unwrap(),
            TransactionKind::Sip
        );
        assert_eq!(
            "Purchase (Continuous Offer)".parse::<TransactionKind>().unwrap(),
            TransactionKind::Purchase
        );
        assert_eq!(
            "Redemption of Units".parse::<TransactionKind>().unwrap(),
            TransactionKind::Redemption
        );
        assert_eq!(
            "Systematic Switch In".parse::<TransactionKind>().unwrap(),
            TransactionKind::SwitchIn
        );
        assert_eq!("Switch Out".parse::<TransactionKind>().unwrap(), TransactionKind::SwitchOut);
        assert_eq!(
            "Systematic Transfer To - Liquid Fund".parse::<TransactionKind>().unwrap(),
            TransactionKind::SwitchOut
        );
    }

    #[test]
    fn test_kind_rejects_administrative_rows() {
        assert!("Address Updated".parse::<TransactionKind>().is_err());
        assert!("".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_kind_serde_uses_canonical_labels() {
        let json = serde_json::to_string(&TransactionKind::SwitchOut).unwrap();
        assert_eq!(json, "\"Switch-Out\"");
        let back: TransactionKind = serde_json::from_str("\"SIP\"").unwrap();
        assert_eq!(back, TransactionKind::Sip);
    }

    #[test]
    fn test_category_tax_class() {
        assert_eq!(FundCategory::Equity.tax_class(), TaxClass::EquityOriented);
        assert_eq!(FundCategory::HybridEquity.tax_class(), TaxClass::EquityOriented);
        assert_eq!(FundCategory::Debt.tax_class(), TaxClass::NonEquity);
        assert_eq!(FundCategory::Other.tax_class(), TaxClass::NonEquity);
        let hybrid: FundCategory = serde_json::from_str("\"Hybrid\"").unwrap();
        assert_eq!(hybrid, FundCategory::HybridEquity);
    }
}
