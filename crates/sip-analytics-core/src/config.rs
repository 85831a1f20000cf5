use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::types::{Money, Rate, TaxClass, Units};
use crate::AnalyticsResult;

/// Engine-wide configuration. Every field has a default so a partial
/// YAML/JSON document only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Annualised risk-free rate used by Sharpe, Sortino and Alpha
    pub risk_free_rate: Rate,
    /// Trading days per year for annualisation
    pub periods_per_year: u32,
    /// Day-count denominator for XIRR year fractions
    pub days_per_year: u32,
    pub xirr: XirrSettings,
    pub tax: TaxRateTable,
    pub overlap: OverlapThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: dec!(0.065),
            periods_per_year: 252,
            days_per_year: 365,
            xirr: XirrSettings::default(),
            tax: TaxRateTable::default(),
            overlap: OverlapThresholds::default(),
        }
    }
}

/// Newton-Raphson / bisection controls for XIRR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XirrSettings {
    pub guess: Rate,
    pub max_newton_iterations: u32,
    pub tolerance: Decimal,
    pub lower_bound: Rate,
    pub upper_bound: Rate,
    pub max_bisection_iterations: u32,
}

impl Default for XirrSettings {
    fn default() -> Self {
        Self {
            guess: dec!(0.1),
            max_newton_iterations: 100,
            tolerance: dec!(0.0000001),
            lower_bound: dec!(-0.99),
            upper_bound: dec!(10.0),
            max_bisection_iterations: 200,
        }
    }
}

/// Rates for one tax class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRates {
    pub stcg_rate: Rate,
    pub ltcg_rate: Rate,
    /// Long-term gains exempt per financial year, applied on aggregation
    pub ltcg_exemption: Money,
}

/// Capital-gains rate table keyed by tax class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxRateTable {
    pub equity: ClassRates,
    pub non_equity: ClassRates,
    /// Holding period (days) at or above which a gain is long-term
    pub long_term_days: i64,
    /// Treat every non-equity redemption as short-term regardless of holding period
    pub non_equity_always_short_term: bool,
    /// Residual units below this are absorbed at redemption rather than
    /// reported as an over-redemption
    pub unit_tolerance: Units,
}

impl Default for TaxRateTable {
    fn default() -> Self {
        Self {
            equity: ClassRates {
                stcg_rate: dec!(0.20),
                ltcg_rate: dec!(0.125),
                ltcg_exemption: dec!(125000),
            },
            non_equity: ClassRates {
                stcg_rate: dec!(0.30),
                ltcg_rate: dec!(0.30),
                ltcg_exemption: Decimal::ZERO,
            },
            long_term_days: 365,
            non_equity_always_short_term: false,
            unit_tolerance: dec!(0.001),
        }
    }
}

impl TaxRateTable {
    pub fn rates_for(&self, class: TaxClass) -> &ClassRates {
        match class {
            TaxClass::EquityOriented => &self.equity,
            TaxClass::NonEquity => &self.non_equity,
        }
    }
}

/// Weighted-overlap cutoffs (percent) for flagging fund pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapThresholds {
    pub warning_pct: Decimal,
    pub critical_pct: Decimal,
}

impl Default for OverlapThresholds {
    fn default() -> Self {
        Self {
            warning_pct: dec!(30),
            critical_pct: dec!(50),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.risk_free_rate <= dec!(-1) || self.risk_free_rate >= Decimal::ONE {
            return Err(AnalyticsError::Config(
                "risk_free_rate must be a decimal rate in (-1, 1)".into(),
            ));
        }
        if self.periods_per_year == 0 || self.days_per_year == 0 {
            return Err(AnalyticsError::Config(
                "periods_per_year and days_per_year must be positive".into(),
            ));
        }
        if self.xirr.lower_bound <= dec!(-1) || self.xirr.lower_bound >= self.xirr.upper_bound {
            return Err(AnalyticsError::Config(
                "XIRR bracket must satisfy -1 < lower_bound < upper_bound".into(),
            ));
        }
        if self.xirr.tolerance <= Decimal::ZERO {
            return Err(AnalyticsError::Config("XIRR tolerance must be positive".into()));
        }
        for (name, rates) in [("equity", &self.tax.equity), ("non_equity", &self.tax.non_equity)] {
            let in_range = |r: Rate| r >= Decimal::ZERO && r <= Decimal::ONE;
            if !in_range(rates.stcg_rate) || !in_range(rates.ltcg_rate) {
                return Err(AnalyticsError::Config(format!(
                    "{name} tax rates must be between 0 and 1"
                )));
            }
            if rates.ltcg_exemption < Decimal::ZERO {
                return Err(AnalyticsError::Config(format!(
                    "{name} LTCG exemption cannot be negative"
                )));
            }
        }
        if self.tax.long_term_days <= 0 {
            return Err(AnalyticsError::Config("long_term_days must be positive".into()));
        }
        if self.tax.unit_tolerance < Decimal::ZERO {
            return Err(AnalyticsError::Config("unit_tolerance cannot be negative".into()));
        }
        let o = &self.overlap;
        if o.warning_pct < Decimal::ZERO || o.critical_pct > dec!(100) || o.warning_pct > o.critical_pct {
            return Err(AnalyticsError::Config(
                "overlap thresholds must satisfy 0 <= warning_pct <= critical_pct <= 100".into(),
            ));
        }
        Ok(())
    }
}
