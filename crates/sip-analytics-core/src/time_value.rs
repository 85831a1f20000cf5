use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::config::XirrSettings;
use crate::error::AnalyticsError;
use crate::types::{Money, Rate};
use crate::AnalyticsResult;

/// A cash flow on a calendar date. Investments negative, receipts positive.
pub type DatedFlow = (NaiveDate, Money);

/// Halvings allowed when a bracket end overflows decimal range
const MAX_BOUND_NUDGES: u32 = 20;

fn year_fraction(date: NaiveDate, base: NaiveDate, days_per_year: u32) -> Decimal {
    Decimal::from((date - base).num_days()) / Decimal::from(days_per_year)
}

/// XNPV and its analytic derivative with respect to the rate.
/// `None` when a discount factor leaves the representable range.
fn xnpv_with_derivative(
    rate: Rate,
    flows: &[DatedFlow],
    base: NaiveDate,
    days_per_year: u32,
) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut npv_val = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;

    for (date, amount) in flows {
        let t = year_fraction(*date, base, days_per_year);
        let discount = one_plus_r.checked_powd(t)?;
        if discount.is_zero() {
            return None;
        }
        npv_val = npv_val.checked_add(amount.checked_div(discount)?)?;
        // d/dr [a (1+r)^-t] = -t a (1+r)^-(t+1)
        let term = t.checked_mul(*amount)?.checked_div(one_plus_r.checked_mul(discount)?)?;
        dnpv = dnpv.checked_sub(term)?;
    }

    Some((npv_val, dnpv))
}

fn earliest_date(flows: &[DatedFlow]) -> Option<NaiveDate> {
    flows.iter().map(|(d, _)| *d).min()
}

/// Net present value of irregularly dated cash flows, discounted to the
/// earliest flow date.
pub fn xnpv(rate: Rate, flows: &[DatedFlow], days_per_year: u32) -> AnalyticsResult<Money> {
    if rate <= dec!(-1) {
        return Err(AnalyticsError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    let Some(base) = earliest_date(flows) else {
        return Ok(Decimal::ZERO);
    };
    xnpv_with_derivative(rate, flows, base, days_per_year)
        .map(|(v, _)| v)
        .ok_or_else(|| AnalyticsError::DivisionByZero {
            context: format!("XNPV discount factor at rate {rate}"),
        })
}

/// Extended IRR for irregular cash flow dates.
///
/// Newton-Raphson from `settings.guess`; if that fails to converge within
/// the iteration cap, or steps outside `[lower_bound, upper_bound]`, the
/// root is bracketed and found by bisection instead. A cash flow set with
/// no sign change has no root and yields `XirrUnsolvable`.
pub fn xirr(
    flows: &[DatedFlow],
    settings: &XirrSettings,
    days_per_year: u32,
) -> AnalyticsResult<Rate> {
    if flows.len() < 2 {
        return Err(AnalyticsError::InsufficientData(
            "XIRR requires at least 2 cash flows".into(),
        ));
    }

    let has_outflow = flows.iter().any(|(_, a)| *a < Decimal::ZERO);
    let has_inflow = flows.iter().any(|(_, a)| *a > Decimal::ZERO);
    if !(has_outflow && has_inflow) {
        return Err(AnalyticsError::XirrUnsolvable(
            "cash flows need at least one negative and one positive amount".into(),
        ));
    }

    let base = earliest_date(flows).unwrap_or(flows[0].0);
    let latest = flows.iter().map(|(d, _)| *d).max().unwrap_or(base);
    if latest == base {
        // Every discount factor is 1: XNPV is the same for all rates
        return Err(AnalyticsError::XirrUnsolvable(format!(
            "all cash flows dated {base}; no elapsed time to annualise"
        )));
    }

    if let Some(rate) = newton(flows, base, settings, days_per_year) {
        return Ok(rate);
    }

    debug!("XIRR Newton iteration did not converge, falling back to bisection");
    bisection(flows, base, settings, days_per_year)
}

fn newton(
    flows: &[DatedFlow],
    base: NaiveDate,
    settings: &XirrSettings,
    days_per_year: u32,
) -> Option<Rate> {
    let mut rate = settings.guess;

    for _ in 0..settings.max_newton_iterations {
        let (npv_val, dnpv) = xnpv_with_derivative(rate, flows, base, days_per_year)?;

        if npv_val.abs() < settings.tolerance {
            return Some(rate);
        }
        if dnpv.is_zero() {
            return None;
        }

        let next = rate - npv_val.checked_div(dnpv)?;
        if next <= settings.lower_bound || next >= settings.upper_bound {
            return None;
        }
        if (next - rate).abs() < settings.tolerance {
            return Some(next);
        }
        rate = next;
    }

    None
}

/// Pull a bracket end toward zero until XNPV is representable there.
fn evaluable_bound(
    bound: Rate,
    flows: &[DatedFlow],
    base: NaiveDate,
    days_per_year: u32,
) -> Option<(Rate, Decimal)> {
    let mut rate = bound;
    for _ in 0..=MAX_BOUND_NUDGES {
        if let Some((v, _)) = xnpv_with_derivative(rate, flows, base, days_per_year) {
            return Some((rate, v));
        }
        rate /= dec!(2);
    }
    None
}

fn bisection(
    flows: &[DatedFlow],
    base: NaiveDate,
    settings: &XirrSettings,
    days_per_year: u32,
) -> AnalyticsResult<Rate> {
    let unrepresentable = |bound: Rate| {
        AnalyticsError::XirrUnsolvable(format!("XNPV not representable near bracket end {bound}"))
    };
    let (mut lo, mut f_lo) = evaluable_bound(settings.lower_bound, flows, base, days_per_year)
        .ok_or_else(|| unrepresentable(settings.lower_bound))?;
    let (mut hi, f_hi) = evaluable_bound(settings.upper_bound, flows, base, days_per_year)
        .ok_or_else(|| unrepresentable(settings.upper_bound))?;

    if f_lo.is_zero() {
        return Ok(lo);
    }
    if f_hi.is_zero() {
        return Ok(hi);
    }
    if f_lo.is_sign_negative() == f_hi.is_sign_negative() {
        warn!(lo = %lo, hi = %hi, "XIRR bracket has no sign change");
        return Err(AnalyticsError::XirrUnsolvable(format!(
            "no sign change in XNPV over [{lo}, {hi}]"
        )));
    }

    let mut f_mid = Decimal::ZERO;
    for _ in 0..settings.max_bisection_iterations {
        let mid = (lo + hi) / dec!(2);
        f_mid = xnpv_with_derivative(mid, flows, base, days_per_year)
            .map(|(v, _)| v)
            .ok_or_else(|| unrepresentable(mid))?;

        if f_mid.abs() < settings.tolerance || (hi - lo) / dec!(2) < settings.tolerance {
            return Ok(mid);
        }

        if f_mid.is_sign_negative() == f_lo.is_sign_negative() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(AnalyticsError::ConvergenceFailure {
        function: "XIRR bisection".into(),
        iterations: settings.max_bisection_iterations,
        last_delta: f_mid,
    })
}
