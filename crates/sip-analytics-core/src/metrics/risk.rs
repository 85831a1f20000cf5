use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use crate::error::AnalyticsError;
use crate::series::returns::{inner_join, NavSeries};
use crate::series::stats::{covariance, mean, sample_std_dev, sample_variance, sqrt_decimal};
use crate::types::{Nav, NavPoint, Rate};
use crate::AnalyticsResult;

/// Compound annual growth rate: `(nav_end / nav_start)^(1/years) - 1`
pub fn compute_cagr(nav_start: Nav, nav_end: Nav, years: Decimal) -> AnalyticsResult<Rate> {
    if years <= Decimal::ZERO {
        return Err(AnalyticsError::InvalidInput {
            field: "years".into(),
            reason: "CAGR horizon must be positive".into(),
        });
    }
    if nav_start <= Decimal::ZERO {
        return Err(AnalyticsError::InvalidInput {
            field: "nav_start".into(),
            reason: "Starting NAV must be positive".into(),
        });
    }
    let growth = nav_end / nav_start;
    let annualised = growth
        .checked_powd(Decimal::ONE / years)
        .ok_or_else(|| AnalyticsError::ConvergenceFailure {
            function: "CAGR power".into(),
            iterations: 0,
            last_delta: growth,
        })?;
    Ok(annualised - Decimal::ONE)
}

/// CAGR over the `years` ending at the latest observation on or before
/// `as_of`, starting from the observation closest to `as_of - years`.
/// Not computable when the series starts after that cutoff.
pub fn cagr_over(series: &NavSeries<'_>, as_of: NaiveDate, years: u32) -> AnalyticsResult<Rate> {
    let cutoff = as_of
        .checked_sub_months(Months::new(12 * years))
        .ok_or_else(|| AnalyticsError::InvalidInput {
            field: "as_of_date".into(),
            reason: format!("cannot step back {years} years from {as_of}"),
        })?;

    if series.first().date > cutoff {
        return Err(AnalyticsError::InsufficientData(format!(
            "no NAV on or before {cutoff} for {years}y CAGR (history starts {})",
            series.first().date
        )));
    }

    let end = series
        .nav_on_or_before(as_of)
        .ok_or_else(|| AnalyticsError::InsufficientData(format!("no NAV on or before {as_of}")))?;
    let start = series.closest_to(cutoff);

    compute_cagr(start.nav, end.nav, Decimal::from(years))
}

/// Daily excess returns over the per-period risk-free rate
pub fn excess_returns(returns: &[Decimal], risk_free_rate: Rate, periods_per_year: u32) -> Vec<Decimal> {
    let rf_per_period = risk_free_rate / Decimal::from(periods_per_year);
    returns.iter().map(|r| r - rf_per_period).collect()
}

fn require_returns(returns: &[Decimal], metric: &str) -> AnalyticsResult<()> {
    if returns.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "{metric} needs at least 2 return observations, got {}",
            returns.len()
        )));
    }
    Ok(())
}

/// Sharpe = mean(excess) / stdev(excess) × √periods
pub fn sharpe_ratio(
    returns: &[Decimal],
    risk_free_rate: Rate,
    periods_per_year: u32,
) -> AnalyticsResult<Decimal> {
    require_returns(returns, "Sharpe")?;
    let excess = excess_returns(returns, risk_free_rate, periods_per_year);
    let sd = sample_std_dev(&excess);
    if sd.is_zero() {
        return Err(AnalyticsError::DivisionByZero {
            context: "Sharpe ratio (zero standard deviation of excess returns)".into(),
        });
    }
    Ok(mean(&excess) / sd * sqrt_decimal(Decimal::from(periods_per_year)))
}

/// Sortino = mean(excess) / downside deviation × √periods, where the
/// downside deviation is the root mean square of the negative excess
/// returns only. `Ok(None)` when no excess return is negative.
pub fn sortino_ratio(
    returns: &[Decimal],
    risk_free_rate: Rate,
    periods_per_year: u32,
) -> AnalyticsResult<Option<Decimal>> {
    require_returns(returns, "Sortino")?;
    let excess = excess_returns(returns, risk_free_rate, periods_per_year);
    let downside: Vec<Decimal> = excess.iter().copied().filter(|e| *e < Decimal::ZERO).collect();
    if downside.is_empty() {
        return Ok(None);
    }
    let sum_sq: Decimal = downside.iter().map(|e| e * e).sum();
    let downside_dev = sqrt_decimal(sum_sq / Decimal::from(downside.len() as i64));
    if downside_dev.is_zero() {
        return Ok(None);
    }
    Ok(Some(
        mean(&excess) / downside_dev * sqrt_decimal(Decimal::from(periods_per_year)),
    ))
}

/// Beta and Jensen's alpha against a benchmark, over the dates both
/// series observed.
///
/// Beta = cov(fund, bench) / var(bench) on daily returns of the joined
/// series; Alpha = Rp − (Rf + β (Rb − Rf)) with mean daily returns
/// annualised arithmetically.
pub fn beta_alpha(
    fund: &[NavPoint],
    benchmark: &[NavPoint],
    risk_free_rate: Rate,
    periods_per_year: u32,
) -> AnalyticsResult<(Decimal, Rate)> {
    let joined = inner_join(fund, benchmark);
    if joined.len() < 3 {
        return Err(AnalyticsError::InsufficientData(format!(
            "{} overlapping fund/benchmark dates; at least 3 required",
            joined.len()
        )));
    }

    let (fund_returns, bench_returns): (Vec<Decimal>, Vec<Decimal>) = joined
        .windows(2)
        .map(|w| {
            (
                w[1].1 / w[0].1 - Decimal::ONE,
                w[1].2 / w[0].2 - Decimal::ONE,
            )
        })
        .unzip();

    let fund_mean = mean(&fund_returns);
    let bench_mean = mean(&bench_returns);
    let bench_var = sample_variance(&bench_returns, bench_mean);
    if bench_var.is_zero() {
        return Err(AnalyticsError::DivisionByZero {
            context: "Beta (zero benchmark variance)".into(),
        });
    }
    let beta = covariance(&fund_returns, &bench_returns, fund_mean, bench_mean) / bench_var;

    let periods = Decimal::from(periods_per_year);
    let fund_annual = fund_mean * periods;
    let bench_annual = bench_mean * periods;
    let alpha = fund_annual - (risk_free_rate + beta * (bench_annual - risk_free_rate));

    Ok((beta, alpha))
}

/// Most negative `(nav_t − running_max_t) / running_max_t`; zero for a
/// series that never falls.
pub fn max_drawdown(navs: &[Nav]) -> AnalyticsResult<Rate> {
    if navs.is_empty() {
        return Err(AnalyticsError::InsufficientData(
            "max drawdown needs at least one NAV".into(),
        ));
    }
    let mut peak = navs[0];
    let mut worst = Decimal::ZERO;

    for nav in navs {
        if *nav > peak {
            peak = *nav;
        }
        if !peak.is_zero() {
            let dd = (*nav - peak) / peak;
            if dd < worst {
                worst = dd;
            }
        }
    }
    Ok(worst)
}

/// stdev(daily returns) × √periods
pub fn annualised_volatility(returns: &[Decimal], periods_per_year: u32) -> AnalyticsResult<Rate> {
    require_returns(returns, "Volatility")?;
    Ok(sample_std_dev(returns) * sqrt_decimal(Decimal::from(periods_per_year)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_cagr_doubling_over_five_years() {
        let cagr = compute_cagr(dec!(100), dec!(200), dec!(5)).unwrap();
        assert!((cagr - dec!(0.1487)).abs() < dec!(0.0001), "got {cagr}");
    }

    #[test]
    fn test_cagr_rejects_zero_years() {
        assert!(compute_cagr(dec!(100), dec!(200), Decimal::ZERO).is_err());
        assert!(compute_cagr(Decimal::ZERO, dec!(200), dec!(1)).is_err());
    }

    #[test]
    fn test_cagr_over_needs_history_before_cutoff() {
        let pts = vec![
            NavPoint::new("F", d(2024, 3, 1), dec!(10)),
            NavPoint::new("F", d(2025, 1, 1), dec!(12)),
        ];
        let series = NavSeries::new(&pts).unwrap();
        let err = cagr_over(&series, d(2025, 1, 1), 1).unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData(_)));
    }

    #[test]
    fn test_cagr_over_one_year() {
        let pts = vec![
            NavPoint::new("F", d(2023, 12, 29), dec!(10)),
            NavPoint::new("F", d(2024, 6, 1), dec!(11)),
            NavPoint::new("F", d(2025, 1, 1), dec!(12)),
        ];
        let series = NavSeries::new(&pts).unwrap();
        let cagr = cagr_over(&series, d(2025, 1, 1), 1).unwrap();
        assert!((cagr - dec!(0.2)).abs() < dec!(0.0000001), "got {cagr}");
    }

    #[test]
    fn test_sharpe_positive_for_noisy_gains() {
        let returns: Vec<Decimal> = (0..252)
            .map(|i| if i % 2 == 0 { dec!(0.002) } else { dec!(0.0005) })
            .collect();
        assert!(sharpe_ratio(&returns, Decimal::ZERO, 252).unwrap() > Decimal::ZERO);
    }

    #[test]
    fn test_sharpe_zero_std_is_not_coerced() {
        let returns = vec![dec!(0.001); 252];
        assert!(matches!(
            sharpe_ratio(&returns, Decimal::ZERO, 252),
            Err(AnalyticsError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_sortino_absent_without_downside() {
        let returns = vec![dec!(0.005); 252];
        assert_eq!(sortino_ratio(&returns, Decimal::ZERO, 252).unwrap(), None);
    }

    #[test]
    fn test_sortino_present_with_downside() {
        let returns = vec![dec!(0.01), dec!(-0.01), dec!(0.02), dec!(-0.005)];
        let s = sortino_ratio(&returns, Decimal::ZERO, 252).unwrap();
        assert!(s.unwrap() > Decimal::ZERO);
    }

    #[test]
    fn test_beta_of_identical_series_is_one() {
        let navs = [dec!(100), dec!(101), dec!(99.99), dec!(101.9898), dec!(99.949)];
        let fund: Vec<NavPoint> = navs
            .iter()
            .enumerate()
            .map(|(i, v)| NavPoint::new("F", d(2024, 1, 1 + i as u32), *v))
            .collect();
        let bench: Vec<NavPoint> = fund
            .iter()
            .map(|p| NavPoint::new("NIFTY", p.date, p.nav))
            .collect();
        let (beta, alpha) = beta_alpha(&fund, &bench, Decimal::ZERO, 252).unwrap();
        assert_eq!(beta, Decimal::ONE);
        assert!(alpha.abs() < dec!(0.0000001));
    }

    #[test]
    fn test_beta_uses_overlapping_dates_only() {
        // Benchmark is missing 2024-01-03; a naive index zip would misalign
        let fund = vec![
            NavPoint::new("F", d(2024, 1, 1), dec!(100)),
            NavPoint::new("F", d(2024, 1, 2), dec!(102)),
            NavPoint::new("F", d(2024, 1, 3), dec!(50)),
            NavPoint::new("F", d(2024, 1, 4), dec!(104.04)),
            NavPoint::new("F", d(2024, 1, 5), dec!(101.9592)),
        ];
        let bench = vec![
            NavPoint::new("B", d(2024, 1, 1), dec!(1000)),
            NavPoint::new("B", d(2024, 1, 2), dec!(1010)),
            NavPoint::new("B", d(2024, 1, 4), dec!(1020.1)),
            NavPoint::new("B", d(2024, 1, 5), dec!(1009.899)),
        ];
        let (beta, _) = beta_alpha(&fund, &bench, Decimal::ZERO, 252).unwrap();
        // Joined fund returns are exactly 2x the benchmark's
        assert!((beta - dec!(2)).abs() < dec!(0.0000001), "got {beta}");
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        let navs = vec![dec!(100), dec!(110), dec!(90), dec!(95), dec!(80), dec!(100)];
        let mdd = max_drawdown(&navs).unwrap();
        assert_eq!(mdd, (dec!(80) - dec!(110)) / dec!(110));
    }

    #[test]
    fn test_max_drawdown_rising_series_is_zero() {
        let navs = vec![dec!(10), dec!(10.5), dec!(11), dec!(12)];
        assert_eq!(max_drawdown(&navs).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_volatility_of_flat_returns_is_zero() {
        let returns = vec![dec!(0.001); 10];
        assert_eq!(annualised_volatility(&returns, 252).unwrap(), Decimal::ZERO);
    }
}
