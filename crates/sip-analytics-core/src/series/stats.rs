use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

/// Arithmetic mean; zero for an empty slice
pub fn mean(data: &[Decimal]) -> Decimal {
    if data.is_empty() {
        return Decimal::ZERO;
    }
    data.iter().sum::<Decimal>() / Decimal::from(data.len() as i64)
}

/// Sample variance (n-1 denominator)
pub fn sample_variance(data: &[Decimal], mean: Decimal) -> Decimal {
    let n = data.len();
    if n < 2 {
        return Decimal::ZERO;
    }
    let sum_sq: Decimal = data.iter().map(|x| (x - mean) * (x - mean)).sum();
    sum_sq / Decimal::from((n - 1) as i64)
}

/// Sample standard deviation (n-1 denominator)
pub fn sample_std_dev(data: &[Decimal]) -> Decimal {
    sqrt_decimal(sample_variance(data, mean(data)))
}

/// Covariance between two equal-length series (sample, n-1)
pub fn covariance(x: &[Decimal], y: &[Decimal], x_mean: Decimal, y_mean: Decimal) -> Decimal {
    let n = x.len().min(y.len());
    if n < 2 {
        return Decimal::ZERO;
    }
    let sum: Decimal = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
        .sum();
    sum / Decimal::from((n - 1) as i64)
}

/// Square root via Decimal::sqrt(); zero for non-positive input
pub fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}
