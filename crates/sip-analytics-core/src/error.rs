use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("XIRR unsolvable: {0}")]
    XirrUnsolvable(String),

    #[error("Over-redemption in {fund_id} on {date}: requested {requested} units but only {available} available")]
    OverRedemption {
        fund_id: String,
        date: NaiveDate,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        AnalyticsError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_over_redemption_message_names_fund_and_units() {
        let err = AnalyticsError::OverRedemption {
            fund_id: "119551".into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            requested: dec!(120),
            available: dec!(100),
        };
        let msg = err.to_string();
        assert!(msg.contains("119551"));
        assert!(msg.contains("120"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_serde_json_error_converts() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AnalyticsError = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
