use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

/// Outcome of a batch run, derived from its scoped failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Skipped,
}

impl RunStatus {
    /// All units succeeded → Success; some failed → Partial;
    /// nothing computable → Skipped.
    pub fn derive(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (0, _) => RunStatus::Skipped,
            (_, 0) => RunStatus::Success,
            _ => RunStatus::Partial,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InvalidInput,
    InsufficientData,
    XirrUnsolvable,
    OverRedemption,
    ConvergenceFailure,
    DivisionByZero,
    MixedHoldingPeriod,
    UnknownCategory,
    Config,
    Serialization,
}

/// A failure or warning scoped to the smallest unit that produced it:
/// one metric of one fund, one redemption, one holding row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Fund id, optionally suffixed with the metric or date, e.g. `119551/sortino`
    pub scope: String,
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn error(scope: impl Into<String>, err: &AnalyticsError) -> Self {
        Self {
            scope: scope.into(),
            kind: IssueKind::from(err),
            severity: Severity::Error,
            message: err.to_string(),
        }
    }

    pub fn warning(scope: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            kind,
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&AnalyticsError> for IssueKind {
    fn from(err: &AnalyticsError) -> Self {
        match err {
            AnalyticsError::InvalidInput { .. } => IssueKind::InvalidInput,
            AnalyticsError::InsufficientData(_) => IssueKind::InsufficientData,
            AnalyticsError::XirrUnsolvable(_) => IssueKind::XirrUnsolvable,
            AnalyticsError::OverRedemption { .. } => IssueKind::OverRedemption,
            AnalyticsError::ConvergenceFailure { .. } => IssueKind::ConvergenceFailure,
            AnalyticsError::DivisionByZero { .. } => IssueKind::DivisionByZero,
            AnalyticsError::Config(_) => IssueKind::Config,
            AnalyticsError::SerializationError(_) => IssueKind::Serialization,
        }
    }
}

/// Count of issues with error severity
pub fn error_count(issues: &[Issue]) -> usize {
    issues.iter().filter(|i| i.is_error()).count()
}
