pub mod config;
pub mod error;
pub mod series;
pub mod status;
pub mod time_value;
pub mod types;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "tax")]
pub mod tax;

#[cfg(feature = "overlap")]
pub mod overlap;

pub use config::EngineConfig;
pub use error::AnalyticsError;
pub use status::{Issue, IssueKind, RunStatus, Severity};
pub use types::*;

/// Standard result type for all analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
