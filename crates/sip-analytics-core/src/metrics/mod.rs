//! Per-fund and portfolio risk/return metrics.

pub mod fund;
pub mod portfolio;
pub mod risk;

pub use fund::{
    compute_fund_metrics, compute_fund_metrics_with, FundMetricsInput, MetricRecord,
    PrecomputedRisk,
};
pub use portfolio::{
    compute_metrics_batch, compute_portfolio_metrics, FundWeight, PortfolioMetrics, PORTFOLIO_ID,
};
pub use risk::{compute_cagr, max_drawdown};
