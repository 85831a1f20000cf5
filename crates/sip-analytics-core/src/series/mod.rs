//! Return-series construction shared by the metrics engine.

pub mod returns;
pub mod stats;

pub use returns::{carry_forward, daily_returns, inner_join, DailyReturn, NavSeries};
