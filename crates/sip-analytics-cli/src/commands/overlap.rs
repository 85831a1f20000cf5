use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;

use sip_analytics_core::config::OverlapThresholds;
use sip_analytics_core::overlap::{compute_overlap_report, group_holdings};
use sip_analytics_core::{EngineConfig, HoldingRecord};

use super::{envelope, read_request};

/// Arguments for pairwise overlap
#[derive(Args)]
pub struct OverlapArgs {
    /// Path to JSON holdings: an array of records or { holdings: [...] }
    #[arg(long)]
    pub input: Option<String>,

    /// Weighted-overlap percent at which a pair is flagged as a warning
    #[arg(long)]
    pub warning_pct: Option<Decimal>,

    /// Weighted-overlap percent at which a pair is flagged as critical
    #[arg(long)]
    pub critical_pct: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OverlapRequest {
    Wrapped { holdings: Vec<HoldingRecord> },
    Flat(Vec<HoldingRecord>),
}

pub fn run_overlap(args: OverlapArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let request: OverlapRequest = read_request(args.input.as_deref(), "overlap")?;
    let records = match request {
        OverlapRequest::Wrapped { holdings } | OverlapRequest::Flat(holdings) => holdings,
    };

    let thresholds = OverlapThresholds {
        warning_pct: args.warning_pct.unwrap_or(config.overlap.warning_pct),
        critical_pct: args.critical_pct.unwrap_or(config.overlap.critical_pct),
    };
    if thresholds.warning_pct > thresholds.critical_pct {
        return Err("--warning-pct must not exceed --critical-pct".into());
    }

    let started = Instant::now();
    let report = compute_overlap_report(&group_holdings(&records), &thresholds);
    envelope(
        "Latest disclosure per fund; Jaccard on instrument sets; weighted overlap = sum of min weights",
        &thresholds,
        &report.issues,
        started,
        &report.pairs,
    )
}
