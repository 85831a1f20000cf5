pub mod metrics;
pub mod overlap;
pub mod returns;
pub mod tax;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sip_analytics_core::{with_metadata, Issue};
use std::time::Instant;

use crate::input;

/// Request document from `--input <file>` or, failing that, piped stdin
pub fn read_request<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return input::file::read_json(path);
    }
    input::stdin::read_stdin()?
        .ok_or_else(|| format!("--input <file.json> or stdin required for {what}").into())
}

/// Wrap a result in the standard metadata envelope, surfacing issues as
/// warnings.
pub fn envelope<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    issues: &[Issue],
    started: Instant,
    result: T,
) -> Result<Value, Box<dyn std::error::Error>> {
    let warnings = issues
        .iter()
        .map(|i| format!("{}: {}", i.scope, i.message))
        .collect();
    let elapsed = started.elapsed().as_micros() as u64;
    let output = with_metadata(methodology, assumptions, warnings, elapsed, result);
    Ok(serde_json::to_value(output)?)
}
