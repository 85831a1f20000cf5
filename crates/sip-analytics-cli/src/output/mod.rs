pub mod csv_out;
pub mod minimal;
pub mod table;

use colored::Colorize;
use serde_json::Value;

use crate::OutputFormat;

/// Dispatch output to the appropriate formatter. A partial or skipped run
/// is also announced on stderr so piped stdout stays clean.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
    if let Some(status) = run_status(value) {
        if status != "success" {
            eprintln!("{}: run status {}", "note".yellow().bold(), status);
        }
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

fn run_status(value: &Value) -> Option<&str> {
    value.get("result")?.get("status")?.as_str()
}

/// Render a JSON leaf for a cell; `null` marks a metric that could not be computed.
pub(crate) fn cell(value: &Value, null: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => null.to_string(),
        Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => items
            .iter()
            .map(|v| cell(v, null))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => format!("[{} records]", items.len()),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
