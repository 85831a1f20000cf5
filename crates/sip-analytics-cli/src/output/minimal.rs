use serde_json::Value;

use super::cell;

/// Print just the headline number: XIRR for metrics, total tax for a tax
/// run, and so on, falling back to the first field of the result.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Portfolio output nests the headline record
    let result_obj = result_obj
        .as_object()
        .and_then(|m| m.get("portfolio"))
        .unwrap_or(result_obj);

    let priority_keys = [
        "xirr",
        "cagr",
        "total_tax",
        "weighted_overlap_pct",
        "jaccard",
        "status",
    ];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", cell(val, "null"));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, cell(val, "null"));
            return;
        }
    }

    println!("{}", cell(result_obj, "null"));
}
