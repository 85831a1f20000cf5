use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::cell;

/// Format output as tables using the tabled crate.
///
/// Scalar fields of the result form a Field/Value table; every array of
/// records inside it (funds, events, liability, pairs) gets its own table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => print_result(result, map),
            None => print_fields(map),
        },
        Value::Array(rows) => print_records(rows),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res) => {
            print_fields(res);
            for (key, val) in res {
                match val {
                    Value::Array(rows) if rows.first().is_some_and(Value::is_object) => {
                        println!("\n{}:", key);
                        print_records(rows);
                    }
                    Value::Object(inner) if inner.contains_key("fund_id") => {
                        println!("\n{}:", key);
                        print_fields(inner);
                    }
                    _ => {}
                }
            }
        }
        Value::Array(rows) => print_records(rows),
        other => println!("{}", other),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nIssues:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        if is_record_list(val) || val.is_object() {
            continue;
        }
        builder.push_record([key.as_str(), &cell(val, "n/a")]);
    }
    println!("{}", Table::from(builder));
}

fn print_records(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        if rows.is_empty() {
            println!("(empty)");
        }
        for row in rows {
            println!("{}", cell(row, "n/a"));
        }
        return;
    };

    let headers: Vec<String> = first
        .iter()
        .filter(|(_, v)| !is_record_list(v))
        .map(|(k, _)| k.clone())
        .collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for row in rows.iter().filter_map(Value::as_object) {
        builder.push_record(
            headers
                .iter()
                .map(|h| row.get(h.as_str()).map(|v| cell(v, "n/a")).unwrap_or_default()),
        );
    }
    println!("{}", Table::from(builder));
}

fn is_record_list(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.first().is_some_and(Value::is_object))
}
