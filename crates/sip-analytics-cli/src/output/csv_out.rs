use serde_json::Value;
use std::io;

use super::cell;

type StdoutCsv<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
///
/// Record lists (overlap pairs, tax events, portfolio funds) become one row
/// per record; a single record becomes two-column field,value rows.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value.get("result").unwrap_or(value);
    match result {
        Value::Array(rows) => write_rows(&mut wtr, rows),
        Value::Object(map) => {
            let primary = ["events", "funds"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_array));
            match primary {
                Some(rows) => write_rows(&mut wtr, rows),
                None => {
                    let _ = wtr.write_record(["field", "value"]);
                    for (key, val) in map {
                        let _ = wtr.write_record([key.as_str(), &cell(val, "")]);
                    }
                }
            }
        }
        other => {
            let _ = wtr.write_record([&cell(other, "")]);
        }
    }

    let _ = wtr.flush();
}

fn write_rows(wtr: &mut StdoutCsv<'_>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for row in rows {
            let _ = wtr.write_record([&cell(row, "")]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for row in rows.iter().filter_map(Value::as_object) {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(|v| cell(v, "")).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}
