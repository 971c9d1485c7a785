use crate::domain::Record;
use serde_json::Value;

pub(super) fn encode_csv_record(record: &Record) -> String {
    record
        .values()
        .map(csv_escape)
        .collect::<Vec<_>>()
        .join(",")
}

pub(super) fn encode_tsv_record(record: &Record) -> String {
    record
        .values()
        .map(|v| {
            value_text(v)
                .replace('\t', "\\t")
                .replace('\n', "\\n")
                .replace('\r', "\\r")
        })
        .collect::<Vec<_>>()
        .join("\t")
}

fn csv_escape(value: &Value) -> String {
    let text = value_text(value).replace('\n', "\\n");

    if text.contains(',') {
        // Quote the field and double any embedded quotes.
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
