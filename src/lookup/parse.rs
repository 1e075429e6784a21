//! Enrichment response parsing
//!
//! The service answers with JSON `{status, id?, result?}` where `result` is a
//! small HTML-flavoured blob of `Label : value` lines. The blob grammar:
//!
//! - segments are separated by `<br>` (any case, with or without `/`) or by
//!   line feeds;
//! - any other markup tag (`<` followed by a letter or `/letter`) is dropped,
//!   a bare `<` stays literal and a few common entities are decoded;
//! - a segment is split at its first `:` into a trimmed label and value;
//!   segments without a colon or with an empty label are ignored.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{LookupStatus, SerialRecord};

/// Labels that must all be present for a successful record
pub const REQUIRED_LABELS: [&str; 8] = [
    "Model Desc",
    "Model Name",
    "Model Number",
    "Model iD",
    "Capacity",
    "Color",
    "Type",
    "Year",
];

/// Top-level response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    result: Option<String>,
}

/// Parse a raw response body into a final record for `serial_number`.
///
/// Any deviation from the expected shape yields a `Failed` record; success
/// is all-or-nothing.
pub fn parse_response(serial_number: &str, body: &str) -> SerialRecord {
    let response: ApiResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            warn!("Lookup for {}: malformed response: {}", serial_number, e);
            return SerialRecord::failed(serial_number);
        }
    };

    if !response.status.eq_ignore_ascii_case("success") {
        warn!("Lookup for {}: service status {:?}", serial_number, response.status);
        return SerialRecord::failed(serial_number);
    }

    let Some(result_id) = response.id.as_ref().and_then(parse_id) else {
        warn!("Lookup for {}: response has no usable id", serial_number);
        return SerialRecord::failed(serial_number);
    };

    let fields = parse_result_fields(response.result.as_deref().unwrap_or_default());
    match record_from_fields(serial_number, result_id, &fields) {
        Some(record) => {
            debug!("Lookup for {}: {}", serial_number, record.name);
            record
        }
        None => {
            let missing: Vec<&str> = REQUIRED_LABELS
                .iter()
                .copied()
                .filter(|label| !fields.contains_key(*label))
                .collect();
            warn!(
                "Lookup for {}: incomplete result (missing {:?})",
                serial_number, missing
            );
            SerialRecord::failed(serial_number)
        }
    }
}

/// Parse the `result` blob into a label → value map
pub fn parse_result_fields(result: &str) -> HashMap<String, String> {
    split_segments(result)
        .into_iter()
        .filter_map(|segment| {
            let (label, value) = segment.split_once(':')?;
            let label = label.trim();
            if label.is_empty() {
                return None;
            }
            Some((label.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn record_from_fields(
    serial_number: &str,
    result_id: i64,
    fields: &HashMap<String, String>,
) -> Option<SerialRecord> {
    let field = |label: &str| fields.get(label).cloned();

    Some(SerialRecord {
        serial_number: serial_number.to_string(),
        status: LookupStatus::Success,
        description: field("Model Desc")?,
        name: field("Model Name")?,
        a_number: field("Model Number")?,
        model_id: field("Model iD")?,
        capacity: field("Capacity")?,
        color: field("Color")?,
        device_type: field("Type")?,
        year: fields.get("Year")?.parse().ok()?,
        result_id,
    })
}

fn parse_id(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Split on line-break markers, dropping other tags
fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        match c {
            '<' => match tag_end(rest) {
                Some(end) => {
                    if is_line_break_tag(&rest[1..end]) {
                        segments.push(decode_entities(&std::mem::take(&mut current)));
                    }
                    rest = &rest[end + 1..];
                    continue;
                }
                None => current.push(c),
            },
            '\n' => segments.push(decode_entities(&std::mem::take(&mut current))),
            '\r' => {}
            _ => current.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }
    segments.push(decode_entities(&current));

    segments
}

/// Byte offset of the `>` closing the tag at the start of `text`.
///
/// Only `<name ...>` and `</name ...>` with an ASCII letter first count as
/// markup; anything else, like a bare `<` inside a value, is literal text.
fn tag_end(text: &str) -> Option<usize> {
    let end = text.find('>')?;
    let inner = &text[1..end];
    if inner.contains('<') {
        return None;
    }
    let name = inner.strip_prefix('/').unwrap_or(inner);
    name.chars().next().filter(char::is_ascii_alphabetic)?;
    Some(end)
}

fn is_line_break_tag(tag: &str) -> bool {
    tag.trim()
        .trim_matches('/')
        .split_whitespace()
        .next()
        .is_some_and(|name| name.eq_ignore_ascii_case("br"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESULT: &str = "Model Desc : Foo<br>Model Name : Bar<br>Model Number : A1\nModel iD : M1<br>Capacity : 64GB<br>Color : Red<br>Type : Phone<br>Year : 2020";

    fn body(status: &str, id: serde_json::Value, result: &str) -> String {
        serde_json::json!({ "status": status, "id": id, "result": result }).to_string()
    }

    #[test]
    fn test_parse_success_response() {
        let record = parse_response("ABCDEFGH", &body("success", 4242.into(), SAMPLE_RESULT));

        assert_eq!(record.status, LookupStatus::Success);
        assert_eq!(record.serial_number, "ABCDEFGH");
        assert_eq!(record.description, "Foo");
        assert_eq!(record.name, "Bar");
        assert_eq!(record.a_number, "A1");
        assert_eq!(record.model_id, "M1");
        assert_eq!(record.capacity, "64GB");
        assert_eq!(record.color, "Red");
        assert_eq!(record.device_type, "Phone");
        assert_eq!(record.year, 2020);
        assert_eq!(record.result_id, 4242);
    }

    #[test]
    fn test_status_is_case_insensitive() {
        let record = parse_response("ABCDEFGH", &body("Success", "17".into(), SAMPLE_RESULT));
        assert_eq!(record.status, LookupStatus::Success);
        assert_eq!(record.result_id, 17);
    }

    #[test]
    fn test_missing_year_fails_whole_record() {
        let result = SAMPLE_RESULT.replace("<br>Year : 2020", "");
        let record = parse_response("ABCDEFGH", &body("success", 1.into(), &result));

        assert_eq!(record, SerialRecord::failed("ABCDEFGH"));
    }

    #[test]
    fn test_non_numeric_year_fails() {
        let result = SAMPLE_RESULT.replace("2020", "unknown");
        let record = parse_response("ABCDEFGH", &body("success", 1.into(), &result));
        assert_eq!(record.status, LookupStatus::Failed);
    }

    #[test]
    fn test_error_status_fails() {
        let record = parse_response("ABCDEFGH", &body("error", 1.into(), SAMPLE_RESULT));
        assert_eq!(record, SerialRecord::failed("ABCDEFGH"));
    }

    #[test]
    fn test_malformed_bodies_fail() {
        for bad in [
            "",
            "not json",
            "<html>502 Bad Gateway</html>",
            r#"{"id": 1, "result": "Year : 2020"}"#,
            r#"{"status": "success", "result": "Model Name : Bar"}"#,
            r#"{"status": "success", "id": 1}"#,
        ] {
            let record = parse_response("ABCDEFGH", bad);
            assert_eq!(record.status, LookupStatus::Failed, "body {bad:?}");
            assert!(record.name.is_empty());
        }
    }

    #[test]
    fn test_fields_split_at_first_colon_and_strip_markup() {
        let fields = parse_result_fields(
            "<b>Model Name</b> : <font color=\"green\">iPhone 12</font><BR />Purchase Date : 2021-01-01 10:30<br/>Carrier&nbsp;: AT&amp;T\r\nno colon here<br>: orphan value",
        );

        assert_eq!(fields.get("Model Name").map(String::as_str), Some("iPhone 12"));
        assert_eq!(
            fields.get("Purchase Date").map(String::as_str),
            Some("2021-01-01 10:30")
        );
        assert_eq!(fields.get("Carrier").map(String::as_str), Some("AT&T"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_literal_angle_brackets_keep_line_breaks() {
        let fields = parse_result_fields("Model Desc : A < B<br>Model Name : Bar");
        assert_eq!(fields.get("Model Desc").map(String::as_str), Some("A < B"));
        assert_eq!(fields.get("Model Name").map(String::as_str), Some("Bar"));

        let fields = parse_result_fields("Capacity : <64GB<br>Color : > Red <3");
        assert_eq!(fields.get("Capacity").map(String::as_str), Some("<64GB"));
        assert_eq!(fields.get("Color").map(String::as_str), Some("> Red <3"));
    }

    #[test]
    fn test_success_with_literal_bracket_in_value() {
        let result = SAMPLE_RESULT.replace("Model Desc : Foo", "Model Desc : Foo < 5in");
        let record = parse_response("ABCDEFGH", &body("success", 1.into(), &result));
        assert_eq!(record.status, LookupStatus::Success);
        assert_eq!(record.description, "Foo < 5in");
        assert_eq!(record.name, "Bar");
    }

    #[test]
    fn test_empty_result_has_no_fields() {
        assert!(parse_result_fields("").is_empty());
        assert!(parse_result_fields("<br><br>").is_empty());
    }
}
