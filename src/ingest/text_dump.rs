//! Recovery of video arrays from legacy text dumps: JavaScript assignment
//! files (`var list = [...]`), plain JSON, or anything with a bracketed
//! array somewhere inside it.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::Value;

use super::RawItem;

static ASSIGNMENT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?m)(?:var|let|const)\s+\w+\s*=\s*(\[[\s\S]*?\]);?\s*$").ok()
});

static TRAILING_COMMA: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r",\s*([}\]])").ok());

/// Extracts the first array of objects it can find in `content`.
///
/// Strategies run in order and each falls through when it does not yield an
/// array. Elements that are not JSON objects are dropped.
pub fn parse_text_dump(content: &str) -> Vec<RawItem> {
    let strategies: [(&str, fn(&str) -> Option<Vec<Value>>); 3] = [
        ("variable assignment", from_assignment),
        ("JSON document", from_json_document),
        ("bracket scan", from_bracket_scan),
    ];

    for (name, strategy) in strategies {
        if let Some(values) = strategy(content) {
            let items: Vec<RawItem> = values
                .into_iter()
                .filter_map(|value| match value {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            tracing::info!("Parsed {} items from text dump ({})", items.len(), name);
            return items;
        }
    }

    tracing::warn!(bytes = content.len(), "No recognizable array in text dump");
    Vec::new()
}

fn from_assignment(content: &str) -> Option<Vec<Value>> {
    let captured = ASSIGNMENT.as_ref()?.captures(content)?.get(1)?.as_str();
    parse_array(&strip_trailing_commas(captured))
}

fn from_json_document(content: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(content).ok()? {
        Value::Array(values) => Some(values),
        Value::Object(mut map) => ["data", "list"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(values)) => Some(values),
                _ => None,
            }),
        _ => None,
    }
}

fn from_bracket_scan(content: &str) -> Option<Vec<Value>> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }
    parse_array(&strip_trailing_commas(&content[start..=end]))
}

fn parse_array(json: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Array(values)) => Some(values),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Candidate array is not valid JSON: {}", e);
            None
        }
    }
}

/// Drops the comma in `,]` and `,}` which JavaScript accepts and JSON does not.
fn strip_trailing_commas(json: &str) -> String {
    match TRAILING_COMMA.as_ref() {
        Some(re) => re.replace_all(json, "$1").into_owned(),
        None => json.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn javascript_assignment_with_trailing_commas() {
        let dump = r#"
            // exported by the old site
            var videoList = [
                {"vod_id": 1, "vod_name": "first",},
                {"vod_id": 2, "vod_name": "second"},
            ];
        "#;

        let items = parse_text_dump(dump);

        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["vod_name"], "second");
    }

    #[test]
    fn plain_json_array() {
        let items = parse_text_dump(r#"[{"id": 5, "title": "x"}, 3, "noise"]"#);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], 5);
    }

    #[test]
    fn json_object_with_data_or_list() {
        assert_eq!(parse_text_dump(r#"{"data": [{"id": 1}]}"#).len(), 1);
        assert_eq!(parse_text_dump(r#"{"code": 1, "list": [{"id": 1}, {"id": 2}]}"#).len(), 2);
    }

    #[test]
    fn object_without_array_falls_through_to_bracket_scan() {
        let items = parse_text_dump(r#"{"data": "none", "extra": [{"id": 9}]}"#);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], 9);
    }

    #[test]
    fn array_embedded_in_other_text() {
        let dump = "callback([{\"id\": 1, \"name\": \"a\"},]) // trailing junk";

        let items = parse_text_dump(dump);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "a");
    }

    #[test]
    fn unrecognizable_content_is_empty() {
        assert!(parse_text_dump("just some words").is_empty());
        assert!(parse_text_dump("").is_empty());
        assert!(parse_text_dump("] backwards [").is_empty());
    }

    #[test]
    fn trailing_commas_are_stripped_before_closers() {
        assert_eq!(strip_trailing_commas(r#"[{"a": 1 , }, ]"#), r#"[{"a": 1 }]"#);
    }

    #[test]
    fn patterns_compile() {
        assert!(ASSIGNMENT.is_some());
        assert!(TRAILING_COMMA.is_some());
    }
}
