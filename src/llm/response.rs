use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Result, SabimError};
use crate::llm::template::{Shape, StructuredResult, Template};

// First `{` to the next `}`; only used when the wide match does not decode.
static NARROW_OBJECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{.*?\}").expect("Invalid JSON object regex pattern")
});

/// Extract the structured part of a model reply and conform it to `template`.
///
/// Tries the widest brace-delimited region (first `{` to last `}`) so nested
/// objects survive, then falls back to the narrow first-`{`-to-next-`}` match.
/// Every template key is present in the result; values of the wrong shape are
/// replaced by the key's empty default and unknown keys are dropped.
pub fn parse_response(raw: &str, template: &Template) -> Result<StructuredResult> {
    let object = extract_object(raw)?;
    Ok(conform(&object, template))
}

fn extract_object(raw: &str) -> Result<Map<String, Value>> {
    let start = raw.find('{').ok_or(SabimError::NoStructuredData)?;

    if let Some(end) = raw.rfind('}').filter(|end| *end > start) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw[start..=end]) {
            return Ok(map);
        }
        debug!("Wide JSON match did not decode, retrying with the first closing brace");
    }

    let candidate = NARROW_OBJECT_REGEX
        .find(raw)
        .ok_or(SabimError::NoStructuredData)?;

    match serde_json::from_str::<Value>(candidate.as_str()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SabimError::MalformedResponse(format!(
            "expected a JSON object, found {}",
            other
        ))),
        Err(e) => Err(SabimError::MalformedResponse(e.to_string())),
    }
}

fn conform(object: &Map<String, Value>, template: &Template) -> StructuredResult {
    template
        .iter()
        .map(|(name, shape)| {
            let value = object
                .get(name)
                .and_then(|value| conform_value(value, shape))
                .unwrap_or_else(|| shape.empty());
            (name.to_string(), value)
        })
        .collect()
}

fn conform_value(value: &Value, shape: Shape) -> Option<Value> {
    match (shape, value) {
        (Shape::Sequence, Value::Array(items)) => Some(Value::Array(
            items
                .iter()
                .filter_map(scalar_text)
                .map(Value::String)
                .collect(),
        )),
        (Shape::Scalar, value) => scalar_text(value).map(Value::String),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
