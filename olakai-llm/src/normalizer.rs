use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use olakai_core::PartialMetadata;

/// Per-provider mapping from raw request/response JSON to the canonical
/// envelope. Every method accepts any shape; what it cannot read it leaves
/// out rather than failing.
pub trait MetadataNormalizer: Send + Sync {
    fn provider(&self) -> &'static str;

    fn extract_request_metadata(&self, request: &Value) -> PartialMetadata;

    fn extract_response_metadata(&self, response: &Value) -> PartialMetadata;

    /// Human-readable prompt for the monitoring payload.
    fn extract_prompt(&self, request: &Value) -> Value;

    fn extract_response_text(&self, response: &Value) -> String;
}

/// Deserializes into `T`, or `T::default()` when the shape doesn't fit.
pub(crate) fn lenient<T: DeserializeOwned + Default>(value: &Value) -> T {
    T::deserialize(value).unwrap_or_default()
}

/// Field deserializer that reads an explicit `null` collection as empty.
/// Pair it with `#[serde(default)]` for missing fields.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Copies the listed request fields into the parameter map under their
/// canonical names. Nulls are skipped.
pub(crate) fn pick_parameters(
    request: &Value,
    mapping: &[(&str, &str)],
) -> BTreeMap<String, Value> {
    mapping
        .iter()
        .filter_map(|(source, canonical)| {
            request
                .get(*source)
                .filter(|value| !value.is_null())
                .map(|value| ((*canonical).to_string(), value.clone()))
        })
        .collect()
}

/// Text of a message `content`: a plain string, or the concatenated `text`
/// of an array of content parts.
pub(crate) fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect(),
        _ => String::new(),
    }
}

/// The user turns of a chat-style `messages` array, one per line. Falls back
/// to every turn when none is marked as the user's.
pub(crate) fn messages_prompt(messages: Option<&Value>) -> Option<String> {
    let messages = messages?.as_array()?;
    let texts = |user_only: bool| -> Vec<String> {
        messages
            .iter()
            .filter(|message| {
                !user_only || message.get("role").and_then(Value::as_str) == Some("user")
            })
            .filter_map(|message| message.get("content").map(content_text))
            .filter(|text| !text.is_empty())
            .collect()
    };
    let mut lines = texts(true);
    if lines.is_empty() {
        lines = texts(false);
    }
    Some(lines.join("\n"))
}

pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}
