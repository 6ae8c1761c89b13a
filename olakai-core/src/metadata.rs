//! Canonical, provider-agnostic summary of one LLM interaction.
//!
//! Normalizers produce [`PartialMetadata`] twice per call: once from the
//! request, once from the response (or the terminal stream record). The two
//! halves are merged and sealed into an immutable [`LlmMetadata`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Value;

/// Token consumption, always expressed as prompt/completion/total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

impl TokenUsage {
    /// `total` falls back to `prompt + completion` when the provider omits it.
    pub fn new(prompt: u32, completion: u32, total: Option<u32>) -> Self {
        Self {
            prompt,
            completion,
            total: total.unwrap_or_else(|| prompt.saturating_add(completion)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    /// Milliseconds.
    pub duration: u64,
}

impl Timing {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let duration = (end - start).num_milliseconds().max(0) as u64;
        Self {
            start,
            end,
            duration,
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self::between(start, Utc::now())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMetadata {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub tokens: TokenUsage,
    pub parameters: BTreeMap<String, Value>,
    pub timing: Timing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<Vec<Value>>,
    pub stream_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Whatever one side of a call revealed. Every field is optional so that an
/// unrecognised shape simply yields `PartialMetadata::default()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialMetadata {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub parameters: BTreeMap<String, Value>,
    pub function_calls: Vec<Value>,
    pub finish_reason: Option<String>,
}

impl PartialMetadata {
    pub fn for_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Later observations win for scalar fields; parameters and function
    /// calls accumulate.
    pub fn merge(&mut self, other: PartialMetadata) {
        let PartialMetadata {
            provider,
            model,
            api_key,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            parameters,
            function_calls,
            finish_reason,
        } = other;

        overwrite(&mut self.provider, provider);
        overwrite(&mut self.model, model);
        overwrite(&mut self.api_key, api_key);
        overwrite(&mut self.prompt_tokens, prompt_tokens);
        overwrite(&mut self.completion_tokens, completion_tokens);
        overwrite(&mut self.total_tokens, total_tokens);
        overwrite(&mut self.finish_reason, finish_reason);
        self.parameters.extend(parameters);
        self.function_calls.extend(function_calls);
    }

    pub fn merged(mut self, other: PartialMetadata) -> Self {
        self.merge(other);
        self
    }

    pub fn tokens(&self) -> TokenUsage {
        TokenUsage::new(
            self.prompt_tokens.unwrap_or(0),
            self.completion_tokens.unwrap_or(0),
            self.total_tokens,
        )
    }

    pub fn seal(self, timing: Timing, stream_mode: bool) -> LlmMetadata {
        let tokens = self.tokens();
        LlmMetadata {
            provider: self.provider.unwrap_or_else(|| "unknown".to_string()),
            model: self.model.unwrap_or_else(|| "unknown".to_string()),
            api_key: self.api_key,
            tokens,
            parameters: self.parameters,
            timing,
            function_calls: if self.function_calls.is_empty() {
                None
            } else {
                Some(self.function_calls)
            },
            stream_mode,
            finish_reason: self.finish_reason,
        }
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Keeps only the last four characters of a provider key.
pub fn mask_api_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_last_four_chars() {
        assert_eq!(mask_api_key("sk-abcdef1234"), "****1234");
        assert_eq!(mask_api_key("ab"), "****ab");
    }

    #[test]
    fn timing_never_goes_negative() {
        let end = Utc::now();
        let start = end + chrono::Duration::milliseconds(5);
        assert_eq!(Timing::between(start, end).duration, 0);
    }
}
