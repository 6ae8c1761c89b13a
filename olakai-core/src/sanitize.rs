use std::sync::OnceLock;

use regex::Regex;

use crate::Value;

const REDACTED: &str = "[REDACTED]";

const BUILTIN_PATTERNS: &[&str] = &[
    // email addresses
    r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
    // payment card numbers, optionally grouped
    r"\b(?:\d[ -]?){13,16}\b",
    // US social security numbers
    r"\b\d{3}-\d{2}-\d{4}\b",
    // provider-style secret keys
    r"\b(?:sk|pk|rk)-[A-Za-z0-9_-]{16,}\b",
    // bearer tokens
    r"(?i)bearer\s+[A-Za-z0-9._~+/-]+=*",
];

/// Pure string transform that masks sensitive substrings before a payload
/// leaves the process.
#[derive(Clone, Debug)]
pub struct Sanitizer {
    patterns: Vec<Regex>,
}

impl Sanitizer {
    pub fn builtin() -> &'static Sanitizer {
        static BUILTIN: OnceLock<Sanitizer> = OnceLock::new();
        BUILTIN.get_or_init(|| Sanitizer {
            patterns: BUILTIN_PATTERNS
                .iter()
                .filter_map(|pattern| Regex::new(pattern).ok())
                .collect(),
        })
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn sanitize_text(&self, text: &str) -> String {
        let mut output = text.to_string();
        for pattern in &self.patterns {
            if pattern.is_match(&output) {
                output = pattern.replace_all(&output, REDACTED).into_owned();
            }
        }
        output
    }

    pub fn sanitize_value(&self, value: Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.sanitize_text(&text)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.sanitize_value(item))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, self.sanitize_value(value)))
                    .collect(),
            ),
            other => other,
        }
    }
}

pub fn sanitize_text(text: &str) -> String {
    Sanitizer::builtin().sanitize_text(text)
}

pub fn sanitize_value(value: Value) -> Value {
    Sanitizer::builtin().sanitize_value(value)
}
