//! Anonymizer — bidirectional string rewriting across arbitrarily nested
//! structured data.
//!
//! Inbound (fake → real) runs before dispatch; outbound (real → fake, or
//! real → a fixed redaction for one-way rules) runs on the reply. Rules
//! apply sequentially in configuration order and may compose.

use serde_json::Value;

use portero_core::model::{ReplacementRule, DEFAULT_REDACTION};

pub struct Anonymizer {
    rules: Vec<ReplacementRule>,
}

impl Anonymizer {
    pub fn new(rules: Vec<ReplacementRule>) -> Self {
        Self { rules }
    }

    /// fake → real, for every rule in order.
    pub fn anonymize_inbound(&self, value: &Value) -> Value {
        let mut v = value.clone();
        for rule in &self.rules {
            v = rewrite_value(&v, &rule.fake, &rule.real, rule.case_sensitive);
        }
        v
    }

    /// real → fake (bidirectional rules) or real → responseReplacement /
    /// the default redaction token (one-way rules), for every rule in
    /// order.
    pub fn anonymize_outbound(&self, value: &Value) -> Value {
        let mut v = value.clone();
        for rule in &self.rules {
            let to = if rule.bidirectional {
                rule.fake.clone()
            } else {
                rule.response_replacement.clone().unwrap_or_else(|| DEFAULT_REDACTION.to_string())
            };
            v = rewrite_value(&v, &rule.real, &to, rule.case_sensitive);
        }
        v
    }
}

fn rewrite_value(value: &Value, from: &str, to: &str, case_sensitive: bool) -> Value {
    match value {
        Value::String(s) => Value::String(rewrite_string(s, from, to, case_sensitive)),
        Value::Array(items) => Value::Array(
            items.iter().map(|item| rewrite_value(item, from, to, case_sensitive)).collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                let new_key = rewrite_string(key, from, to, case_sensitive);
                out.insert(new_key, rewrite_value(val, from, to, case_sensitive));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn rewrite_string(s: &str, from: &str, to: &str, case_sensitive: bool) -> String {
    if from.is_empty() {
        return s.to_string();
    }
    if case_sensitive {
        s.replace(from, to)
    } else {
        replace_case_insensitive(s, from, to)
    }
}

/// Case-insensitive literal substring replacement that emits `to` exactly
/// (not the matched case variant). Assumes lowercasing does not change a
/// match's byte length, which holds for the ASCII-range identifiers and
/// secrets this is meant to cover.
fn replace_case_insensitive(s: &str, from: &str, to: &str) -> String {
    let lower_s = s.to_lowercase();
    let lower_from = from.to_lowercase();
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut lower_rest = lower_s.as_str();
    while let Some(idx) = lower_rest.find(&lower_from) {
        out.push_str(&rest[..idx]);
        out.push_str(to);
        let end = idx + lower_from.len();
        rest = &rest[end..];
        lower_rest = &lower_rest[end..];
    }
    out.push_str(rest);
    out
}
