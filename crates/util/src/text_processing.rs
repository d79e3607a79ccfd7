//! # Text Processing Utilities
//!
//! Redaction of secret-looking values before text reaches a log line. Backend
//! error messages and provider configuration parse errors can echo request
//! content, which includes credentials.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Redacts values that look like secrets in a string.
///
/// Matches keep their key or header prefix and replace only the value, so
/// `OPENAI_API_KEY=sk-123` becomes `OPENAI_API_KEY=[REDACTED]`.
///
/// # Example
/// ```rust
/// use blockrun_util::redact_sensitive;
///
/// let redacted = redact_sensitive("SERPER_API_KEY=abc123 TOKEN=xyz789");
/// assert_eq!(redacted, "SERPER_API_KEY=[REDACTED] TOKEN=[REDACTED]");
///
/// let redacted = redact_sensitive("Authorization: Bearer secret123");
/// assert_eq!(redacted, "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    redact_sensitive_with(input, "[REDACTED]")
}

/// Redacts sensitive-looking values, using a custom replacement token.
fn redact_sensitive_with(input: &str, replacement: &str) -> String {
    let mut redacted = input.to_string();

    for pattern in redact_patterns().iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                if captures.get(2).is_some() {
                    format!("{}{}{}", prefix, replacement, suffix)
                } else {
                    replacement.to_string()
                }
            })
            .to_string();
    }

    redacted
}

/// Recursively redact every string inside a JSON value.
pub fn redact_json(v: &Value) -> Value {
    match v {
        Value::String(s) => Value::String(redact_sensitive(s)),
        Value::Array(arr) => Value::Array(arr.iter().map(redact_json).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, val) in map.iter() {
                out.insert(k.clone(), redact_json(val));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Compiled patterns, most specific first.
fn redact_patterns() -> &'static Vec<Regex> {
    static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(build_redact_patterns);

    &REDACT_PATTERNS
}

fn build_redact_patterns() -> Vec<Regex> {
    let keyword_fragment = build_keyword_fragment(SECRET_KEYWORDS);

    let shell_assignment = format!(
        r"(?im)((?:export\s+)?[A-Za-z0-9_]*?(?:{keywords})[A-Za-z0-9_]*\s*=\s*)([^\s]+)",
        keywords = keyword_fragment
    );
    let json_assignment = format!(
        "(?im)((?:\"|')?[A-Za-z0-9_.-]*?(?:{keywords})[A-Za-z0-9_.-]*[\"']?\\s*:\\s*(?:\"|'))([^\"']+)((?:\"|'))",
        keywords = keyword_fragment
    );

    let sources = [
        // value-only credential formats
        r"(?i)(sk-(?:proj-)?[A-Za-z0-9_-]{16,})".to_string(),
        r"(?i)((?:gh[oprsu]|github_pat)_[A-Za-z0-9_]{22,40})".to_string(),
        r"(?i)(AIzaSy[A-Za-z0-9_-]{33})".to_string(),
        r"(?i)(postgres(?:ql)?://[^\s]+)".to_string(),
        // authorization headers and inline bearer/basic credentials
        r"(?i)(authorization:\s+)([^\s]+(?:\s+[^\s]+)*)".to_string(),
        r"(?i)((?:^|\b)Bearer\s+)([A-Za-z0-9\-._~+/]+=*)".to_string(),
        r"(?i)((?:^|\b)Basic\s+)([A-Za-z0-9+/]+=*)".to_string(),
        // key/value assignments
        shell_assignment,
        json_assignment,
    ];

    sources.iter().filter_map(|source| Regex::new(source).ok()).collect()
}

const SECRET_KEYWORDS: &[&str] = &[
    "API_KEY",
    "API_TOKEN",
    "ACCESS_KEY",
    "AUTH_TOKEN",
    "CLIENT_SECRET",
    "PASSWORD",
    "PRIVATE_KEY",
    "SECRET",
    "SESSION",
    "TOKEN",
];

fn build_keyword_fragment(keywords: &[&str]) -> String {
    keywords
        .iter()
        .map(|keyword| keyword.split('_').map(regex::escape).collect::<Vec<_>>().join("[_\\-]?"))
        .collect::<Vec<_>>()
        .join("|")
}
