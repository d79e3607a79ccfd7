use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Credentials forwarded to the execution backend, keyed by credential name.
///
/// Rebuilt for every request and never persisted. `Debug` prints names only.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CredentialMap(IndexMap<String, String>);

impl CredentialMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, secret: impl Into<String>) {
        self.0.insert(name.into(), secret.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CredentialMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_secrets() {
        let mut credentials = CredentialMap::new();
        credentials.insert("OPENAI_API_KEY", "sk-live-123");

        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("OPENAI_API_KEY"));
        assert!(!rendered.contains("sk-live-123"));
    }

    #[test]
    fn serializes_as_flat_object() {
        let mut credentials = CredentialMap::new();
        credentials.insert("SERPER_API_KEY", "abc");
        let value = serde_json::to_value(&credentials).expect("serialize");
        assert_eq!(value, serde_json::json!({"SERPER_API_KEY": "abc"}));
    }
}
