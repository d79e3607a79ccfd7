//! Dataset catalog returned by the execution backend and the per-request snapshot derived from it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One stored version of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    /// Content hash identifying the version.
    pub hash: String,
    #[serde(default)]
    pub created: Option<i64>,
}

/// Versions per dataset name, each list newest-first as the backend returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetCatalog(IndexMap<String, Vec<DatasetVersion>>);

impl DatasetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, versions: Vec<DatasetVersion>) {
        self.0.insert(name.into(), versions);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DatasetVersion])> {
        self.0.iter().map(|(name, versions)| (name.as_str(), versions.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Dataset name to the single version hash pinned for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetSnapshot(IndexMap<String, String>);

impl DatasetSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, hash: impl Into<String>) {
        self.0.insert(name.into(), hash.into());
    }

    pub fn hash_for(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, hash)| (name.as_str(), hash.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
