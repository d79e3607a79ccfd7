//! Dataset snapshot resolution.

use tracing::{debug, warn};

use blockrun_api::ExecutionBackend;
use blockrun_types::{DatasetCatalog, DatasetSnapshot};

use crate::error::RunError;

/// Query the catalog once and pin every dataset to its newest version.
///
/// Any failure, including an explicit backend error payload, fails the whole
/// request; a partial snapshot is never returned.
pub async fn resolve_snapshot(backend: &dyn ExecutionBackend, project_id: &str) -> Result<DatasetSnapshot, RunError> {
    let catalog = backend.list_datasets(project_id).await.map_err(|error| {
        warn!(target: "blockrun::snapshot", project_id, code = error.code(), "dataset listing failed");
        RunError::unavailable(error)
    })?;

    let snapshot = snapshot_from_catalog(&catalog);
    debug!(
        target: "blockrun::snapshot",
        project_id,
        datasets = snapshot.len(),
        "resolved dataset snapshot"
    );
    Ok(snapshot)
}

/// Take version index 0 of every dataset. The backend lists versions newest-first.
pub fn snapshot_from_catalog(catalog: &DatasetCatalog) -> DatasetSnapshot {
    let mut snapshot = DatasetSnapshot::new();
    for (name, versions) in catalog.iter() {
        match versions.first() {
            Some(latest) => snapshot.insert(name, latest.hash.clone()),
            None => warn!(target: "blockrun::snapshot", dataset = name, "dataset has no versions; skipped"),
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockrun_types::DatasetVersion;

    fn version(hash: &str, created: i64) -> DatasetVersion {
        DatasetVersion {
            hash: hash.into(),
            created: Some(created),
        }
    }

    #[test]
    fn takes_first_listed_version_without_sorting() {
        let mut catalog = DatasetCatalog::new();
        // Deliberately out of timestamp order: position wins.
        catalog.insert("ds1", vec![version("h2", 1), version("h1", 9)]);
        catalog.insert("ds2", vec![version("g1", 3)]);

        let snapshot = snapshot_from_catalog(&catalog);
        assert_eq!(snapshot.hash_for("ds1"), Some("h2"));
        assert_eq!(snapshot.hash_for("ds2"), Some("g1"));
    }

    #[test]
    fn datasets_without_versions_are_left_out() {
        let mut catalog = DatasetCatalog::new();
        catalog.insert("empty", Vec::new());

        assert!(snapshot_from_catalog(&catalog).is_empty());
    }
}
