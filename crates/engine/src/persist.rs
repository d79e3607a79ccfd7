//! Run-state persistence after a successful design run.

use std::sync::Arc;

use tracing::{debug, warn};

use blockrun_store::AppStore;
use blockrun_types::{App, SavedRunState};

/// Result of recording an app's saved run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved,
    /// The run exists on the backend but the app still points at its previous run.
    Stale,
}

/// Writes the saved specification, config and run id of an app in one update.
///
/// Best-effort: the backend run is never rolled back, and a failed write only
/// leaves the app's saved pointers at their previous values.
#[derive(Clone)]
pub struct RunStatePersister {
    store: Arc<dyn AppStore>,
}

impl RunStatePersister {
    pub fn new(store: Arc<dyn AppStore>) -> Self {
        Self { store }
    }

    pub async fn persist(&self, app: &App, state: SavedRunState) -> PersistOutcome {
        match self.store.save_run_state(app.id, &state).await {
            Ok(()) => {
                debug!(target: "blockrun::persist", app = %app.s_id, run_id = %state.run_id, "saved run state");
                PersistOutcome::Saved
            }
            Err(error) => {
                warn!(
                    target: "blockrun::persist",
                    app = %app.s_id,
                    run_id = %state.run_id,
                    code = error.code(),
                    error = %error,
                    "failed to save run state; app keeps its previous saved run"
                );
                PersistOutcome::Stale
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockrun_store::{NewApp, SqliteStore};

    fn state(run_id: &str) -> SavedRunState {
        SavedRunState {
            specification: "[]".into(),
            config: "{}".into(),
            run_id: run_id.into(),
        }
    }

    #[tokio::test]
    async fn reports_saved_and_stale_outcomes() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let owner = store.create_user("alice", "gh-1").await.unwrap();
        let app = store.create_app(NewApp::new("a1", "demo", owner.id, "12")).await.unwrap();
        let persister = RunStatePersister::new(store.clone());

        assert_eq!(persister.persist(&app, state("run-1")).await, PersistOutcome::Saved);
        assert_eq!(store.app_by_id(app.id).await.unwrap().unwrap().saved_run.as_deref(), Some("run-1"));

        let missing = App { id: app.id + 100, ..app };
        assert_eq!(persister.persist(&missing, state("run-2")).await, PersistOutcome::Stale);
    }
}
