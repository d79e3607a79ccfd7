//! Scripted [`ExecutionBackend`] for tests.
//!
//! Records every call and answers from a script set up by the test. Enabled
//! for this crate's tests and, through the `testing` feature, for downstream
//! crates.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use serde_json::{Map as JsonMap, Value as JsonValue, json};

use blockrun_api::{BackendError, ExecutionBackend, RunStream};
use blockrun_types::{DatasetCatalog, DatasetVersion, RunList, RunQuery, RunSpec, RunSummary};

/// A call received by the scripted backend. Run specs are captured as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateRun {
        project_id: String,
        spec: JsonValue,
    },
    StreamRun {
        project_id: String,
        spec: JsonValue,
    },
    ListRuns {
        project_id: String,
        query: RunQuery,
    },
    GetRunBlock {
        project_id: String,
        run_id: String,
        block_type: String,
        block_name: String,
    },
    ListDatasets {
        project_id: String,
    },
}

/// A scripted failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedFailure {
    /// The backend answers with a structured error and this status.
    Rejected { status: u16, error: JsonValue },
    /// The backend cannot be reached.
    Unavailable,
}

impl ScriptedFailure {
    fn to_error(&self) -> BackendError {
        match self {
            Self::Rejected { status, error } => BackendError::rejected(*status, error.clone()),
            Self::Unavailable => BackendError::Status { status: 503 },
        }
    }
}

#[derive(Default)]
struct Script {
    catalog: DatasetCatalog,
    catalog_after_read: Option<DatasetCatalog>,
    datasets_failure: Option<ScriptedFailure>,
    create_failure: Option<ScriptedFailure>,
    stream_failure: Option<ScriptedFailure>,
    stream_chunks: Vec<Bytes>,
    stream_fault_after: Option<usize>,
    stream_held_open: bool,
    runs: RunList,
    runs_failure: Option<ScriptedFailure>,
    block_run: JsonValue,
    block_failure: Option<ScriptedFailure>,
    issued_runs: u64,
}

#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<BackendCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog built from `(name, [hash, ...newest-first])` pairs.
    pub fn catalog_of(entries: &[(&str, &[&str])]) -> DatasetCatalog {
        let mut catalog = DatasetCatalog::new();
        for (name, hashes) in entries {
            let versions = hashes
                .iter()
                .map(|hash| DatasetVersion {
                    hash: hash.to_string(),
                    created: None,
                })
                .collect();
            catalog.insert(*name, versions);
        }
        catalog
    }

    pub fn with_catalog(self, catalog: DatasetCatalog) -> Self {
        self.script().catalog = catalog;
        self
    }

    /// Replace the catalog right after it is first listed, as a concurrent upload would.
    pub fn with_catalog_after_read(self, catalog: DatasetCatalog) -> Self {
        self.script().catalog_after_read = Some(catalog);
        self
    }

    pub fn failing_datasets(self, failure: ScriptedFailure) -> Self {
        self.script().datasets_failure = Some(failure);
        self
    }

    pub fn failing_create(self, failure: ScriptedFailure) -> Self {
        self.script().create_failure = Some(failure);
        self
    }

    pub fn failing_stream(self, failure: ScriptedFailure) -> Self {
        self.script().stream_failure = Some(failure);
        self
    }

    pub fn with_stream_chunks(self, chunks: &[&str]) -> Self {
        self.script().stream_chunks = chunks.iter().map(|chunk| Bytes::from(chunk.to_string())).collect();
        self
    }

    /// Break the stream after `chunks` chunks have been produced.
    pub fn with_stream_fault_after(self, chunks: usize) -> Self {
        self.script().stream_fault_after = Some(chunks);
        self
    }

    /// Keep the stream open after the scripted chunks, as a long-running run would.
    pub fn with_stream_held_open(self) -> Self {
        self.script().stream_held_open = true;
        self
    }

    pub fn with_runs(self, runs: RunList) -> Self {
        self.script().runs = runs;
        self
    }

    pub fn failing_runs(self, failure: ScriptedFailure) -> Self {
        self.script().runs_failure = Some(failure);
        self
    }

    pub fn with_block_run(self, run: JsonValue) -> Self {
        self.script().block_run = run;
        self
    }

    pub fn failing_block(self, failure: ScriptedFailure) -> Self {
        self.script().block_failure = Some(failure);
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn create_run_calls(&self) -> Vec<JsonValue> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::CreateRun { spec, .. } => Some(spec),
                _ => None,
            })
            .collect()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

fn spec_json(spec: &RunSpec) -> JsonValue {
    serde_json::to_value(spec).unwrap_or(JsonValue::Null)
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn create_run(&self, project_id: &str, spec: &RunSpec) -> Result<RunSummary, BackendError> {
        self.record(BackendCall::CreateRun {
            project_id: project_id.to_string(),
            spec: spec_json(spec),
        });

        let mut script = self.script();
        if let Some(failure) = &script.create_failure {
            return Err(failure.to_error());
        }
        script.issued_runs += 1;

        let mut details = JsonMap::new();
        details.insert("status".into(), json!({"run": "succeeded"}));
        Ok(RunSummary {
            run_id: format!("run-{}", script.issued_runs),
            details,
        })
    }

    async fn stream_run(&self, project_id: &str, spec: &RunSpec) -> Result<RunStream, BackendError> {
        self.record(BackendCall::StreamRun {
            project_id: project_id.to_string(),
            spec: spec_json(spec),
        });

        let script = self.script();
        if let Some(failure) = &script.stream_failure {
            return Err(failure.to_error());
        }

        let mut items: Vec<Result<Bytes, BackendError>> = script.stream_chunks.iter().cloned().map(Ok).collect();
        if let Some(after) = script.stream_fault_after {
            items.truncate(after);
            items.push(Err(BackendError::stream("scripted connection reset")));
        }
        let chunks = stream::iter(items);
        if script.stream_held_open {
            Ok(chunks.chain(stream::pending()).boxed())
        } else {
            Ok(chunks.boxed())
        }
    }

    async fn list_runs(&self, project_id: &str, query: &RunQuery) -> Result<RunList, BackendError> {
        self.record(BackendCall::ListRuns {
            project_id: project_id.to_string(),
            query: *query,
        });

        let script = self.script();
        match &script.runs_failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(script.runs.clone()),
        }
    }

    async fn get_run_block(
        &self,
        project_id: &str,
        run_id: &str,
        block_type: &str,
        block_name: &str,
    ) -> Result<JsonValue, BackendError> {
        self.record(BackendCall::GetRunBlock {
            project_id: project_id.to_string(),
            run_id: run_id.to_string(),
            block_type: block_type.to_string(),
            block_name: block_name.to_string(),
        });

        let script = self.script();
        match &script.block_failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(script.block_run.clone()),
        }
    }

    async fn list_datasets(&self, project_id: &str) -> Result<DatasetCatalog, BackendError> {
        self.record(BackendCall::ListDatasets {
            project_id: project_id.to_string(),
        });

        let mut script = self.script();
        if let Some(failure) = &script.datasets_failure {
            return Err(failure.to_error());
        }
        let listed = script.catalog.clone();
        if let Some(next) = script.catalog_after_read.take() {
            script.catalog = next;
        }
        Ok(listed)
    }
}
