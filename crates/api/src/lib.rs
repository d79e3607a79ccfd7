//! Execution backend client.
//!
//! The execution backend owns dataset storage, run scheduling, and block
//! evaluation. This crate exposes the narrow contract the run orchestrator
//! needs from it:
//!
//! - [`ExecutionBackend::create_run`] submits a run and waits for its summary
//! - [`ExecutionBackend::stream_run`] submits a run and returns its live output
//! - [`ExecutionBackend::list_runs`] pages through run history
//! - [`ExecutionBackend::get_run_block`] reads one block's execution
//! - [`ExecutionBackend::list_datasets`] returns the dataset catalog
//!
//! [`BackendClient`] implements the contract over HTTP with `reqwest`.
//!
//! # Example
//!
//! ```ignore
//! use blockrun_api::{BackendClient, BackendClientConfig, ExecutionBackend};
//!
//! let client = BackendClient::new(BackendClientConfig::new("http://127.0.0.1:3001"))?;
//! let catalog = client.list_datasets("42").await?;
//! ```

mod client;
mod error;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde_json::Value as JsonValue;

use blockrun_types::{DatasetCatalog, RunList, RunQuery, RunSpec, RunSummary};

pub use client::{BackendClient, BackendClientConfig, validate_base_url};
pub use error::BackendError;

/// Live run output: opaque chunks in backend order, ending when the backend closes the stream.
pub type RunStream = BoxStream<'static, Result<Bytes, BackendError>>;

/// Contract consumed by the run orchestrator.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Submit a run and return the backend-confirmed summary.
    async fn create_run(&self, project_id: &str, spec: &RunSpec) -> Result<RunSummary, BackendError>;

    /// Submit a run and return its live output stream.
    ///
    /// Header-level failures are reported here, before any chunk is produced.
    async fn stream_run(&self, project_id: &str, spec: &RunSpec) -> Result<RunStream, BackendError>;

    /// Page through the project's run history.
    async fn list_runs(&self, project_id: &str, query: &RunQuery) -> Result<RunList, BackendError>;

    /// Read one block's execution inside a run.
    async fn get_run_block(
        &self,
        project_id: &str,
        run_id: &str,
        block_type: &str,
        block_name: &str,
    ) -> Result<JsonValue, BackendError>;

    /// List every dataset with its versions, newest first.
    async fn list_datasets(&self, project_id: &str) -> Result<DatasetCatalog, BackendError>;
}
