//! Shared type definitions for the blockrun workspace.
//!
//! The types here are split between the relational records the web layer owns
//! (accounts, apps, provider configurations) and the wire shapes exchanged with
//! the execution backend (run specs, run summaries, dataset catalogs).

pub mod app;
pub mod backend;
pub mod block;
pub mod credential;
pub mod dataset;
pub mod run;

pub use app::{App, AppScope, Identity, ParseVisibilityError, ProviderRecord, SavedRunState, User, Visibility};
pub use backend::{BackendEnvelope, BlockRunEnvelope, DatasetsEnvelope, RunEnvelope};
pub use block::{BlockConfig, BlockEntry, BlockKind, InputBinding};
pub use credential::CredentialMap;
pub use dataset::{DatasetCatalog, DatasetSnapshot, DatasetVersion};
pub use run::{ParseRunTypeError, RunConfig, RunList, RunMode, RunQuery, RunRequest, RunSource, RunSpec, RunSummary, RunType};
