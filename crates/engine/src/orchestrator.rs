//! Run orchestration.
//!
//! A run-creation request moves through
//! `Validating -> Authorized -> {Executing | Designing} -> Submitted -> {Relaying | Persisting} -> Done`,
//! or ends in `Failed` at any step. Each request is handled independently;
//! the orchestrator keeps no per-run state between requests.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use blockrun_api::ExecutionBackend;
use blockrun_store::AppStore;
use blockrun_types::{
    App, BlockConfig, CredentialMap, Identity, ProviderRecord, RunConfig, RunList, RunQuery, RunRequest,
    RunSource, RunSpec, RunSummary, RunType, SavedRunState, User,
};

use crate::authorization::Access;
use crate::credentials::CredentialAssembler;
use crate::error::RunError;
use crate::persist::RunStatePersister;
use crate::relay::RelayStream;
use crate::snapshot::resolve_snapshot;
use crate::specification::{BlockSpecificationSerializer, SpecificationSerializer};

/// Route value of `runId` that stands for the app's saved run.
pub const SAVED_RUN: &str = "saved";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Validating,
    Authorized,
    Executing,
    Designing,
    Submitted,
    Relaying,
    Persisting,
    Done,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Authorized => "authorized",
            Self::Executing => "executing",
            Self::Designing => "designing",
            Self::Submitted => "submitted",
            Self::Relaying => "relaying",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful run creation hands back to the caller.
#[derive(Debug)]
pub enum RunOutcome {
    /// Execute mode: live backend output to relay.
    Streaming(RelayStream),
    /// Design mode: the backend-confirmed run.
    Created(RunSummary),
}

/// An app resolved on behalf of a caller.
#[derive(Debug, Clone)]
pub struct ResolvedApp {
    pub owner: User,
    pub app: App,
    pub access: Access,
}

pub struct RunOrchestrator {
    backend: Arc<dyn ExecutionBackend>,
    store: Arc<dyn AppStore>,
    serializer: Arc<dyn SpecificationSerializer>,
    credentials: CredentialAssembler,
    persister: RunStatePersister,
}

impl RunOrchestrator {
    /// Orchestrator with the built-in serializer and credential decoders.
    pub fn new(backend: Arc<dyn ExecutionBackend>, store: Arc<dyn AppStore>) -> Self {
        Self {
            backend,
            persister: RunStatePersister::new(Arc::clone(&store)),
            store,
            serializer: Arc::new(BlockSpecificationSerializer),
            credentials: CredentialAssembler::default(),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn SpecificationSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialAssembler) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn store(&self) -> &Arc<dyn AppStore> {
        &self.store
    }

    /// Find the owner by username, decide the caller's access, then look the app up in the matching scope.
    pub async fn resolve_app(
        &self,
        caller: Option<&Identity>,
        username: &str,
        s_id: &str,
    ) -> Result<ResolvedApp, RunError> {
        let owner = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or(RunError::NotFound("user"))?;
        let access = Access::for_caller(caller, &owner);
        let app = self
            .store
            .find_app(owner.id, s_id, access.lookup_scope())
            .await?
            .ok_or(RunError::NotFound("app"))?;

        Ok(ResolvedApp { owner, app, access })
    }

    /// Create a run from a raw request body.
    ///
    /// Checks happen in order: owner exists, app exists, caller is the owner,
    /// body is well formed. The backend is not contacted before all of them pass.
    pub async fn create_run(
        &self,
        caller: Option<&Identity>,
        username: &str,
        s_id: &str,
        body: &[u8],
    ) -> Result<RunOutcome, RunError> {
        debug!(target: "blockrun::orchestrator", app = s_id, phase = %RunPhase::Validating, "run phase");

        let result = self.create_run_checked(caller, username, s_id, body).await;
        if let Err(error) = &result {
            warn!(
                target: "blockrun::orchestrator",
                app = s_id,
                phase = %RunPhase::Failed,
                status = error.status_code(),
                code = error.code(),
                "run creation failed"
            );
        }
        result
    }

    async fn create_run_checked(
        &self,
        caller: Option<&Identity>,
        username: &str,
        s_id: &str,
        body: &[u8],
    ) -> Result<RunOutcome, RunError> {
        let resolved = self.resolve_app(caller, username, s_id).await?;
        resolved.access.require_owner()?;

        let request = parse_run_request(body)?;
        let blocks = BlockConfig::parse(request.config())
            .map_err(|e| RunError::client(format!("config is not a JSON object: {e}")))?;
        let mode = request.mode();
        debug!(target: "blockrun::orchestrator", app = s_id, %mode, phase = %RunPhase::Authorized, "run phase");

        // Only the owner gets here, so these are the owner's credentials.
        let credentials = self.assemble_credentials(&resolved.owner).await?;

        match request {
            RunRequest::Execute {
                specification_hash,
                inputs,
                ..
            } => self
                .execute(&resolved.app, blocks, credentials, specification_hash, inputs)
                .await
                .map(RunOutcome::Streaming),
            RunRequest::Design { config, specification } => self
                .design(&resolved.app, blocks, credentials, config, specification)
                .await
                .map(RunOutcome::Created),
        }
    }

    async fn execute(
        &self,
        app: &App,
        blocks: BlockConfig,
        credentials: CredentialMap,
        specification_hash: String,
        inputs: Option<JsonValue>,
    ) -> Result<RelayStream, RunError> {
        debug!(target: "blockrun::orchestrator", app = %app.s_id, phase = %RunPhase::Executing, "run phase");

        let spec = RunSpec {
            run_type: RunType::Local,
            source: RunSource::Hash {
                specification_hash,
                inputs,
            },
            config: RunConfig { blocks },
            credentials,
        };
        let stream = self.backend.stream_run(&app.backend_project_id, &spec).await?;
        debug!(target: "blockrun::orchestrator", app = %app.s_id, phase = %RunPhase::Submitted, "run phase");

        debug!(target: "blockrun::orchestrator", app = %app.s_id, phase = %RunPhase::Relaying, "run phase");
        Ok(RelayStream::new(stream, app.s_id.clone()))
    }

    async fn design(
        &self,
        app: &App,
        blocks: BlockConfig,
        credentials: CredentialMap,
        config_text: String,
        specification: String,
    ) -> Result<RunSummary, RunError> {
        debug!(target: "blockrun::orchestrator", app = %app.s_id, phase = %RunPhase::Designing, "run phase");

        // Taken once; everything below sees this single view of the catalog.
        let snapshot = resolve_snapshot(self.backend.as_ref(), &app.backend_project_id).await?;
        let materialized = self.serializer.serialize(&specification, &blocks, &snapshot)?;
        let dataset_id = blocks.input_binding().and_then(|binding| binding.dataset);

        let spec = RunSpec {
            run_type: RunType::Local,
            source: RunSource::Specification {
                specification: materialized,
                dataset_id,
            },
            config: RunConfig { blocks },
            credentials,
        };
        let run = self.backend.create_run(&app.backend_project_id, &spec).await?;
        debug!(
            target: "blockrun::orchestrator",
            app = %app.s_id,
            run_id = %run.run_id,
            phase = %RunPhase::Submitted,
            "run phase"
        );
        debug!(
            target: "blockrun::orchestrator",
            app = %app.s_id,
            run_id = %run.run_id,
            phase = %RunPhase::Persisting,
            "run phase"
        );

        let persisted = self
            .persister
            .persist(
                app,
                SavedRunState {
                    specification,
                    config: config_text,
                    run_id: run.run_id.clone(),
                },
            )
            .await;

        debug!(
            target: "blockrun::orchestrator",
            app = %app.s_id,
            run_id = %run.run_id,
            persisted = ?persisted,
            phase = %RunPhase::Done,
            "run phase"
        );
        Ok(run)
    }

    async fn assemble_credentials(&self, owner: &User) -> Result<CredentialMap, RunError> {
        let providers = self.store.providers_for_user(owner.id).await?;
        let (credentials, report) = self.credentials.assemble(&providers);
        for skipped in &report.skipped {
            warn!(
                target: "blockrun::credentials",
                provider = %skipped.provider_id,
                reason = %skipped.reason,
                "provider skipped during credential assembly"
            );
        }
        debug!(
            target: "blockrun::credentials",
            decoded = report.decoded.len(),
            skipped = report.skipped.len(),
            "assembled credentials"
        );
        Ok(credentials)
    }

    /// Page through an app's run history. Read-only callers may list visible apps.
    pub async fn list_runs(
        &self,
        caller: Option<&Identity>,
        username: &str,
        s_id: &str,
        query: RunQuery,
    ) -> Result<RunList, RunError> {
        let resolved = self.resolve_app(caller, username, s_id).await?;
        Ok(self.backend.list_runs(&resolved.app.backend_project_id, &query).await?)
    }

    /// Read one block's execution. `None` when `run_id` is [`SAVED_RUN`] and the app has no saved run.
    pub async fn get_run_block(
        &self,
        caller: Option<&Identity>,
        username: &str,
        s_id: &str,
        run_id: &str,
        block_type: &str,
        block_name: &str,
    ) -> Result<Option<JsonValue>, RunError> {
        let resolved = self.resolve_app(caller, username, s_id).await?;

        let run_id = if run_id == SAVED_RUN {
            match resolved.app.saved_run.as_deref().filter(|id| !id.is_empty()) {
                Some(saved) => saved,
                None => return Ok(None),
            }
        } else {
            run_id
        };

        let run = self
            .backend
            .get_run_block(&resolved.app.backend_project_id, run_id, block_type, block_name)
            .await
            .map_err(RunError::unavailable)?;
        Ok(Some(run))
    }

    /// Provider configurations of the calling user.
    pub async fn list_providers(&self, caller: Option<&Identity>) -> Result<Vec<ProviderRecord>, RunError> {
        let caller = caller.ok_or(RunError::Unauthorized)?;
        let user = self
            .store
            .find_user_by_provider_id(&caller.provider_id)
            .await?
            .ok_or(RunError::Unauthorized)?;
        Ok(self.store.providers_for_user(user.id).await?)
    }
}

/// Parse a run-creation body. Unknown modes and missing or wrong-typed fields are client errors.
pub fn parse_run_request(body: &[u8]) -> Result<RunRequest, RunError> {
    serde_json::from_slice(body).map_err(|e| RunError::client(format!("invalid run request: {e}")))
}
