//! HTTP routes.
//!
//! | Method | Path | |
//! |---|---|---|
//! | `POST` | `/api/apps/{user}/{sId}/runs` | create a run (design or execute) |
//! | `GET` | `/api/apps/{user}/{sId}/runs` | page through run history |
//! | `GET` | `/api/apps/{user}/{sId}/runs/{runId}/blocks/{type}/{name}` | read one block's execution |
//! | `GET` | `/api/providers` | the caller's provider configurations |
//!
//! Other methods on these paths answer 405.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use blockrun_engine::{RelayStream, RunError, RunOrchestrator, RunOutcome};
use blockrun_types::{Identity, RunList, RunQuery, RunType};

use crate::error::ApiError;
use crate::identity::IdentityResolver;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<RunOrchestrator>,
    identity: Arc<dyn IdentityResolver>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(orchestrator: Arc<RunOrchestrator>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            orchestrator,
            identity,
            shutdown: CancellationToken::new(),
        }
    }

    /// Open relays are closed when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    async fn caller(&self, headers: &HeaderMap) -> Result<Option<Identity>, ApiError> {
        Ok(self.identity.resolve(headers).await?)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/apps/{user}/{s_id}/runs", get(list_runs).post(create_run))
        .route(
            "/api/apps/{user}/{s_id}/runs/{run_id}/blocks/{block_type}/{block_name}",
            get(get_run_block),
        )
        .route("/api/providers", get(list_providers))
        .with_state(state)
}

async fn create_run(
    State(state): State<AppState>,
    Path((user, s_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let caller = state.caller(&headers).await?;
    let outcome = state
        .orchestrator
        .create_run(caller.as_ref(), &user, &s_id, &body)
        .await?;

    Ok(match outcome {
        RunOutcome::Streaming(relay) => event_stream(relay.with_shutdown(state.shutdown.child_token())),
        RunOutcome::Created(run) => Json(json!({ "run": run })).into_response(),
    })
}

/// Response headers are committed here, before the first chunk is pulled.
fn event_stream(relay: RelayStream) -> Response {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(relay),
    )
        .into_response()
}

/// Raw paging parameters; parsed by hand so a bad value is a bare 400.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunsParams {
    limit: Option<String>,
    offset: Option<String>,
    run_type: Option<String>,
}

impl RunsParams {
    fn into_query(self) -> Result<RunQuery, RunError> {
        let mut query = RunQuery::default();
        if let Some(limit) = self.limit {
            query.limit = limit
                .parse()
                .map_err(|_| RunError::client(format!("invalid limit '{limit}'")))?;
        }
        if let Some(offset) = self.offset {
            query.offset = offset
                .parse()
                .map_err(|_| RunError::client(format!("invalid offset '{offset}'")))?;
        }
        if let Some(run_type) = self.run_type {
            query.run_type = run_type.parse::<RunType>().map_err(|e| RunError::client(e.to_string()))?;
        }
        Ok(query)
    }
}

async fn list_runs(
    State(state): State<AppState>,
    Path((user, s_id)): Path<(String, String)>,
    Query(params): Query<RunsParams>,
    headers: HeaderMap,
) -> Result<Json<RunList>, ApiError> {
    let query = params.into_query()?;
    debug!(target: "blockrun::server", app = %s_id, limit = query.limit, offset = query.offset, "listing runs");

    let caller = state.caller(&headers).await?;
    let runs = state.orchestrator.list_runs(caller.as_ref(), &user, &s_id, query).await?;
    Ok(Json(runs))
}

async fn get_run_block(
    State(state): State<AppState>,
    Path((user, s_id, run_id, block_type, block_name)): Path<(String, String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = state.caller(&headers).await?;
    let run = state
        .orchestrator
        .get_run_block(caller.as_ref(), &user, &s_id, &run_id, &block_type, &block_name)
        .await?;
    Ok(Json(json!({ "run": run })).into_response())
}

async fn list_providers(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let caller = state.caller(&headers).await?;
    let providers = state.orchestrator.list_providers(caller.as_ref()).await?;
    Ok(Json(json!({ "providers": providers })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<&str>, offset: Option<&str>, run_type: Option<&str>) -> RunsParams {
        RunsParams {
            limit: limit.map(str::to_string),
            offset: offset.map(str::to_string),
            run_type: run_type.map(str::to_string),
        }
    }

    #[test]
    fn paging_defaults() {
        let query = RunsParams::default().into_query().unwrap();
        assert_eq!(query, RunQuery::default());
    }

    #[test]
    fn paging_values_are_parsed() {
        let query = params(Some("25"), Some("50"), Some("local")).into_query().unwrap();
        assert_eq!((query.limit, query.offset, query.run_type), (25, 50, RunType::Local));
    }

    #[test]
    fn bad_paging_values_are_client_errors() {
        for bad in [
            params(Some("ten"), None, None),
            params(None, Some("-1"), None),
            params(None, None, Some("sideways")),
        ] {
            assert!(matches!(bad.into_query(), Err(RunError::Client(_))));
        }
    }
}
