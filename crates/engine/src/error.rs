//! Error taxonomy of run orchestration.

use serde_json::Value as JsonValue;
use thiserror::Error;

use blockrun_api::BackendError;
use blockrun_store::StoreError;

/// Why a request against an app failed. Every variant is terminal for the request.
#[derive(Debug, Error)]
pub enum RunError {
    /// Malformed or missing fields, unknown mode, or an unusable specification.
    #[error("invalid request: {0}")]
    Client(String),

    /// Anonymous or non-owner caller attempted an owner-only operation.
    #[error("caller is not allowed to perform this operation")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The backend explicitly refused the request; relayed to the caller as-is.
    #[error("backend rejected the request (status {status})")]
    BackendRejected { status: u16, error: JsonValue },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RunError {
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    /// Collapse any backend failure, including explicit rejections, into a server error.
    pub fn unavailable(error: BackendError) -> Self {
        Self::BackendUnavailable(error)
    }

    /// HTTP status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Client(_) => 400,
            Self::Unauthorized => 401,
            Self::NotFound(_) => 404,
            Self::BackendRejected { status, .. } => *status,
            Self::BackendUnavailable(_) | Self::Store(_) => 500,
        }
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Client(_) => "client_error",
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::BackendRejected { .. } => "backend_rejected",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<BackendError> for RunError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Rejected { status, error } => Self::BackendRejected { status, error },
            other => Self::BackendUnavailable(other),
        }
    }
}

impl From<SpecificationError> for RunError {
    fn from(error: SpecificationError) -> Self {
        Self::Client(error.to_string())
    }
}

/// Failure to decode one stored provider configuration.
///
/// Messages never include configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("no decoder registered for provider '{0}'")]
    UnknownProvider(String),

    #[error("config is not a JSON object")]
    MalformedConfig,

    #[error("config is missing string field '{0}'")]
    MissingField(&'static str),
}

/// Failure to materialize a specification document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecificationError {
    #[error("specification is not a valid block list: {0}")]
    Malformed(String),

    #[error("data block '{block}' does not name a dataset")]
    UnboundDataBlock { block: String },

    #[error("data block '{block}' references unknown dataset '{dataset}'")]
    UnknownDataset { block: String, dataset: String },
}
