//! Run requests from clients and run payloads exchanged with the execution backend.

use std::{error::Error, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::block::BlockConfig;
use crate::credential::CredentialMap;

/// Backend run category.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// Runs created from the authoring UI.
    #[default]
    Local,
    Deploy,
    Execute,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Deploy => "deploy",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRunTypeError(String);

impl fmt::Display for ParseRunTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown run type '{}'", self.0)
    }
}

impl Error for ParseRunTypeError {}

impl FromStr for RunType {
    type Err = ParseRunTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "deploy" => Ok(Self::Deploy),
            "execute" => Ok(Self::Execute),
            other => Err(ParseRunTypeError(other.to_string())),
        }
    }
}

/// Discriminant of a [`RunRequest`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    /// Run a saved specification by hash and stream its output back.
    Execute,
    /// Run a full specification document and record it as the app's saved state.
    Design,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Design => "design",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a run-creation request. Unknown modes fail to deserialize.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunRequest {
    Execute {
        /// Serialized block configuration.
        config: String,
        #[serde(rename = "specificationHash")]
        specification_hash: String,
        #[serde(default)]
        inputs: Option<JsonValue>,
    },
    Design {
        /// Serialized block configuration.
        config: String,
        /// Full specification document (JSON text).
        specification: String,
    },
}

impl RunRequest {
    pub fn mode(&self) -> RunMode {
        match self {
            Self::Execute { .. } => RunMode::Execute,
            Self::Design { .. } => RunMode::Design,
        }
    }

    pub fn config(&self) -> &str {
        match self {
            Self::Execute { config, .. } | Self::Design { config, .. } => config,
        }
    }
}

/// Block settings wrapper expected by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub blocks: BlockConfig,
}

/// Where the backend takes the specification from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunSource {
    /// A specification previously stored on the backend.
    Hash {
        specification_hash: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        inputs: Option<JsonValue>,
    },
    /// A freshly materialized specification plus the dataset feeding its input block.
    Specification {
        specification: String,
        dataset_id: Option<String>,
    },
}

/// Run submission body sent to the execution backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSpec {
    pub run_type: RunType,
    #[serde(flatten)]
    pub source: RunSource,
    pub config: RunConfig,
    pub credentials: CredentialMap,
}

/// Backend-confirmed run. Only `run_id` is interpreted; every other field is relayed untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    #[serde(flatten)]
    pub details: JsonMap<String, JsonValue>,
}

/// A page of run history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunList {
    pub runs: Vec<JsonValue>,
    pub total: u64,
}

/// Paging and filtering for run history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunQuery {
    pub limit: u32,
    pub offset: u32,
    pub run_type: RunType,
}

impl Default for RunQuery {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            run_type: RunType::Local,
        }
    }
}
