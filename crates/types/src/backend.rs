//! Response envelopes used by the execution backend.
//!
//! Every backend response is `{ "error": <object|null>, "response": <payload|null> }`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::dataset::DatasetCatalog;
use crate::run::RunSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEnvelope<T> {
    #[serde(default)]
    pub error: Option<JsonValue>,
    #[serde(default = "Option::default")]
    pub response: Option<T>,
}

/// Payload of run creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEnvelope {
    pub run: RunSummary,
}

/// Payload of a block execution read. The run is relayed untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRunEnvelope {
    #[serde(default)]
    pub run: JsonValue,
}

/// Payload of dataset listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetsEnvelope {
    pub datasets: DatasetCatalog,
}
