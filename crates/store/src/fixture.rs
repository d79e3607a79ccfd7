//! JSON fixtures for seeding a development database.
//!
//! ```json
//! {
//!   "users": [{"username": "alice", "providerId": "gh-1"}],
//!   "sessions": [{"token": "tok-alice", "providerId": "gh-1"}],
//!   "apps": [{"sId": "a1", "name": "demo", "owner": "alice", "backendProjectId": "12"}],
//!   "providers": [{"owner": "alice", "providerId": "openai", "config": {"api_key": "sk-..."}}]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use blockrun_types::Visibility;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedFixture {
    pub users: Vec<UserSeed>,
    pub sessions: Vec<SessionSeed>,
    pub apps: Vec<AppSeed>,
    pub providers: Vec<ProviderSeed>,
}

impl SeedFixture {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSeed {
    pub username: String,
    pub provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSeed {
    pub token: String,
    pub provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSeed {
    pub s_id: String,
    pub name: String,
    /// Username of the owner; must appear in `users` or already exist.
    pub owner: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub backend_project_id: String,
    #[serde(default)]
    pub saved_specification: Option<String>,
    #[serde(default)]
    pub saved_config: Option<String>,
    #[serde(default)]
    pub saved_run: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSeed {
    pub owner: String,
    pub provider_id: String,
    /// Stored verbatim when a string, otherwise as compact JSON text.
    pub config: JsonValue,
}

impl ProviderSeed {
    pub fn config_text(&self) -> String {
        match &self.config {
            JsonValue::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Row counts written by a seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub sessions: usize,
    pub apps: usize,
    pub providers: usize,
}
