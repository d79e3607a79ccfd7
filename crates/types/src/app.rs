//! Account, app, and provider records owned by the relational store.

use std::{error::Error, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who may read an app when the caller is not its owner.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the owner can see or run the app.
    #[default]
    Private,
    /// Anyone with the link can read the app; it is not listed.
    Unlisted,
    /// Anyone can read the app.
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Unlisted => "unlisted",
            Self::Public => "public",
        }
    }

    /// Whether a non-owner may read an app with this visibility.
    pub fn is_readable_by_others(&self) -> bool {
        matches!(self, Self::Unlisted | Self::Public)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseVisibilityError(String);

impl fmt::Display for ParseVisibilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown visibility '{}'", self.0)
    }
}

impl Error for ParseVisibilityError {}

impl FromStr for Visibility {
    type Err = ParseVisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "unlisted" => Ok(Self::Unlisted),
            "public" => Ok(Self::Public),
            other => Err(ParseVisibilityError(other.to_string())),
        }
    }
}

/// Account record. `provider_id` is the external identity the session resolver yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub provider_id: String,
}

/// Identity of an authenticated caller as resolved from its session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// External identity identifier (for example an OAuth account id).
    pub provider_id: String,
}

impl Identity {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }
}

/// An executable block graph owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: i64,
    /// Stable external identifier used in routes.
    pub s_id: String,
    pub name: String,
    pub user_id: i64,
    pub visibility: Visibility,
    /// Project identifier on the execution backend.
    pub backend_project_id: String,
    /// Specification document saved by the last successful design run.
    pub saved_specification: Option<String>,
    /// Block configuration saved by the last successful design run.
    pub saved_config: Option<String>,
    /// Run id of the last successful design run.
    pub saved_run: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Predicate used when looking an app up on behalf of a caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppScope {
    /// The caller owns the app: any visibility matches.
    Owner,
    /// The caller is anonymous or another user: only `public` and `unlisted` apps match.
    Visible,
}

impl AppScope {
    pub fn admits(&self, visibility: Visibility) -> bool {
        match self {
            Self::Owner => true,
            Self::Visible => visibility.is_readable_by_others(),
        }
    }
}

/// The three fields written together once the backend accepted a design run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRunState {
    pub specification: String,
    pub config: String,
    pub run_id: String,
}

/// A stored provider configuration. `config` is an opaque JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub provider_id: String,
    pub config: String,
}
