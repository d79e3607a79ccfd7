//! Relational store for the records the web layer owns.
//!
//! The run orchestrator reads accounts, apps and provider configurations
//! through [`AppStore`] and performs exactly one write: the saved run state
//! of an app after a successful design run. [`SqliteStore`] is the bundled
//! implementation.

mod error;
mod fixture;
mod sqlite;

use async_trait::async_trait;

use blockrun_types::{App, AppScope, Identity, ProviderRecord, SavedRunState, User};

pub use error::StoreError;
pub use fixture::{AppSeed, ProviderSeed, SeedFixture, SeedReport, SessionSeed, UserSeed};
pub use sqlite::{NewApp, SqliteStore};

#[async_trait]
pub trait AppStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_provider_id(&self, provider_id: &str) -> Result<Option<User>, StoreError>;

    /// Look an app up by owner and external id, filtered by `scope`.
    async fn find_app(&self, user_id: i64, s_id: &str, scope: AppScope) -> Result<Option<App>, StoreError>;

    async fn providers_for_user(&self, user_id: i64) -> Result<Vec<ProviderRecord>, StoreError>;

    /// Write the three saved-state fields of an app together.
    async fn save_run_state(&self, app_id: i64, state: &SavedRunState) -> Result<(), StoreError>;

    /// Resolve a session token to the identity it was issued for.
    async fn identity_for_session(&self, token: &str) -> Result<Option<Identity>, StoreError>;
}
