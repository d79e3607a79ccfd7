//! SQLite-backed [`AppStore`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use blockrun_types::{App, AppScope, Identity, ProviderRecord, SavedRunState, User, Visibility};

use crate::AppStore;
use crate::error::StoreError;
use crate::fixture::{SeedFixture, SeedReport};

const SCHEMA: &str = "PRAGMA journal_mode=WAL;\
     PRAGMA synchronous=NORMAL;\
     PRAGMA foreign_keys=ON;\
     CREATE TABLE IF NOT EXISTS users (\
       id INTEGER PRIMARY KEY AUTOINCREMENT,\
       username TEXT NOT NULL UNIQUE,\
       provider_id TEXT NOT NULL UNIQUE\
     );\
     CREATE TABLE IF NOT EXISTS sessions (\
       token TEXT PRIMARY KEY,\
       provider_id TEXT NOT NULL,\
       created_at INTEGER NOT NULL\
     );\
     CREATE TABLE IF NOT EXISTS apps (\
       id INTEGER PRIMARY KEY AUTOINCREMENT,\
       s_id TEXT NOT NULL UNIQUE,\
       name TEXT NOT NULL,\
       user_id INTEGER NOT NULL REFERENCES users(id),\
       visibility TEXT NOT NULL DEFAULT 'private',\
       backend_project_id TEXT NOT NULL,\
       saved_specification TEXT,\
       saved_config TEXT,\
       saved_run TEXT,\
       created_at INTEGER NOT NULL,\
       updated_at INTEGER NOT NULL\
     );\
     CREATE TABLE IF NOT EXISTS providers (\
       id INTEGER PRIMARY KEY AUTOINCREMENT,\
       user_id INTEGER NOT NULL REFERENCES users(id),\
       provider_id TEXT NOT NULL,\
       config TEXT NOT NULL,\
       UNIQUE(user_id, provider_id)\
     );";

const APP_COLUMNS: &str = "id, s_id, name, user_id, visibility, backend_project_id, \
     saved_specification, saved_config, saved_run, created_at, updated_at";

/// Fields of an app about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApp {
    pub s_id: String,
    pub name: String,
    pub user_id: i64,
    pub visibility: Visibility,
    pub backend_project_id: String,
    pub saved_specification: Option<String>,
    pub saved_config: Option<String>,
    pub saved_run: Option<String>,
}

impl NewApp {
    pub fn new(s_id: impl Into<String>, name: impl Into<String>, user_id: i64, backend_project_id: impl Into<String>) -> Self {
        Self {
            s_id: s_id.into(),
            name: name.into(),
            user_id,
            visibility: Visibility::Private,
            backend_project_id: backend_project_id.into(),
            saved_specification: None,
            saved_config: None,
            saved_run: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "opened sqlite store");

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A private in-memory database, mostly useful in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, StoreError>,
    {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut guard)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_conn(f))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Insert a user, or update the identity of an existing username.
    pub async fn create_user(&self, username: &str, provider_id: &str) -> Result<User, StoreError> {
        let username = username.to_string();
        let provider_id = provider_id.to_string();
        self.blocking(move |conn| upsert_user(conn, &username, &provider_id)).await
    }

    pub async fn create_session(&self, token: &str, provider_id: &str) -> Result<(), StoreError> {
        let token = token.to_string();
        let provider_id = provider_id.to_string();
        self.blocking(move |conn| upsert_session(conn, &token, &provider_id)).await
    }

    pub async fn create_app(&self, app: NewApp) -> Result<App, StoreError> {
        self.blocking(move |conn| insert_app(conn, &app)).await
    }

    /// Store a provider configuration for a user, replacing any previous one.
    pub async fn set_provider(&self, user_id: i64, provider_id: &str, config: &str) -> Result<(), StoreError> {
        let provider_id = provider_id.to_string();
        let config = config.to_string();
        self.blocking(move |conn| upsert_provider(conn, user_id, &provider_id, &config))
            .await
    }

    pub async fn app_by_id(&self, app_id: i64) -> Result<Option<App>, StoreError> {
        self.blocking(move |conn| {
            let sql = format!("SELECT {APP_COLUMNS} FROM apps WHERE id = ?1");
            Ok(conn.query_row(&sql, params![app_id], app_from_row).optional()?)
        })
        .await
    }

    /// Load a fixture in a single transaction.
    pub async fn seed(&self, fixture: SeedFixture) -> Result<SeedReport, StoreError> {
        let report = self
            .blocking(move |conn| {
                let tx = conn.transaction()?;
                let mut report = SeedReport::default();

                for user in &fixture.users {
                    upsert_user(&tx, &user.username, &user.provider_id)?;
                    report.users += 1;
                }
                for session in &fixture.sessions {
                    upsert_session(&tx, &session.token, &session.provider_id)?;
                    report.sessions += 1;
                }
                for app in &fixture.apps {
                    let owner = user_by_username(&tx, &app.owner)?
                        .ok_or_else(|| StoreError::UnknownUser(app.owner.clone()))?;
                    insert_app(
                        &tx,
                        &NewApp {
                            s_id: app.s_id.clone(),
                            name: app.name.clone(),
                            user_id: owner.id,
                            visibility: app.visibility,
                            backend_project_id: app.backend_project_id.clone(),
                            saved_specification: app.saved_specification.clone(),
                            saved_config: app.saved_config.clone(),
                            saved_run: app.saved_run.clone(),
                        },
                    )?;
                    report.apps += 1;
                }
                for provider in &fixture.providers {
                    let owner = user_by_username(&tx, &provider.owner)?
                        .ok_or_else(|| StoreError::UnknownUser(provider.owner.clone()))?;
                    upsert_provider(&tx, owner.id, &provider.provider_id, &provider.config_text())?;
                    report.providers += 1;
                }

                tx.commit()?;
                Ok(report)
            })
            .await?;

        info!(
            users = report.users,
            sessions = report.sessions,
            apps = report.apps,
            providers = report.providers,
            "seeded store"
        );
        Ok(report)
    }
}

#[async_trait]
impl AppStore for SqliteStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let username = username.to_string();
        self.blocking(move |conn| user_by_username(conn, &username)).await
    }

    async fn find_user_by_provider_id(&self, provider_id: &str) -> Result<Option<User>, StoreError> {
        let provider_id = provider_id.to_string();
        self.blocking(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, username, provider_id FROM users WHERE provider_id = ?1",
                    params![provider_id],
                    user_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn find_app(&self, user_id: i64, s_id: &str, scope: AppScope) -> Result<Option<App>, StoreError> {
        let s_id = s_id.to_string();
        let app = self
            .blocking(move |conn| {
                let sql = format!("SELECT {APP_COLUMNS} FROM apps WHERE user_id = ?1 AND s_id = ?2");
                Ok(conn.query_row(&sql, params![user_id, s_id], app_from_row).optional()?)
            })
            .await?;
        Ok(app.filter(|app| scope.admits(app.visibility)))
    }

    async fn providers_for_user(&self, user_id: i64) -> Result<Vec<ProviderRecord>, StoreError> {
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT user_id, provider_id, config FROM providers WHERE user_id = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(ProviderRecord {
                    user_id: row.get(0)?,
                    provider_id: row.get(1)?,
                    config: row.get(2)?,
                })
            })?;
            let mut providers = Vec::new();
            for row in rows {
                providers.push(row?);
            }
            Ok(providers)
        })
        .await
    }

    async fn save_run_state(&self, app_id: i64, state: &SavedRunState) -> Result<(), StoreError> {
        let state = state.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE apps \
                 SET saved_specification = ?1, saved_config = ?2, saved_run = ?3, updated_at = ?4 \
                 WHERE id = ?5",
                params![state.specification, state.config, state.run_id, now_millis(), app_id],
            )?;
            if changed == 0 {
                return Err(StoreError::AppNotFound { id: app_id });
            }
            Ok(())
        })
        .await
    }

    async fn identity_for_session(&self, token: &str) -> Result<Option<Identity>, StoreError> {
        let token = token.to_string();
        self.blocking(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT provider_id FROM sessions WHERE token = ?1",
                    params![token],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .map(Identity::new))
        })
        .await
    }
}

fn upsert_user(conn: &Connection, username: &str, provider_id: &str) -> Result<User, StoreError> {
    conn.execute(
        "INSERT INTO users (username, provider_id) VALUES (?1, ?2) \
         ON CONFLICT(username) DO UPDATE SET provider_id = excluded.provider_id",
        params![username, provider_id],
    )?;
    user_by_username(conn, username)?.ok_or_else(|| StoreError::UnknownUser(username.to_string()))
}

fn user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, username, provider_id FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()?)
}

fn upsert_session(conn: &Connection, token: &str, provider_id: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO sessions (token, provider_id, created_at) VALUES (?1, ?2, ?3) \
         ON CONFLICT(token) DO UPDATE SET provider_id = excluded.provider_id",
        params![token, provider_id, now_millis()],
    )?;
    Ok(())
}

fn insert_app(conn: &Connection, app: &NewApp) -> Result<App, StoreError> {
    let now = now_millis();
    conn.execute(
        "INSERT INTO apps (\
            s_id, name, user_id, visibility, backend_project_id,\
            saved_specification, saved_config, saved_run, created_at, updated_at\
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            app.s_id,
            app.name,
            app.user_id,
            app.visibility.as_str(),
            app.backend_project_id,
            app.saved_specification,
            app.saved_config,
            app.saved_run,
            now,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    let sql = format!("SELECT {APP_COLUMNS} FROM apps WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], app_from_row)?)
}

fn upsert_provider(conn: &Connection, user_id: i64, provider_id: &str, config: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO providers (user_id, provider_id, config) VALUES (?1, ?2, ?3) \
         ON CONFLICT(user_id, provider_id) DO UPDATE SET config = excluded.config",
        params![user_id, provider_id, config],
    )?;
    Ok(())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        provider_id: row.get(2)?,
    })
}

fn app_from_row(row: &Row<'_>) -> rusqlite::Result<App> {
    let visibility: String = row.get(4)?;
    let visibility = visibility
        .parse::<Visibility>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(App {
        id: row.get(0)?,
        s_id: row.get(1)?,
        name: row.get(2)?,
        user_id: row.get(3)?,
        visibility,
        backend_project_id: row.get(5)?,
        saved_specification: row.get(6)?,
        saved_config: row.get(7)?,
        saved_run: row.get(8)?,
        created_at: from_millis(row.get(9)?),
        updated_at: from_millis(row.get(10)?),
    })
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
