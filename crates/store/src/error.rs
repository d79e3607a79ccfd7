use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("app {id} does not exist")]
    AppNotFound { id: i64 },
    #[error("unknown user '{0}'")]
    UnknownUser(String),
}

impl StoreError {
    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Io(_) => "io",
            Self::Poisoned => "poisoned",
            Self::Join(_) => "join",
            Self::Serde(_) => "serde",
            Self::AppNotFound { .. } => "app_not_found",
            Self::UnknownUser(_) => "unknown_user",
        }
    }
}
