//! HTTP surface of blockrun.
//!
//! Routes map one-to-one onto [`blockrun_engine::RunOrchestrator`]
//! operations; this crate adds caller identification, status mapping, the
//! event-stream response for live runs, and configuration loading.

pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod routes;

pub use config::{ConfigError, ServerConfig, default_config_path};
pub use error::ApiError;
pub use http::{HttpServer, RunningHttpServer};
pub use identity::{IdentityResolver, SESSION_COOKIE, SessionResolver};
pub use routes::{AppState, router};
