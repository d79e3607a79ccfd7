//! Caller identification for incoming requests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};

use blockrun_store::{AppStore, StoreError};
use blockrun_types::Identity;

pub const SESSION_COOKIE: &str = "blockrun_session";

/// Resolves the identity behind a request, if any.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, StoreError>;
}

/// Looks up session tokens in the store.
///
/// The token comes from an `Authorization: Bearer` header, or failing that
/// from the [`SESSION_COOKIE`] cookie. Unknown tokens are anonymous callers.
pub struct SessionResolver {
    store: Arc<dyn AppStore>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn AppStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityResolver for SessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Identity>, StoreError> {
        match session_token(headers) {
            Some(token) => self.store.identity_for_session(token).await,
            None => Ok(None),
        }
    }
}

pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, token)| *name == SESSION_COOKIE && !token.is_empty())
        .map(|(_, token)| token)
}
