//! Credential assembly from stored provider configurations.
//!
//! Each provider gets its own [`CredentialDecoder`], so a broken configuration
//! only removes that provider's credentials from the map. Decoded secrets live
//! in the returned [`CredentialMap`] and nowhere else: nothing here logs or
//! stores them.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use blockrun_types::{CredentialMap, ProviderRecord};

use crate::error::CredentialError;

/// Credential name and secret pairs produced by one provider.
pub type DecodedCredentials = Vec<(String, String)>;

/// Turns one provider's stored configuration into backend credentials.
pub trait CredentialDecoder: Send + Sync {
    fn decode(&self, provider_id: &str, raw_config: &str) -> Result<DecodedCredentials, CredentialError>;
}

/// Decoder that copies string fields of a JSON config into named credentials.
#[derive(Debug, Clone, Copy)]
pub struct FieldDecoder {
    /// `(config field, credential name)` pairs; every field is required.
    fields: &'static [(&'static str, &'static str)],
}

impl FieldDecoder {
    pub const fn new(fields: &'static [(&'static str, &'static str)]) -> Self {
        Self { fields }
    }
}

impl CredentialDecoder for FieldDecoder {
    fn decode(&self, _provider_id: &str, raw_config: &str) -> Result<DecodedCredentials, CredentialError> {
        let config: JsonValue = serde_json::from_str(raw_config).map_err(|_| CredentialError::MalformedConfig)?;
        let object = config.as_object().ok_or(CredentialError::MalformedConfig)?;

        self.fields
            .iter()
            .map(|&(field, credential)| {
                object
                    .get(field)
                    .and_then(JsonValue::as_str)
                    .filter(|value| !value.is_empty())
                    .map(|value| (credential.to_string(), value.to_string()))
                    .ok_or(CredentialError::MissingField(field))
            })
            .collect()
    }
}

/// Providers understood out of the box and the credentials they yield.
const BUILTIN_DECODERS: &[(&str, FieldDecoder)] = &[
    ("openai", FieldDecoder::new(&[("api_key", "OPENAI_API_KEY")])),
    ("cohere", FieldDecoder::new(&[("api_key", "COHERE_API_KEY")])),
    ("ai21", FieldDecoder::new(&[("api_key", "AI21_API_KEY")])),
    (
        "azure_openai",
        FieldDecoder::new(&[("api_key", "AZURE_OPENAI_API_KEY"), ("endpoint", "AZURE_OPENAI_ENDPOINT")]),
    ),
    ("serpapi", FieldDecoder::new(&[("api_key", "SERP_API_KEY")])),
    ("serper", FieldDecoder::new(&[("api_key", "SERPER_API_KEY")])),
    ("browserlessapi", FieldDecoder::new(&[("api_key", "BROWSERLESS_API_KEY")])),
];

/// A provider left out of the credential map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProvider {
    pub provider_id: String,
    pub reason: CredentialError,
}

/// What happened to each provider during assembly. Holds no secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub decoded: Vec<String>,
    pub skipped: Vec<SkippedProvider>,
}

/// Registry of decoders keyed by provider id.
#[derive(Clone)]
pub struct CredentialAssembler {
    decoders: IndexMap<String, Arc<dyn CredentialDecoder>>,
}

impl CredentialAssembler {
    /// An assembler that knows no providers.
    pub fn empty() -> Self {
        Self {
            decoders: IndexMap::new(),
        }
    }

    /// Register (or replace) the decoder for `provider_id`.
    pub fn register(&mut self, provider_id: impl Into<String>, decoder: Arc<dyn CredentialDecoder>) {
        self.decoders.insert(provider_id.into(), decoder);
    }

    pub fn with_decoder(mut self, provider_id: impl Into<String>, decoder: Arc<dyn CredentialDecoder>) -> Self {
        self.register(provider_id, decoder);
        self
    }

    pub fn knows(&self, provider_id: &str) -> bool {
        self.decoders.contains_key(provider_id)
    }

    /// Build a fresh credential map from `providers`, skipping any that fail to decode.
    pub fn assemble(&self, providers: &[ProviderRecord]) -> (CredentialMap, AssemblyReport) {
        let mut credentials = CredentialMap::new();
        let mut report = AssemblyReport::default();

        for provider in providers {
            let decoded = self
                .decoders
                .get(&provider.provider_id)
                .ok_or_else(|| CredentialError::UnknownProvider(provider.provider_id.clone()))
                .and_then(|decoder| decoder.decode(&provider.provider_id, &provider.config));

            match decoded {
                Ok(pairs) => {
                    for (name, secret) in pairs {
                        credentials.insert(name, secret);
                    }
                    report.decoded.push(provider.provider_id.clone());
                }
                Err(reason) => report.skipped.push(SkippedProvider {
                    provider_id: provider.provider_id.clone(),
                    reason,
                }),
            }
        }

        (credentials, report)
    }
}

impl Default for CredentialAssembler {
    fn default() -> Self {
        let mut assembler = Self::empty();
        for (provider_id, decoder) in BUILTIN_DECODERS {
            assembler.register(*provider_id, Arc::new(*decoder));
        }
        assembler
    }
}

impl fmt::Debug for CredentialAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAssembler")
            .field("providers", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}
