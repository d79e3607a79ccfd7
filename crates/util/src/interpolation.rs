//! `${env:NAME}` interpolation for configuration values.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Missing environment variable: {name}")]
    MissingEnvVar { name: String },

    #[error("Invalid interpolation pattern")]
    Pattern,
}

static ENV_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\$\{env:([\w+_-]*)}").ok());

/// Interpolate a string value, replacing `${env:NAME}` patterns with the variable's value.
pub fn interpolate_string(value: &str) -> Result<String, InterpolationError> {
    let env_regex = ENV_PATTERN.as_ref().ok_or(InterpolationError::Pattern)?;

    let mut resolved = Vec::new();
    for cap in env_regex.captures_iter(value) {
        let var_name = cap[1].to_string();
        let env_value = std::env::var(&var_name).map_err(|_| InterpolationError::MissingEnvVar { name: var_name.clone() })?;
        debug!("Interpolated env var: {} -> [REDACTED]", var_name);
        resolved.push((cap[0].to_string(), env_value));
    }

    let mut result = value.to_string();
    for (pattern, replacement) in resolved {
        result = result.replace(&pattern, &replacement);
    }
    Ok(result)
}
