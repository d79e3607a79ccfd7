//! Utility helpers shared across the blockrun crates.

pub mod interpolation;
pub mod path_processing;
pub mod text_processing;

pub use interpolation::{InterpolationError, interpolate_string};
pub use path_processing::{blockrun_config_dir, expand_tilde};
pub use text_processing::{redact_json, redact_sensitive};
