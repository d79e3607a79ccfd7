//! Block configuration documents submitted alongside a run.
//!
//! The configuration is a JSON object keyed by block name whose values carry a
//! `type` discriminant plus block-specific settings. It is forwarded to the
//! backend verbatim; the typed view here only exists so callers can search it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Kind of a configured block, read from its `type` field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Input,
    Data,
    Code,
    Llm,
    Chat,
    Map,
    Reduce,
    While,
    End,
    Search,
    Curl,
    Browser,
    /// A kind this crate has no dedicated variant for.
    Other(String),
}

impl BlockKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Input => "input",
            Self::Data => "data",
            Self::Code => "code",
            Self::Llm => "llm",
            Self::Chat => "chat",
            Self::Map => "map",
            Self::Reduce => "reduce",
            Self::While => "while",
            Self::End => "end",
            Self::Search => "search",
            Self::Curl => "curl",
            Self::Browser => "browser",
            Self::Other(kind) => kind.as_str(),
        }
    }
}

impl From<&str> for BlockKind {
    fn from(value: &str) -> Self {
        match value {
            "input" => Self::Input,
            "data" => Self::Data,
            "code" => Self::Code,
            "llm" => Self::Llm,
            "chat" => Self::Chat,
            "map" => Self::Map,
            "reduce" => Self::Reduce,
            "while" => Self::While,
            "end" => Self::End,
            "search" => Self::Search,
            "curl" => Self::Curl,
            "browser" => Self::Browser,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Borrowed view over one configured block.
#[derive(Debug, Clone, Copy)]
pub struct BlockEntry<'a> {
    pub name: &'a str,
    /// `None` when the entry is not an object or carries no string `type`.
    pub kind: Option<&'a str>,
    pub settings: &'a JsonValue,
}

impl BlockEntry<'_> {
    pub fn block_kind(&self) -> Option<BlockKind> {
        self.kind.map(BlockKind::from)
    }
}

/// The dataset binding of the configuration's `input` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    pub block: String,
    /// Dataset name the input block reads from, when bound.
    pub dataset: Option<String>,
}

/// Parsed block configuration, preserving author order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockConfig(IndexMap<String, JsonValue>);

impl BlockConfig {
    /// Parse configuration text. Anything other than a JSON object is rejected.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = BlockEntry<'_>> {
        self.0.iter().map(|(name, settings)| BlockEntry {
            name: name.as_str(),
            kind: settings.get("type").and_then(JsonValue::as_str),
            settings,
        })
    }

    /// Find the first block of kind `input`, if any. Absence is a valid "no input" run.
    pub fn input_binding(&self) -> Option<InputBinding> {
        self.entries()
            .find(|entry| entry.block_kind() == Some(BlockKind::Input))
            .map(|entry| InputBinding {
                block: entry.name.to_string(),
                dataset: entry
                    .settings
                    .get("dataset")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_binding_reads_dataset_of_first_input_block() {
        let config =
            BlockConfig::parse(r#"{"MODEL":{"type":"llm"},"INPUT":{"type":"input","dataset":"questions"}}"#)
                .expect("parse config");

        let binding = config.input_binding().expect("input block present");
        assert_eq!(binding.block, "INPUT");
        assert_eq!(binding.dataset.as_deref(), Some("questions"));
    }

    #[test]
    fn missing_input_block_yields_none() {
        let config = BlockConfig::parse(r#"{"MODEL":{"type":"llm"},"odd":42}"#).expect("parse config");
        assert!(config.input_binding().is_none());
    }

    #[test]
    fn unbound_input_block_has_no_dataset() {
        let config = BlockConfig::parse(r#"{"in":{"type":"input"}}"#).expect("parse config");
        let binding = config.input_binding().expect("input block present");
        assert_eq!(binding.dataset, None);
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(BlockConfig::parse("[1,2]").is_err());
        assert!(BlockConfig::parse("\"in\"").is_err());
    }

    #[test]
    fn unknown_kinds_are_preserved() {
        assert_eq!(BlockKind::from("vision"), BlockKind::Other("vision".into()));
        assert_eq!(BlockKind::from("curl").as_str(), "curl");
    }
}
