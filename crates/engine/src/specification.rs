//! Specification materialization.
//!
//! The design document a client submits is a JSON list of blocks. Before it
//! goes to the backend it is rendered into block text with every `data` block
//! pinned to the dataset version of the request's snapshot.

use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use blockrun_types::{BlockConfig, BlockKind, DatasetSnapshot};

use crate::error::SpecificationError;

/// Renders a design document into a backend-ready specification.
pub trait SpecificationSerializer: Send + Sync {
    fn serialize(
        &self,
        specification: &str,
        config: &BlockConfig,
        snapshot: &DatasetSnapshot,
    ) -> Result<String, SpecificationError>;
}

#[derive(Debug, Deserialize)]
struct SpecBlock {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    #[serde(default)]
    spec: JsonMap<String, JsonValue>,
}

/// Default serializer producing `<type> <NAME> { key: value ... }` blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockSpecificationSerializer;

impl SpecificationSerializer for BlockSpecificationSerializer {
    fn serialize(
        &self,
        specification: &str,
        _config: &BlockConfig,
        snapshot: &DatasetSnapshot,
    ) -> Result<String, SpecificationError> {
        let blocks: Vec<SpecBlock> =
            serde_json::from_str(specification).map_err(|e| SpecificationError::Malformed(e.to_string()))?;

        let mut out = String::new();
        for (index, block) in blocks.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(&format!("{} {} {{\n", block.kind, block.name));

            if BlockKind::from(block.kind.as_str()) == BlockKind::Data {
                let dataset = dataset_name(&block.spec).ok_or_else(|| SpecificationError::UnboundDataBlock {
                    block: block.name.clone(),
                })?;
                let hash = snapshot
                    .hash_for(dataset)
                    .ok_or_else(|| SpecificationError::UnknownDataset {
                        block: block.name.clone(),
                        dataset: dataset.to_string(),
                    })?;
                out.push_str(&format!("  dataset_id: {dataset}\n  hash: {hash}\n"));
            } else {
                for (key, value) in &block.spec {
                    render_field(&mut out, key, value);
                }
            }

            out.push_str("}\n");
        }

        Ok(out)
    }
}

fn dataset_name(spec: &JsonMap<String, JsonValue>) -> Option<&str> {
    spec.get("dataset_id")
        .or_else(|| spec.get("dataset"))
        .and_then(JsonValue::as_str)
        .filter(|name| !name.is_empty())
}

fn render_field(out: &mut String, key: &str, value: &JsonValue) {
    match value {
        JsonValue::Null => {}
        JsonValue::String(text) if text.contains('\n') => {
            out.push_str(&format!("  {key}:\n```\n{text}\n```\n"));
        }
        JsonValue::String(text) => out.push_str(&format!("  {key}: {text}\n")),
        // Numbers and booleans print bare, structured values as compact JSON.
        _ => out.push_str(&format!("  {key}: {value}\n")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> DatasetSnapshot {
        let mut snapshot = DatasetSnapshot::new();
        snapshot.insert("ds1", "h2");
        snapshot
    }

    #[test]
    fn renders_blocks_with_pinned_datasets() {
        let document = r#"[
            {"type": "input", "name": "in", "spec": {}},
            {"type": "data", "name": "EXAMPLES", "spec": {"dataset_id": "ds1"}},
            {"type": "llm", "name": "MODEL", "spec": {"temperature": 0.7, "prompt": "a\nb", "stop": ["\n"], "few_shot": null}}
        ]"#;

        let rendered = BlockSpecificationSerializer
            .serialize(document, &BlockConfig::default(), &snapshot())
            .expect("serialize");

        let expected = concat!(
            "input in {\n",
            "}\n",
            "\n",
            "data EXAMPLES {\n",
            "  dataset_id: ds1\n",
            "  hash: h2\n",
            "}\n",
            "\n",
            "llm MODEL {\n",
            "  temperature: 0.7\n",
            "  prompt:\n",
            "```\n",
            "a\n",
            "b\n",
            "```\n",
            "  stop: [\"\\n\"]\n",
            "}\n",
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn data_block_outside_snapshot_is_rejected() {
        let document = r#"[{"type": "data", "name": "D", "spec": {"dataset_id": "missing"}}]"#;
        let err = BlockSpecificationSerializer
            .serialize(document, &BlockConfig::default(), &snapshot())
            .unwrap_err();
        assert_eq!(
            err,
            SpecificationError::UnknownDataset {
                block: "D".into(),
                dataset: "missing".into()
            }
        );
    }

    #[test]
    fn unbound_data_block_and_bad_documents_are_rejected() {
        let unbound = BlockSpecificationSerializer.serialize(
            r#"[{"type": "data", "name": "D"}]"#,
            &BlockConfig::default(),
            &snapshot(),
        );
        assert!(matches!(unbound, Err(SpecificationError::UnboundDataBlock { .. })));

        let malformed = BlockSpecificationSerializer.serialize("{}", &BlockConfig::default(), &snapshot());
        assert!(matches!(malformed, Err(SpecificationError::Malformed(_))));
    }

    #[test]
    fn empty_document_renders_nothing() {
        let rendered = BlockSpecificationSerializer
            .serialize("[]", &BlockConfig::default(), &DatasetSnapshot::new())
            .expect("serialize");
        assert!(rendered.is_empty());
    }
}
