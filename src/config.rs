use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transformers::TransformerSpec;

/// Source-path sentinel meaning "the discriminator value itself".
pub const LITERAL_SENTINEL: &str = "__literal__";

/// Discriminator-keyed projection used to canonicalize heterogeneous raw
/// records: `fields` maps each output field to a dot-path into the raw
/// record (or the literal sentinel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationRule {
    pub when: String,
    pub fields: BTreeMap<String, String>,
}

/// A transformer map entry: a registry key, or an inline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformerRef {
    Key(String),
    Inline(TransformerSpec),
}

/// One configuration layer. Every field is optional so that "explicitly
/// defined as empty" stays distinguishable from "not defined here" — the
/// merge relies on that distinction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization: Option<Vec<NormalizationRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformers: Option<BTreeMap<String, TransformerRef>>,
}

/// The merged configuration one evaluation runs under.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveConfig {
    pub normalization: Vec<NormalizationRule>,
    pub ignore_paths: Vec<String>,
    pub transformers: BTreeMap<String, TransformerRef>,
}

/// Combine the three configuration layers. Per field, the most specific
/// layer that explicitly defines it — including as an empty value — wins
/// wholesale; there is no per-key merge across layers. An explicit
/// `transformers: {}` at a more specific layer therefore suppresses every
/// inherited transformer.
pub fn merge(
    global: &ValidationConfig,
    dataset: Option<&ValidationConfig>,
    record: Option<&ValidationConfig>,
) -> EffectiveConfig {
    fn pick<T: Clone>(
        global: Option<&T>,
        dataset: Option<Option<&T>>,
        record: Option<Option<&T>>,
    ) -> Option<T> {
        record
            .flatten()
            .or_else(|| dataset.flatten())
            .or(global)
            .cloned()
    }

    EffectiveConfig {
        normalization: pick(
            global.normalization.as_ref(),
            dataset.map(|c| c.normalization.as_ref()),
            record.map(|c| c.normalization.as_ref()),
        )
        .unwrap_or_default(),
        ignore_paths: pick(
            global.ignore_paths.as_ref(),
            dataset.map(|c| c.ignore_paths.as_ref()),
            record.map(|c| c.ignore_paths.as_ref()),
        )
        .unwrap_or_default(),
        transformers: pick(
            global.transformers.as_ref(),
            dataset.map(|c| c.transformers.as_ref()),
            record.map(|c| c.transformers.as_ref()),
        )
        .unwrap_or_default(),
    }
}

/// System-default layer: canonical projections for change/creation proposals
/// and the effective-date default-fill keyed on the actual side.
pub fn default_global() -> ValidationConfig {
    let change_fields = BTreeMap::from([
        ("changeType".to_string(), LITERAL_SENTINEL.to_string()),
        ("changedField".to_string(), "changedField".to_string()),
        ("newValue".to_string(), "newValue".to_string()),
        ("relatedUserId".to_string(), "relatedUserId".to_string()),
        (
            "mutationPropertyPath".to_string(),
            "mutationQuery.propertyPath".to_string(),
        ),
        (
            "mutationVariables".to_string(),
            "mutationQuery.variables".to_string(),
        ),
    ]);
    let mut creation_fields = change_fields.clone();
    creation_fields.remove("changedField");

    ValidationConfig {
        normalization: Some(vec![
            NormalizationRule {
                when: "change".to_string(),
                fields: change_fields,
            },
            NormalizationRule {
                when: "creation".to_string(),
                fields: creation_fields,
            },
        ]),
        ignore_paths: Some(Vec::new()),
        transformers: Some(BTreeMap::from([(
            "mutationVariables.data.effectiveDate".to_string(),
            TransformerRef::Key("default-today-for-change".to_string()),
        )])),
    }
}

/// Parse one layer out of a loose JSON value.
pub fn from_value(value: Value) -> crate::errors::Result<ValidationConfig> {
    serde_json::from_value(value).map_err(|e| crate::errors::EngineError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn dataset_layer() -> ValidationConfig {
        from_value(json!({
            "ignorePaths": ["mutationVariables.data.effectiveDate"],
            "transformers": {
                "changedField": "normalize-text"
            }
        }))
        .unwrap()
    }

    #[test]
    fn camel_case_wire_shape() {
        let cfg = dataset_layer();
        assert_eq!(
            cfg.ignore_paths,
            Some(vec!["mutationVariables.data.effectiveDate".to_string()])
        );
        assert_eq!(
            cfg.transformers.unwrap()["changedField"],
            TransformerRef::Key("normalize-text".to_string())
        );
        // Absent field stays absent, not empty.
        assert_eq!(cfg.normalization, None);
    }

    #[test]
    fn inline_transformer_ref_parses() {
        let cfg = from_value(json!({
            "transformers": {
                "tags": {"action": "emptyList", "strategy": "addMissingOnly"}
            }
        }))
        .unwrap();
        match &cfg.transformers.unwrap()["tags"] {
            TransformerRef::Inline(spec) => {
                assert_eq!(spec.action, crate::transformers::TransformAction::EmptyList)
            }
            other => panic!("expected inline spec, got {other:?}"),
        }
    }

    #[test]
    fn more_specific_layer_wins_per_field() {
        let global = default_global();
        let dataset = dataset_layer();
        let merged = merge(&global, Some(&dataset), None);
        // Dataset defined transformers and ignorePaths; normalization is
        // inherited from the global layer.
        assert_eq!(merged.transformers.len(), 1);
        assert!(merged.transformers.contains_key("changedField"));
        assert_eq!(merged.ignore_paths.len(), 1);
        assert_eq!(merged.normalization, global.normalization.unwrap());
    }

    #[test]
    fn merge_empty_map_suppresses_inherited() {
        // Regression lock for the wholesale-replacement contract: an
        // explicit empty transformer map at the record layer yields zero
        // transformers despite non-empty global/dataset maps.
        let global = default_global();
        let dataset = dataset_layer();
        let record = from_value(json!({"transformers": {}})).unwrap();
        let merged = merge(&global, Some(&dataset), Some(&record));
        assert!(merged.transformers.is_empty());
        // Fields the record layer does not define still come from the most
        // specific layer that does.
        assert_eq!(merged.ignore_paths.len(), 1);
    }

    #[test]
    fn record_layer_beats_dataset_wholesale() {
        let global = default_global();
        let dataset = dataset_layer();
        let record = from_value(json!({
            "transformers": {"newValue": "normalize-text"}
        }))
        .unwrap();
        let merged = merge(&global, Some(&dataset), Some(&record));
        // No per-key union: the dataset's changedField entry is gone.
        assert_eq!(merged.transformers.len(), 1);
        assert!(merged.transformers.contains_key("newValue"));
    }
}
