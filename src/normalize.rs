use serde_json::{Map, Value};

use crate::config::{EffectiveConfig, LITERAL_SENTINEL};
use crate::dotpath;

/// Determine the discriminator of a raw proposal: an explicit `changeType`
/// wins; otherwise a record carrying a `changedField` key is a change and
/// everything else is a creation.
pub fn discriminator_of(raw: &Value) -> String {
    if let Some(change_type) = raw.get("changeType").and_then(Value::as_str) {
        return change_type.to_string();
    }
    if raw.get("changedField").is_some() {
        "change".to_string()
    } else {
        "creation".to_string()
    }
}

/// Project a loosely-typed raw record into the canonical field set declared
/// by the matching normalization rule. The output has exactly the rule's
/// fields: unmapped sources project as `Null`, raw-record-only keys never
/// leak through. Without a matching rule the raw object's own fields are
/// shallow-copied.
pub fn normalize(raw: &Value, config: &EffectiveConfig) -> Value {
    let discriminator = discriminator_of(raw);
    let Some(rule) = config
        .normalization
        .iter()
        .find(|rule| rule.when == discriminator)
    else {
        return match raw {
            Value::Object(map) => Value::Object(map.clone()),
            other => other.clone(),
        };
    };

    let mut out = Map::new();
    for (output_field, source) in &rule.fields {
        let value = if source == LITERAL_SENTINEL {
            Value::String(discriminator.clone())
        } else {
            dotpath::get(raw, source).cloned().unwrap_or(Value::Null)
        };
        out.insert(output_field.clone(), value);
    }
    Value::Object(out)
}

pub fn normalize_all(raw: &[Value], config: &EffectiveConfig) -> Vec<Value> {
    raw.iter().map(|record| normalize(record, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn effective() -> EffectiveConfig {
        config::merge(&config::default_global(), None, None)
    }

    #[test]
    fn explicit_change_type_wins() {
        assert_eq!(discriminator_of(&json!({"changeType": "creation", "changedField": "x"})), "creation");
    }

    #[test]
    fn changed_field_implies_change() {
        assert_eq!(discriminator_of(&json!({"changedField": "salary"})), "change");
        assert_eq!(discriminator_of(&json!({"newValue": "a"})), "creation");
    }

    #[test]
    fn projection_has_exactly_the_declared_fields() {
        let raw = json!({
            "changedField": "salary",
            "newValue": "5000",
            "relatedUserId": "u1",
            "rawOnlyKey": "must not leak",
            "mutationQuery": {"variables": {"data": {"effectiveDate": "2024-09-18T00:00:00.000Z"}}}
        });
        let out = normalize(&raw, &effective());
        assert_eq!(
            out,
            json!({
                "changeType": "change",
                "changedField": "salary",
                "newValue": "5000",
                "relatedUserId": "u1",
                "mutationPropertyPath": null,
                "mutationVariables": {"data": {"effectiveDate": "2024-09-18T00:00:00.000Z"}}
            })
        );
    }

    #[test]
    fn missing_rule_falls_back_to_shallow_copy() {
        let raw = json!({"changeType": "archive", "anything": 1});
        let out = normalize(&raw, &effective());
        assert_eq!(out, raw);
    }
}
