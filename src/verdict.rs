use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::apply;
use crate::comparison::{self, ComparisonResult};
use crate::config::{self, ValidationConfig};
use crate::context::Context;
use crate::errors::{EngineError, Result};
use crate::normalize;
use crate::transformers::TransformerRegistry;

pub const VERDICT_KEY: &str = "proposal-validation";
pub const COMPARISON_METHOD: &str = "normalized-structural-match";

/// Payload handed to the surrounding harness alongside the score.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerdictValue {
    pub expected_proposal_count: usize,
    pub actual_proposal_count: usize,
    pub matched_proposals: Vec<Value>,
    pub missing_proposals: Vec<Value>,
    pub unexpected_proposals: Vec<Value>,
    pub comparison_method: String,
}

/// The single object the harness consumes. The terse `comment` is
/// machine-shaped; rich rendering is an external presentation concern.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Verdict {
    pub key: String,
    pub score: u8,
    pub comment: String,
    pub value: VerdictValue,
}

impl Verdict {
    fn failure(comment: String, actual_count: usize) -> Self {
        Self {
            key: VERDICT_KEY.to_string(),
            score: 0,
            comment,
            value: VerdictValue {
                expected_proposal_count: 0,
                actual_proposal_count: actual_count,
                matched_proposals: Vec::new(),
                missing_proposals: Vec::new(),
                unexpected_proposals: Vec::new(),
                comparison_method: COMPARISON_METHOD.to_string(),
            },
        }
    }
}

/// Coerce a payload into a record list: one object, an array of records, or
/// nothing.
fn records_of(value: &Value, side: &str) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.clone()),
        Value::Object(_) => Ok(vec![value.clone()]),
        other => Err(EngineError::Input(format!(
            "{side} payload must be an object or array, got {other}"
        ))),
    }
}

fn count_records(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(_) => 1,
        _ => 0,
    }
}

/// Pull per-record override keys (`transformers`, `ignorePaths`,
/// `normalization`) off the expected records into the record-layer config.
/// For each field, the first record defining it wins; the keys are stripped
/// from every record so they never reach normalization.
fn extract_record_overrides(records: &mut [Value]) -> Result<Option<ValidationConfig>> {
    let mut layer = ValidationConfig::default();
    let mut found = false;
    for record in records.iter_mut() {
        let Some(map) = record.as_object_mut() else {
            continue;
        };
        if let Some(raw) = map.remove("transformers") {
            if layer.transformers.is_none() {
                layer.transformers = Some(serde_json::from_value(raw).map_err(|e| {
                    EngineError::Config(format!("per-record transformers override: {e}"))
                })?);
                found = true;
            }
        }
        if let Some(raw) = map.remove("ignorePaths") {
            if layer.ignore_paths.is_none() {
                layer.ignore_paths = Some(serde_json::from_value(raw).map_err(|e| {
                    EngineError::Config(format!("per-record ignorePaths override: {e}"))
                })?);
                found = true;
            }
        }
        if let Some(raw) = map.remove("normalization") {
            if layer.normalization.is_none() {
                layer.normalization = Some(serde_json::from_value(raw).map_err(|e| {
                    EngineError::Config(format!("per-record normalization override: {e}"))
                })?);
                found = true;
            }
        }
    }
    Ok(found.then_some(layer))
}

fn summarize(result: &ComparisonResult, expected_count: usize) -> String {
    if result.matches {
        return format!(
            "all {expected_count} expected proposal(s) matched the actual output"
        );
    }
    format!(
        "{} of {} expected proposal(s) matched; {} missing from actual output; {} unexpected in actual output",
        result.matched_count,
        expected_count,
        result.missing_in_actual.len(),
        result.unexpected_in_actual.len()
    )
}

fn grade_inner(
    expected: &Value,
    dataset: Option<&ValidationConfig>,
    actual: &Value,
    registry: &TransformerRegistry,
    global: &ValidationConfig,
    ctx: &Context,
) -> Result<Verdict> {
    let mut expected_records = records_of(expected, "expected")?;
    let actual_records = records_of(actual, "actual")?;

    let record_layer = extract_record_overrides(&mut expected_records)?;
    let effective = config::merge(global, dataset, record_layer.as_ref());
    debug!(
        transformers = effective.transformers.len(),
        ignore_paths = effective.ignore_paths.len(),
        "merged effective configuration"
    );

    let expected_normalized = normalize::normalize_all(&expected_records, &effective);
    let actual_normalized = normalize::normalize_all(&actual_records, &effective);

    // Default-fill the expected side only; the actual side is evidence and
    // must not be repaired before comparison.
    let expected_final = apply::apply(
        &expected_normalized,
        &effective,
        registry,
        Some(&actual_normalized),
        ctx,
    );

    let result = comparison::compare(&expected_final, &actual_normalized, &effective);
    let expected_count = expected_final.len();
    Ok(Verdict {
        key: VERDICT_KEY.to_string(),
        score: u8::from(result.matches),
        comment: summarize(&result, expected_count),
        value: VerdictValue {
            expected_proposal_count: expected_count,
            actual_proposal_count: actual_normalized.len(),
            matched_proposals: result.matched,
            missing_proposals: result.missing_in_actual,
            unexpected_proposals: result.unexpected_in_actual,
            comparison_method: COMPARISON_METHOD.to_string(),
        },
    })
}

/// Grade the actual output against the expectation. Never fails: a missing
/// expectation or any internal error degrades to a score-0 verdict with an
/// explanatory comment.
pub fn grade(
    expected: Option<&Value>,
    dataset: Option<&ValidationConfig>,
    actual: &Value,
    registry: &TransformerRegistry,
    global: &ValidationConfig,
    ctx: &Context,
) -> Verdict {
    let expected = match expected {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) if items.is_empty() => None,
        Some(value) => Some(value),
    };
    let Some(expected) = expected else {
        return Verdict::failure(
            "no expected proposals were supplied for this example".to_string(),
            count_records(actual),
        );
    };
    match grade_inner(expected, dataset, actual, registry, global, ctx) {
        Ok(verdict) => verdict,
        Err(error) => Verdict::failure(
            format!("comparison failed: {error}"),
            count_records(actual),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VariableRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn grade_default(expected: Option<&Value>, actual: &Value) -> Verdict {
        let registry = TransformerRegistry::new(VariableRegistry::with_builtins());
        let ctx = Context::from_ymd(2024, 9, 18).unwrap();
        grade(expected, None, actual, &registry, &config::default_global(), &ctx)
    }

    #[test]
    fn missing_expectation_scores_zero_without_error() {
        let actual = json!([{"changeType": "change"}]);
        for expected in [None, Some(json!(null)), Some(json!([]))] {
            let verdict = grade_default(expected.as_ref(), &actual);
            assert_eq!(verdict.score, 0);
            assert!(verdict.comment.contains("no expected proposals"));
            assert_eq!(verdict.value.actual_proposal_count, 1);
        }
    }

    #[test]
    fn malformed_override_degrades_to_reportable_verdict() {
        let expected = json!([{
            "changeType": "change",
            "changedField": "salary",
            "transformers": "not-a-map"
        }]);
        let verdict = grade_default(Some(&expected), &json!([]));
        assert_eq!(verdict.score, 0);
        assert!(verdict.comment.contains("comparison failed"));
        assert!(verdict.comment.contains("invalid configuration"));
    }

    #[test]
    fn scalar_payload_is_an_input_error_not_a_panic() {
        let verdict = grade_default(Some(&json!([{"changeType": "change"}])), &json!(42));
        assert_eq!(verdict.score, 0);
        assert!(verdict.comment.contains("invalid input"));
    }

    #[test]
    fn single_object_expectation_is_accepted() {
        let record = json!({"changeType": "creation", "newValue": "x", "relatedUserId": "u1"});
        let verdict = grade_default(Some(&record), &json!([record.clone()]));
        assert_eq!(verdict.score, 1);
        assert_eq!(verdict.value.expected_proposal_count, 1);
        assert_eq!(verdict.value.comparison_method, COMPARISON_METHOD);
    }
}
