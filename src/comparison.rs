use std::collections::BTreeSet;

use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::EffectiveConfig;

/// Leaf equality rule: numbers compare as f64 within epsilon so that `5`
/// and `5.0` reconcile; everything else compares strictly.
pub fn scalars_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(na), Value::Number(nb)) => match (na.as_f64(), nb.as_f64()) {
            (Some(da), Some(db)) => (da - db).abs() < f64::EPSILON,
            _ => na == nb,
        },
        _ => a == b,
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Recursive structural equality with path-aware exclusions. An ignored
/// sub-path is always equal, regardless of either side's value — presence
/// versus absence included. `Null` and an absent key are the same
/// "undefined" state on both sides.
fn equal_at(a: Option<&Value>, b: Option<&Value>, path: &str, ignore: &[String]) -> bool {
    if !path.is_empty() && ignore.iter().any(|p| p == path) {
        return true;
    }
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Object(map_a), Value::Object(map_b)) => {
                let keys: BTreeSet<&String> = map_a.keys().chain(map_b.keys()).collect();
                keys.into_iter()
                    .all(|key| equal_at(map_a.get(key), map_b.get(key), &join(path, key), ignore))
            }
            (Value::Array(items_a), Value::Array(items_b)) => {
                items_a.len() == items_b.len()
                    && items_a.iter().zip(items_b).enumerate().all(|(i, (va, vb))| {
                        equal_at(Some(va), Some(vb), &join(path, &i.to_string()), ignore)
                    })
            }
            _ => scalars_equal(a, b),
        },
        _ => false,
    }
}

pub fn records_equal(a: &Value, b: &Value, ignore_paths: &[String]) -> bool {
    equal_at(Some(a), Some(b), "", ignore_paths)
}

/// Outcome of reconciling the expected and actual proposal sets.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub matches: bool,
    pub matched_count: usize,
    pub matched: Vec<Value>,
    pub missing_in_actual: Vec<Value>,
    pub unexpected_in_actual: Vec<Value>,
}

/// One-to-one reconciliation under the config's ignore paths. Greedy
/// pairing suffices: the predicate is an equivalence relation, so the
/// missing/unexpected counts are invariant to which maximal matching is
/// chosen.
pub fn compare(expected: &[Value], actual: &[Value], config: &EffectiveConfig) -> ComparisonResult {
    let mut used = vec![false; actual.len()];
    let mut matched = Vec::new();
    let mut missing_in_actual = Vec::new();

    for candidate in expected {
        let hit = actual
            .iter()
            .enumerate()
            .find(|(i, record)| !used[*i] && records_equal(candidate, record, &config.ignore_paths));
        match hit {
            Some((i, _)) => {
                used[i] = true;
                matched.push(candidate.clone());
            }
            None => missing_in_actual.push(candidate.clone()),
        }
    }

    let unexpected_in_actual = actual
        .iter()
        .zip(&used)
        .filter(|(_, taken)| !**taken)
        .map(|(record, _)| record.clone())
        .collect_vec();

    let matches = missing_in_actual.is_empty() && unexpected_in_actual.is_empty();
    debug!(
        expected = expected.len(),
        actual = actual.len(),
        matched = matched.len(),
        "compared proposal sets"
    );
    ComparisonResult {
        matches,
        matched_count: matched.len(),
        matched,
        missing_in_actual,
        unexpected_in_actual,
    }
}
