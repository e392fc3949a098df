use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::comparison::scalars_equal;
use crate::config::{EffectiveConfig, TransformerRef};
use crate::context::Context;
use crate::dotpath;
use crate::transformers::{
    Condition, ConditionTarget, Strategy, TransformerDef, TransformerRegistry,
};

/// Evaluate a guard condition against the condition-target record. A missing
/// target or a missing path degrades to "value is undefined", never an
/// error.
pub fn evaluate_condition(condition: &Condition, target: Option<&Value>) -> bool {
    let value = target.and_then(|record| dotpath::get(record, &condition.path));
    let defined = value.is_some_and(|v| !v.is_null());
    if let Some(want) = condition.exists {
        if defined != want {
            return false;
        }
    }
    let current = value.unwrap_or(&Value::Null);
    if let Some(equals) = &condition.equals {
        if !equals.iter().any(|candidate| scalars_equal(candidate, current)) {
            return false;
        }
    }
    if let Some(not_equals) = &condition.not_equals {
        if not_equals.iter().any(|candidate| scalars_equal(candidate, current)) {
            return false;
        }
    }
    true
}

fn resolve(
    reference: &TransformerRef,
    registry: &TransformerRegistry,
) -> Option<Arc<TransformerDef>> {
    match reference {
        TransformerRef::Key(key) => registry.get(key),
        TransformerRef::Inline(spec) => {
            Some(Arc::new(TransformerDef::from_spec("<inline>", spec.clone())))
        }
    }
}

/// Walk the effective configuration's transformer map over each proposal and
/// conditionally fill/rewrite fields. Returns a new vector; the inputs are
/// never mutated. `counterpart` is the same-index record set of the other
/// side, which `Actual`/`Expected` condition targets resolve against —
/// expected-side defaults can thereby be inferred from what the system under
/// test actually produced.
pub fn apply(
    proposals: &[Value],
    config: &EffectiveConfig,
    registry: &TransformerRegistry,
    counterpart: Option<&[Value]>,
    ctx: &Context,
) -> Vec<Value> {
    proposals
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let mut working = record.clone();
            for (path, reference) in &config.transformers {
                let Some(def) = resolve(reference, registry) else {
                    // Unresolvable key: leave the record untouched.
                    debug!(?reference, %path, "transformer did not resolve; skipped");
                    continue;
                };
                let satisfied = match &def.when {
                    None => true,
                    Some(condition) => {
                        let target = match def.condition_target {
                            ConditionTarget::SelfRecord => Some(&working),
                            ConditionTarget::Actual | ConditionTarget::Expected => {
                                counterpart.and_then(|records| records.get(index))
                            }
                        };
                        evaluate_condition(condition, target)
                    }
                };
                if !satisfied {
                    continue;
                }
                let defined = dotpath::is_defined(&working, path);
                let allowed = match def.strategy {
                    Strategy::AddMissingOnly => !defined,
                    Strategy::TransformAlways => true,
                    Strategy::TransformExisting => defined,
                };
                if !allowed {
                    continue;
                }
                let current = dotpath::get(&working, path).cloned().unwrap_or(Value::Null);
                let next = def.action.run(&current, registry.variables(), ctx);
                dotpath::set(&mut working, path, next);
            }
            working
        })
        .collect()
}
