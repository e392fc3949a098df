use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::variables::{utc_midnight, VariableRegistry};

/// Keys of this form synthesize a transformer from the suffix expression,
/// e.g. `transformer-template-currentMonth+1`.
pub const TEMPLATE_KEY_PREFIX: &str = "transformer-template-";

/// When a transformer is allowed to write its target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Write only when the field is currently undefined.
    #[default]
    AddMissingOnly,
    /// Always (re)write.
    TransformAlways,
    /// Write only when a value is already present.
    TransformExisting,
}

/// Which record a transformer's guard condition is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionTarget {
    /// The record being transformed.
    #[default]
    #[serde(rename = "self")]
    SelfRecord,
    /// The same-index record on the actual side.
    Actual,
    /// The same-index record on the expected side.
    Expected,
}

/// Scalar-or-array condition operand; an array OR-matches any element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

impl OneOrMany {
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        match self {
            OneOrMany::Many(values) => values.iter(),
            OneOrMany::One(value) => std::slice::from_ref(value).iter(),
        }
    }
}

/// Guard condition on one dot-path of the condition-target record. All
/// specified sub-conditions are AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
}

/// The closed set of value producers/mutators a transformer can perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformAction {
    /// The context date at UTC midnight.
    TodayUtcMidnight,
    /// Trim and lowercase strings; other values pass through.
    NormalizeText,
    /// An empty collection.
    EmptyList,
    /// Re-evaluate the expression against the caller's context and take its
    /// data value.
    Template(String),
}

impl TransformAction {
    pub fn run(&self, current: &Value, variables: &VariableRegistry, ctx: &Context) -> Value {
        match self {
            TransformAction::TodayUtcMidnight => Value::String(utc_midnight(&ctx.current_date)),
            TransformAction::NormalizeText => match current {
                Value::String(s) => Value::String(s.trim().to_lowercase()),
                other => other.clone(),
            },
            TransformAction::EmptyList => Value::Array(Vec::new()),
            // Unresolvable at apply time degrades to a no-op.
            TransformAction::Template(expression) => variables
                .evaluate_expression(expression, ctx)
                .map(|e| e.data_value)
                .unwrap_or_else(|| current.clone()),
        }
    }
}

/// Inline transformer definition as it appears in configuration maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformerSpec {
    pub action: TransformAction,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
    #[serde(default)]
    pub condition_target: ConditionTarget,
}

/// A registered transformer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformerDef {
    pub key: String,
    pub action: TransformAction,
    pub strategy: Strategy,
    pub when: Option<Condition>,
    pub condition_target: ConditionTarget,
}

impl TransformerDef {
    pub fn from_spec(key: impl Into<String>, spec: TransformerSpec) -> Self {
        Self {
            key: key.into(),
            action: spec.action,
            strategy: spec.strategy,
            when: spec.when,
            condition_target: spec.condition_target,
        }
    }

    fn builtin(
        key: &'static str,
        action: TransformAction,
        strategy: Strategy,
        when: Option<Condition>,
        condition_target: ConditionTarget,
    ) -> (&'static str, Arc<Self>) {
        (
            key,
            Arc::new(Self {
                key: key.to_string(),
                action,
                strategy,
                when,
                condition_target,
            }),
        )
    }
}

/// Process-wide transformer table: static entries plus the lazily
/// synthesized `transformer-template-*` family. Entries are never mutated or
/// removed; synthesized insertion is an idempotent upsert.
pub struct TransformerRegistry {
    variables: VariableRegistry,
    statics: HashMap<&'static str, Arc<TransformerDef>>,
    synthesized: RwLock<HashMap<String, Arc<TransformerDef>>>,
}

impl TransformerRegistry {
    pub fn new(variables: VariableRegistry) -> Self {
        let statics = HashMap::from([
            TransformerDef::builtin(
                "default-today",
                TransformAction::TodayUtcMidnight,
                Strategy::AddMissingOnly,
                None,
                ConditionTarget::SelfRecord,
            ),
            TransformerDef::builtin(
                "default-today-for-change",
                TransformAction::TodayUtcMidnight,
                Strategy::AddMissingOnly,
                Some(Condition {
                    path: "changeType".to_string(),
                    equals: Some(OneOrMany::One(Value::String("change".to_string()))),
                    not_equals: None,
                    exists: None,
                }),
                ConditionTarget::Actual,
            ),
            TransformerDef::builtin(
                "normalize-text",
                TransformAction::NormalizeText,
                Strategy::TransformAlways,
                None,
                ConditionTarget::SelfRecord,
            ),
            TransformerDef::builtin(
                "default-empty-list",
                TransformAction::EmptyList,
                Strategy::AddMissingOnly,
                None,
                ConditionTarget::SelfRecord,
            ),
        ]);
        Self {
            variables,
            statics,
            synthesized: RwLock::new(HashMap::new()),
        }
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Static lookup, falling back to on-demand synthesis for
    /// `transformer-template-<expression>` keys. Unknown keys and invalid
    /// template suffixes yield `None`.
    pub fn get(&self, key: &str) -> Option<Arc<TransformerDef>> {
        if let Some(def) = self.statics.get(key) {
            return Some(Arc::clone(def));
        }
        let expression = key.strip_prefix(TEMPLATE_KEY_PREFIX)?;
        if let Some(hit) = self.synthesized.read().ok()?.get(key) {
            return Some(Arc::clone(hit));
        }
        // Reachability probe: the suffix must resolve against a throwaway
        // "now" context before a definition is synthesized.
        self.variables.evaluate_expression(expression, &Context::now())?;
        debug!(key, "synthesizing template transformer");
        let def = Arc::new(TransformerDef {
            key: key.to_string(),
            action: TransformAction::Template(expression.to_string()),
            strategy: Strategy::AddMissingOnly,
            when: None,
            condition_target: ConditionTarget::SelfRecord,
        });
        let mut cache = self.synthesized.write().ok()?;
        // First writer wins; a duplicate insert would be equivalent anyway.
        Some(Arc::clone(cache.entry(key.to_string()).or_insert(def)))
    }

    /// Snapshot of every registered transformer, statics first.
    pub fn get_all(&self) -> Vec<Arc<TransformerDef>> {
        let mut all: Vec<Arc<TransformerDef>> = self.statics.values().cloned().collect();
        if let Ok(cache) = self.synthesized.read() {
            all.extend(cache.values().cloned());
        }
        all
    }
}
