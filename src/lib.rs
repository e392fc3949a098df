pub mod errors;
pub mod context;
pub mod dotpath;
pub mod variables;
pub mod expression;
pub mod transformers;
pub mod config;
pub mod normalize;
pub mod apply;
pub mod comparison;
pub mod verdict;

use serde_json::Value;

use config::ValidationConfig;
use context::Context;
use transformers::TransformerRegistry;
use variables::VariableRegistry;

/// The main engine: owns the variable and transformer registries plus the
/// system-default configuration layer, and exposes the template and grading
/// pipelines. Every operation is a pure function of its inputs and the
/// injected context.
pub struct Engine {
    variables: VariableRegistry,
    transformers: TransformerRegistry,
    global: ValidationConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_variables(VariableRegistry::with_builtins())
    }

    /// Build an engine around a caller-assembled variable registry (e.g.
    /// with custom variables registered on top of the built-ins).
    pub fn with_variables(variables: VariableRegistry) -> Self {
        Self {
            transformers: TransformerRegistry::new(variables.clone()),
            variables,
            global: config::default_global(),
        }
    }

    /// Replace the system-default configuration layer.
    pub fn with_global_config(mut self, global: ValidationConfig) -> Self {
        self.global = global;
        self
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn transformers(&self) -> &TransformerRegistry {
        &self.transformers
    }

    /// Expand template tokens inside `input`; see `expression::process`.
    pub fn process_template(&self, input: &str, ctx: &Context) -> expression::ProcessOutcome {
        expression::process(input, &self.variables, ctx)
    }

    /// Merge the configuration layers on top of this engine's global layer.
    pub fn merged_config(
        &self,
        dataset: Option<&ValidationConfig>,
        record: Option<&ValidationConfig>,
    ) -> config::EffectiveConfig {
        config::merge(&self.global, dataset, record)
    }

    /// Project raw records into canonical proposals.
    pub fn normalize_all(&self, raw: &[Value], config: &config::EffectiveConfig) -> Vec<Value> {
        normalize::normalize_all(raw, config)
    }

    /// Run the configuration's transformer map over `proposals`;
    /// `counterpart` is the other side's record set for `actual`/`expected`
    /// condition targets.
    pub fn apply_transformers(
        &self,
        proposals: &[Value],
        config: &config::EffectiveConfig,
        counterpart: Option<&[Value]>,
        ctx: &Context,
    ) -> Vec<Value> {
        apply::apply(proposals, config, &self.transformers, counterpart, ctx)
    }

    /// Reconcile two normalized proposal sets under the configuration's
    /// ignore paths.
    pub fn compare(
        &self,
        expected: &[Value],
        actual: &[Value],
        config: &config::EffectiveConfig,
    ) -> comparison::ComparisonResult {
        comparison::compare(expected, actual, config)
    }

    /// Grade `actual` against `expected` under the merged configuration.
    /// Never fails; see `verdict::grade`.
    pub fn grade(
        &self,
        expected: Option<&Value>,
        dataset: Option<&ValidationConfig>,
        actual: &Value,
        ctx: &Context,
    ) -> verdict::Verdict {
        verdict::grade(expected, dataset, actual, &self.transformers, &self.global, ctx)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience: grade with the built-in registries and default global
/// configuration.
pub fn grade(
    expected: Option<&Value>,
    dataset: Option<&ValidationConfig>,
    actual: &Value,
    ctx: &Context,
) -> verdict::Verdict {
    Engine::new().grade(expected, dataset, actual, ctx)
}

/// Re-export the most-used types for consumers of the engine.
pub use comparison::ComparisonResult;
pub use config::{EffectiveConfig, NormalizationRule, TransformerRef};
pub use expression::{ProcessOutcome, TemplateMatch};
pub use transformers::{Condition, ConditionTarget, Strategy, TransformAction};
pub use variables::Evaluation;
pub use verdict::Verdict;
