use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::context::Context;
use crate::variables::{Evaluation, VariableRegistry};

/// =========================
/// Template token grammar
/// =========================
///
/// A token is `{` immediately followed by word characters, optionally
/// `+`/`-` and digits, immediately followed by `}`. No internal whitespace,
/// so `{ currentMonth }` is not a token and JSON text (`{"key": "value"}`)
/// never false-positives. Matching runs over the literal character window of
/// the pattern, not brace-pair nesting, so a well-formed token inside a
/// non-matching outer brace pair is still found.
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+(?:[+-]\d+)?)\}").expect("valid token pattern"));

/// A located, resolved occurrence of a template token. `start_index` and
/// `end_index` are byte positions valid in the fully substituted output at
/// the moment this match's own substitution has not yet been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMatch {
    pub expression: String,
    pub start_index: usize,
    pub end_index: usize,
    pub result: Evaluation,
}

/// Result of one `process` call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessOutcome {
    pub processed: String,
    pub replacements: Vec<TemplateMatch>,
    pub metadata: BTreeMap<String, Evaluation>,
}

/// Purely syntactic: does `input` contain at least one well-formed token?
pub fn has_templates(input: &str) -> bool {
    TOKEN_RE.is_match(input)
}

/// Every syntactic match's inner expression, left-to-right, duplicates
/// included. No resolution is attempted.
pub fn extract_expressions(input: &str) -> Vec<String> {
    TOKEN_RE
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Expand every resolvable token in `input`. Unresolved tokens stay
/// verbatim and produce no replacement or metadata entry.
pub fn process(input: &str, registry: &VariableRegistry, ctx: &Context) -> ProcessOutcome {
    let mut processed = String::with_capacity(input.len());
    let mut replacements = Vec::new();
    let mut metadata = BTreeMap::new();

    // Spans are found against the original string; reported spans shift by
    // the cumulative length delta of all earlier resolved matches.
    let mut delta: i64 = 0;
    let mut tail = 0;

    for token in TOKEN_RE.find_iter(input) {
        // The grammar guarantees the inner expression is the token minus its
        // single-byte braces.
        let expression = &input[token.start() + 1..token.end() - 1];
        let Some(result) = registry.evaluate_expression(expression, ctx) else {
            trace!(expression, "template expression did not resolve; left verbatim");
            continue;
        };

        let replacement = result.display_value.clone();
        replacements.push(TemplateMatch {
            expression: expression.to_string(),
            start_index: (token.start() as i64 + delta) as usize,
            end_index: (token.end() as i64 + delta) as usize,
            result: result.clone(),
        });
        metadata.insert(expression.to_string(), result);

        processed.push_str(&input[tail..token.start()]);
        processed.push_str(&replacement);
        delta += replacement.len() as i64 - token.len() as i64;
        tail = token.end();
    }
    processed.push_str(&input[tail..]);

    ProcessOutcome {
        processed,
        replacements,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn september_ctx() -> Context {
        Context::from_ymd(2024, 9, 18).unwrap()
    }

    #[test]
    fn single_token_substitution() {
        let reg = VariableRegistry::with_builtins();
        let out = process("Update salary starting {currentMonth}", &reg, &september_ctx());
        assert_eq!(out.processed, "Update salary starting September");
        assert_eq!(out.replacements.len(), 1);
        assert_eq!(out.replacements[0].expression, "currentMonth");
        assert_eq!(out.replacements[0].start_index, 23);
        assert_eq!(out.replacements[0].end_index, 37);
    }

    #[test]
    fn multi_token_spans_carry_cumulative_delta() {
        let reg = VariableRegistry::with_builtins();
        let out = process(
            "From {currentMonth} to {currentMonth+3} in year {currentYear}",
            &reg,
            &september_ctx(),
        );
        assert_eq!(out.processed, "From September to December in year 2024");
        let spans: Vec<(usize, usize)> = out
            .replacements
            .iter()
            .map(|m| (m.start_index, m.end_index))
            .collect();
        assert_eq!(spans, vec![(5, 19), (18, 34), (35, 48)]);
        assert_eq!(out.metadata.len(), 3);
        assert_eq!(out.metadata["currentMonth+3"].display_value, "December");
    }

    #[test]
    fn unresolved_token_left_verbatim_between_resolved_ones() {
        let reg = VariableRegistry::with_builtins();
        let out = process("{currentYear} {unknown} {currentYear}", &reg, &september_ctx());
        assert_eq!(out.processed, "2024 {unknown} 2024");
        assert_eq!(out.replacements.len(), 2);
        // The second resolved span only shifts by the first token's delta.
        assert_eq!(out.replacements[1].start_index, 15);
        assert_eq!(out.replacements[1].end_index, 28);
        assert!(!out.metadata.contains_key("unknown"));
    }

    #[test]
    fn whitespace_inside_braces_is_not_a_token() {
        assert!(!has_templates("{ currentMonth }"));
        assert!(has_templates("{currentMonth}"));
    }

    #[test]
    fn json_braces_do_not_false_positive() {
        let reg = VariableRegistry::with_builtins();
        let json_text = r#"{"key": "value"}"#;
        assert!(!has_templates(json_text));
        assert_eq!(process(json_text, &reg, &september_ctx()).processed, json_text);
    }

    #[test]
    fn token_nested_in_foreign_braces_is_found() {
        let reg = VariableRegistry::with_builtins();
        let out = process(r#"{"month": "{currentMonth}"}"#, &reg, &september_ctx());
        assert_eq!(out.processed, r#"{"month": "September"}"#);
        assert_eq!(out.replacements.len(), 1);
    }

    #[test]
    fn extraction_is_syntactic_and_keeps_duplicates() {
        let exprs = extract_expressions("{a} {nope+3} {a}");
        assert_eq!(exprs, vec!["a", "nope+3", "a"]);
        assert!(has_templates("{nope+3}"));
        assert!(extract_expressions("no tokens here").is_empty());
    }
}
