use proposal_validation_engine as pve;

use pve::context::Context;
use pve::expression;
use pve::Engine;

fn engine() -> Engine {
    Engine::new()
}

#[test]
fn expands_current_month_inside_free_text() {
    let ctx = Context::from_ymd(2024, 9, 18).unwrap();
    let out = engine().process_template("Update salary starting {currentMonth}", &ctx);
    assert_eq!(out.processed, "Update salary starting September");
    assert_eq!(out.replacements.len(), 1);
    assert_eq!(out.replacements[0].expression, "currentMonth");
}

#[test]
fn expands_month_arithmetic_and_year() {
    let ctx = Context::from_ymd(2024, 9, 18).unwrap();
    let out = engine().process_template(
        "From {currentMonth} to {currentMonth+3} in year {currentYear}",
        &ctx,
    );
    assert_eq!(out.processed, "From September to December in year 2024");
    assert_eq!(out.replacements.len(), 3);
}

#[test]
fn year_rollover_includes_the_year_in_the_display() {
    let ctx = Context::from_ymd(2024, 12, 15).unwrap();
    let out = engine().process_template("{currentMonth+2}", &ctx);
    assert_eq!(out.processed, "February 2025");
    assert_eq!(
        out.metadata["currentMonth+2"].display_value,
        "February 2025"
    );
}

#[test]
fn metadata_records_data_values_for_downstream_consumers() {
    let ctx = Context::from_ymd(2024, 9, 18).unwrap();
    let out = engine().process_template("effective {today}", &ctx);
    assert_eq!(out.processed, "effective 2024-09-18T00:00:00.000Z");
    assert_eq!(
        out.metadata["today"].data_value,
        serde_json::json!("2024-09-18T00:00:00.000Z")
    );
}

#[test]
fn syntactic_helpers_do_not_resolve() {
    // `nope+3` is syntactically a token even though no such variable exists.
    assert!(expression::has_templates("{nope+3}"));
    assert_eq!(expression::extract_expressions("{nope+3}"), vec!["nope+3"]);

    let ctx = Context::from_ymd(2024, 9, 18).unwrap();
    let out = engine().process_template("{nope+3}", &ctx);
    assert_eq!(out.processed, "{nope+3}");
    assert!(out.replacements.is_empty());
    assert!(out.metadata.is_empty());
}
