use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Months, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::context::Context;

/// Arithmetic expressions are `<name><op><operand>`, e.g. `currentMonth+3`.
static ARITHMETIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)([+-])(\d+)$").expect("valid arithmetic pattern"));

/// The resolved value of a variable or expression: what gets substituted
/// into text, and the underlying value transformers hand to records.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub display_value: String,
    pub data_value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
}

/// Trait for pluggable, time-context-dependent variables usable inside
/// template expressions.
pub trait Variable: Send + Sync {
    fn key(&self) -> &'static str;

    fn supports_arithmetic(&self) -> bool {
        false
    }

    fn evaluate(&self, ctx: &Context) -> Evaluation;

    /// Shift the base value by `operand`. Only called when
    /// `supports_arithmetic` is true; `None` signals an out-of-range shift.
    fn apply_arithmetic(&self, _op: ArithOp, _operand: u32, _ctx: &Context) -> Option<Evaluation> {
        None
    }
}

/// Thread-safe variable registry. Append-only: entries are registered at
/// startup and never mutated or removed.
#[derive(Clone, Default)]
pub struct VariableRegistry {
    inner: Arc<HashMap<&'static str, Arc<dyn Variable>>>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut map: HashMap<&'static str, Arc<dyn Variable>> = HashMap::new();
        map.insert("currentMonth", Arc::new(builtins::CurrentMonth));
        map.insert("currentYear", Arc::new(builtins::CurrentYear));
        map.insert("currentDay", Arc::new(builtins::CurrentDay));
        map.insert("today", Arc::new(builtins::Today));
        Self {
            inner: Arc::new(map),
        }
    }

    pub fn register<V: Variable + 'static>(&mut self, v: V) {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(v.key(), Arc::new(v));
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Variable>> {
        self.inner.get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Resolve `expression` — either a bare variable key or
    /// `<key><+|-><digits>`. Unknown keys and unsupported arithmetic yield
    /// `None`, never an error.
    pub fn evaluate_expression(&self, expression: &str, ctx: &Context) -> Option<Evaluation> {
        if let Some(caps) = ARITHMETIC_RE.captures(expression) {
            let variable = self.get(&caps[1])?;
            if !variable.supports_arithmetic() {
                return None;
            }
            let op = if &caps[2] == "+" {
                ArithOp::Add
            } else {
                ArithOp::Sub
            };
            let operand: u32 = caps[3].parse().ok()?;
            return variable.apply_arithmetic(op, operand, ctx);
        }
        self.get(expression).map(|v| v.evaluate(ctx))
    }
}

/// UTC-midnight timestamp in the fixed serialization format all date-valued
/// outputs use: `YYYY-MM-DDT00:00:00.000Z`.
pub fn utc_midnight(date: &DateTime<Utc>) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

pub mod builtins {
    use super::*;

    fn shift_months(date: &DateTime<Utc>, op: ArithOp, n: u32) -> Option<DateTime<Utc>> {
        match op {
            ArithOp::Add => date.checked_add_months(Months::new(n)),
            ArithOp::Sub => date.checked_sub_months(Months::new(n)),
        }
    }

    fn shift_days(date: &DateTime<Utc>, op: ArithOp, n: u32) -> Option<DateTime<Utc>> {
        match op {
            ArithOp::Add => date.checked_add_days(Days::new(u64::from(n))),
            ArithOp::Sub => date.checked_sub_days(Days::new(u64::from(n))),
        }
    }

    /// Month name of the (shifted) current date. The display gains a year
    /// suffix whenever the resolved month falls outside the context's year.
    pub struct CurrentMonth;

    impl CurrentMonth {
        fn render(date: &DateTime<Utc>, ctx: &Context) -> Evaluation {
            let name = date.format("%B").to_string();
            let display_value = if date.year() == ctx.current_date.year() {
                name
            } else {
                format!("{} {}", name, date.year())
            };
            Evaluation {
                display_value,
                data_value: Value::String(utc_midnight(date)),
            }
        }
    }

    impl Variable for CurrentMonth {
        fn key(&self) -> &'static str {
            "currentMonth"
        }

        fn supports_arithmetic(&self) -> bool {
            true
        }

        fn evaluate(&self, ctx: &Context) -> Evaluation {
            Self::render(&ctx.current_date, ctx)
        }

        fn apply_arithmetic(&self, op: ArithOp, operand: u32, ctx: &Context) -> Option<Evaluation> {
            // Calendar months, not fixed durations: Jan 31 + 1 clamps to the
            // end of February, leap years included.
            let shifted = shift_months(&ctx.current_date, op, operand)?;
            Some(Self::render(&shifted, ctx))
        }
    }

    /// Calendar year as an integer.
    pub struct CurrentYear;

    impl Variable for CurrentYear {
        fn key(&self) -> &'static str {
            "currentYear"
        }

        fn supports_arithmetic(&self) -> bool {
            true
        }

        fn evaluate(&self, ctx: &Context) -> Evaluation {
            let year = ctx.current_date.year();
            Evaluation {
                display_value: year.to_string(),
                data_value: Value::from(year),
            }
        }

        fn apply_arithmetic(&self, op: ArithOp, operand: u32, ctx: &Context) -> Option<Evaluation> {
            let shifted = shift_months(&ctx.current_date, op, operand.checked_mul(12)?)?;
            let year = shifted.year();
            Some(Evaluation {
                display_value: year.to_string(),
                data_value: Value::from(year),
            })
        }
    }

    /// Day of month of the (shifted) current date.
    pub struct CurrentDay;

    impl Variable for CurrentDay {
        fn key(&self) -> &'static str {
            "currentDay"
        }

        fn supports_arithmetic(&self) -> bool {
            true
        }

        fn evaluate(&self, ctx: &Context) -> Evaluation {
            Evaluation {
                display_value: ctx.current_date.day().to_string(),
                data_value: Value::String(utc_midnight(&ctx.current_date)),
            }
        }

        fn apply_arithmetic(&self, op: ArithOp, operand: u32, ctx: &Context) -> Option<Evaluation> {
            let shifted = shift_days(&ctx.current_date, op, operand)?;
            Some(Evaluation {
                display_value: shifted.day().to_string(),
                data_value: Value::String(utc_midnight(&shifted)),
            })
        }
    }

    /// The context date at UTC midnight. No arithmetic.
    pub struct Today;

    impl Variable for Today {
        fn key(&self) -> &'static str {
            "today"
        }

        fn evaluate(&self, ctx: &Context) -> Evaluation {
            let stamp = utc_midnight(&ctx.current_date);
            Evaluation {
                display_value: stamp.clone(),
                data_value: Value::String(stamp),
            }
        }
    }
}
