//! The property specification file format and its compilation into formulas.
//!
//! A specification is a JSON object mapping property names to temporal
//! expressions. Atomic conditions are `check`s: a JSON-pointer path into the
//! recorded state, a comparison operator and a literal. A path that does not
//! exist in a snapshot reads as `null`, so "the error field is absent" is
//! expressible without a dedicated operator.
//!
//! ```json
//! {
//!   "toast_clears": {
//!     "always": {
//!       "of": {
//!         "implies": [
//!           { "check": { "path": "/toast", "op": "defined" } },
//!           {
//!             "eventually": {
//!               "of": { "check": { "path": "/toast", "op": "eq", "value": null } },
//!               "within": { "amount": 5, "unit": "seconds" }
//!             }
//!           }
//!         ]
//!       }
//!     }
//!   }
//! }
//! ```

use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde_json as json;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use vigil_core::{
    Cell, ExtractorCell, Formula, IntoFormula, Modal, Monitor, Runtime, TimeUnit, always, and,
    eventually, implies, next, not, now, or, pure,
};

/// A parsed property specification: named temporal properties over the
/// recorded JSON state.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub(crate) struct SpecFile {
    properties: BTreeMap<String, PropExpr>,
}

impl SpecFile {
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading specification {}", path.display()))?;
        json::from_str(&contents)
            .with_context(|| format!("parsing specification {}", path.display()))
    }

    /// All property names, in specification order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    /// Compile the selected properties into a monitor over `runtime`,
    /// registering one extractor cell per distinct state path.
    pub(crate) fn compile(
        &self,
        runtime: &mut Runtime<json::Value>,
        selected: &[String],
    ) -> anyhow::Result<Monitor> {
        let mut cells = Cells::new();
        let mut monitor = Monitor::new();
        for name in selected {
            let expr = self
                .properties
                .get(name)
                .ok_or_else(|| anyhow!("no property named '{name}'"))?;
            let formula = build(expr, runtime, &mut cells)
                .with_context(|| format!("compiling property '{name}'"))?;
            monitor.property(name.clone(), formula)?;
        }
        Ok(monitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PropExpr {
    Pure(bool),
    Check(Check),
    Not(Box<PropExpr>),
    And(Vec<PropExpr>),
    Or(Vec<PropExpr>),
    Implies(Box<(PropExpr, PropExpr)>),
    Next(Box<PropExpr>),
    Always(Box<Bounded>),
    Eventually(Box<Bounded>),
}

#[derive(Debug, Clone, Deserialize)]
struct Bounded {
    of: PropExpr,
    #[serde(default)]
    within: Option<Bound>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Bound {
    amount: u64,
    unit: TimeUnit,
}

#[derive(Debug, Clone, Deserialize)]
struct Check {
    path: String,
    op: Op,
    #[serde(default)]
    value: json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Defined,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Defined => "defined",
        };
        f.write_str(symbol)
    }
}

type Cells = HashMap<String, ExtractorCell<json::Value, json::Value>>;

fn build(
    expr: &PropExpr,
    runtime: &mut Runtime<json::Value>,
    cells: &mut Cells,
) -> anyhow::Result<Formula> {
    Ok(match expr {
        PropExpr::Pure(value) => pure(*value),
        PropExpr::Check(check) => compile_check(check, runtime, cells)?,
        PropExpr::Not(sub) => not(build(sub, runtime, cells)?)?,
        PropExpr::And(subs) => {
            let mut built = subs.iter().map(|sub| build(sub, runtime, cells));
            match built.next() {
                None => pure(true),
                Some(first) => {
                    let mut formula = first?;
                    for sub in built {
                        formula = and(formula, sub?)?;
                    }
                    formula
                }
            }
        }
        PropExpr::Or(subs) => {
            let mut built = subs.iter().map(|sub| build(sub, runtime, cells));
            match built.next() {
                None => pure(false),
                Some(first) => {
                    let mut formula = first?;
                    for sub in built {
                        formula = or(formula, sub?)?;
                    }
                    formula
                }
            }
        }
        PropExpr::Implies(parts) => implies(
            build(&parts.0, runtime, cells)?,
            build(&parts.1, runtime, cells)?,
        )?,
        PropExpr::Next(sub) => next(build(sub, runtime, cells)?)?,
        PropExpr::Always(bounded) => {
            finish_modal(always(build(&bounded.of, runtime, cells)?), bounded.within)?
        }
        PropExpr::Eventually(bounded) => finish_modal(
            eventually(build(&bounded.of, runtime, cells)?),
            bounded.within,
        )?,
    })
}

fn finish_modal(modal: Modal, bound: Option<Bound>) -> Result<Formula, vigil_core::FormulaError> {
    match bound {
        Some(bound) => modal.within(bound.amount, bound.unit).into_formula(),
        None => modal.into_formula(),
    }
}

fn compile_check(
    check: &Check,
    runtime: &mut Runtime<json::Value>,
    cells: &mut Cells,
) -> anyhow::Result<Formula> {
    let cell = match cells.get(&check.path) {
        Some(cell) => cell.clone(),
        None => {
            let pointer = check.path.clone();
            let cell = runtime.extractor(check.path.clone(), move |state: &json::Value| {
                state.pointer(&pointer).cloned().unwrap_or(json::Value::Null)
            })?;
            cells.insert(check.path.clone(), cell.clone());
            cell
        }
    };
    let pretty = match check.op {
        Op::Defined => format!("{} is defined", check.path),
        op => format!("{} {} {}", check.path, op, check.value),
    };
    let op = check.op;
    let expected = check.value.clone();
    Ok(now(pretty, move || Ok(holds(op, &cell.current()?, &expected))))
}

fn holds(op: Op, actual: &json::Value, expected: &json::Value) -> bool {
    match op {
        Op::Eq => actual == expected,
        Op::Ne => actual != expected,
        Op::Defined => !actual.is_null(),
        Op::Lt => compare(actual, expected).is_some_and(Ordering::is_lt),
        Op::Le => compare(actual, expected).is_some_and(Ordering::is_le),
        Op::Gt => compare(actual, expected).is_some_and(Ordering::is_gt),
        Op::Ge => compare(actual, expected).is_some_and(Ordering::is_ge),
    }
}

/// Ordered comparison is defined for numbers and strings only; mismatched or
/// unordered kinds never satisfy an ordered check.
fn compare(actual: &json::Value, expected: &json::Value) -> Option<Ordering> {
    match (actual, expected) {
        (json::Value::Number(actual), json::Value::Number(expected)) => {
            actual.as_f64()?.partial_cmp(&expected.as_f64()?)
        }
        (json::Value::String(actual), json::Value::String(expected)) => {
            Some(actual.as_str().cmp(expected.as_str()))
        }
        _ => None,
    }
}
