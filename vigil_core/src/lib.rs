//! Online, incremental evaluation of linear-temporal-logic properties over
//! timed state traces, for use in the VIGIL UI-testing monitor.
//!
//! A driver admits state snapshots one by one into a [`Runtime`]; registered
//! [`ExtractorCell`]s project each snapshot into retained, time-indexed
//! values. Properties are [`Formula`]s over closures reading those cells.
//! [`evaluate`] produces a three-valued verdict — definitely true, definitely
//! false with a structured [`Violation`], or a pending [`Residual`] — and
//! [`step`] resumes pending residuals at each later state, so verdicts are
//! reached as early as the trace allows and never later.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod formula;
mod ltl;
mod runtime;
mod stop;
mod time;

#[cfg(test)]
mod ltl_equivalences;

pub use error::*;
pub use formula::*;
pub use ltl::*;
pub use runtime::*;
pub use stop::*;
pub use time::*;

use log::{debug, trace};

/// Outcome of checking a property against a finite trace.
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    /// The property was decided true at or before trace end.
    Passed,
    /// The property was falsified, with evidence.
    Failed {
        /// Why the property failed.
        violation: Violation,
    },
    /// The trace ended before the property could be decided.
    Inconclusive {
        /// The pending work at trace end.
        residual: Residual,
    },
}

impl TestResult {
    /// Resolve an inconclusive result with its end-of-trace default at
    /// `time`, the trace's final admitted time. Decided results pass through.
    pub fn settle(self, time: Time) -> TestResult {
        match self {
            TestResult::Inconclusive { residual } => match stop_default(&residual, time) {
                StopDefault::True => TestResult::Passed,
                StopDefault::False(violation) => TestResult::Failed { violation },
            },
            decided => decided,
        }
    }
}

/// Check `property` against a finite `trace` of states with millisecond
/// timestamps, admitting each state into `runtime` as it goes.
///
/// Stops admitting as soon as the verdict is decided. An empty trace fails
/// with [`EvalError::EmptyTrace`].
pub fn test<S: 'static>(
    runtime: &mut Runtime<S>,
    property: impl IntoFormula,
    trace: impl IntoIterator<Item = (S, u64)>,
) -> Result<TestResult, EvalError> {
    let formula = property.into_formula()?;
    let mut entries = trace.into_iter();
    let (state, timestamp) = entries.next().ok_or(EvalError::EmptyTrace)?;
    let time = runtime.register_state(state, timestamp)?;
    let mut value = evaluate(&formula, time)?;
    for (state, timestamp) in entries {
        let residual = match value {
            Value::Residual(residual) => residual,
            _ => break,
        };
        let time = runtime.register_state(state, timestamp)?;
        value = step(&residual, time)?;
    }
    Ok(match value {
        Value::True => TestResult::Passed,
        Value::False(violation) => TestResult::Failed { violation },
        Value::Residual(residual) => TestResult::Inconclusive { residual },
    })
}

/// Tracks the verdict state machines of a set of named properties over one
/// observation session.
///
/// After each admission, [`Monitor::observe`] evaluates or steps every
/// undecided property; once a property settles, its verdict is frozen and it
/// is skipped on later steps. [`Monitor::decided`] lets a driver stop a
/// session early once nothing is pending any more.
#[derive(Default, Debug)]
pub struct Monitor {
    properties: Vec<Property>,
}

#[derive(Debug)]
struct Property {
    name: String,
    state: PropertyState,
}

#[derive(Debug)]
enum PropertyState {
    Initial(Formula),
    Pending(Residual),
    DefinitelyTrue,
    DefinitelyFalse(Violation),
}

impl Monitor {
    /// A monitor with no properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named property. A property added mid-session starts at its
    /// first observation.
    pub fn property(
        &mut self,
        name: impl Into<String>,
        property: impl IntoFormula,
    ) -> Result<(), FormulaError> {
        self.properties.push(Property {
            name: name.into(),
            state: PropertyState::Initial(property.into_formula()?),
        });
        Ok(())
    }

    /// The names of all tracked properties, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|property| property.name.as_str())
    }

    /// Evaluate or step every undecided property at a newly admitted `time`.
    pub fn observe(&mut self, time: Time) -> Result<(), EvalError> {
        for property in &mut self.properties {
            let value = match &property.state {
                PropertyState::Initial(formula) => evaluate(formula, time)?,
                PropertyState::Pending(residual) => step(residual, time)?,
                PropertyState::DefinitelyTrue | PropertyState::DefinitelyFalse(_) => continue,
            };
            property.state = match value {
                Value::True => {
                    trace!("property '{}' settled true at {time}", property.name);
                    PropertyState::DefinitelyTrue
                }
                Value::False(violation) => {
                    debug!("property '{}' violated at {time}", property.name);
                    PropertyState::DefinitelyFalse(violation)
                }
                Value::Residual(residual) => PropertyState::Pending(residual),
            };
        }
        Ok(())
    }

    /// True once every property has a definite verdict.
    pub fn decided(&self) -> bool {
        self.properties.iter().all(|property| {
            matches!(
                property.state,
                PropertyState::DefinitelyTrue | PropertyState::DefinitelyFalse(_)
            )
        })
    }

    /// Final per-property results. Properties still pending come back
    /// [`TestResult::Inconclusive`]; callers wanting end-of-trace defaults
    /// apply [`TestResult::settle`]. Fails with [`EvalError::EmptyTrace`] if
    /// a property was never observed.
    pub fn finish(self) -> Result<Vec<(String, TestResult)>, EvalError> {
        self.properties
            .into_iter()
            .map(|property| {
                let result = match property.state {
                    PropertyState::Initial(_) => return Err(EvalError::EmptyTrace),
                    PropertyState::Pending(residual) => TestResult::Inconclusive { residual },
                    PropertyState::DefinitelyTrue => TestResult::Passed,
                    PropertyState::DefinitelyFalse(violation) => TestResult::Failed { violation },
                };
                Ok((property.name, result))
            })
            .collect()
    }
}
