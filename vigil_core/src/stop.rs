use crate::formula::Formula;
use crate::ltl::{Derived, Residual, Violation};
use crate::time::Time;

/// The verdict a pending residual falls back to when the trace ends.
#[derive(Debug, Clone, PartialEq)]
pub enum StopDefault {
    /// The pending obligation is vacuously satisfied at trace end.
    True,
    /// The pending obligation cannot be met any more.
    False(Violation),
}

/// Compute the end-of-trace default of a pending residual at `time`, the
/// trace's final admitted time.
///
/// A deferred `next` or `always` defaults to true (nothing observed
/// contradicted it); a deferred `eventually` defaults to false (the awaited
/// state never came). Composite residuals combine their children's defaults
/// through the same tables evaluation uses.
pub fn stop_default(residual: &Residual, time: Time) -> StopDefault {
    match residual {
        Residual::True => StopDefault::True,
        Residual::False(violation) => StopDefault::False(violation.clone()),
        Residual::Derived(derived) => match derived {
            Derived::Next { .. } | Derived::Always { .. } => StopDefault::True,
            Derived::Eventually { subformula, .. } => StopDefault::False(Violation::Eventually {
                time,
                formula: subformula.clone(),
            }),
        },
        Residual::And { left, right } => {
            stop_and(stop_default(left, time), stop_default(right, time))
        }
        Residual::Or { left, right } => {
            stop_or(stop_default(left, time), stop_default(right, time))
        }
        Residual::Implies {
            antecedent_formula,
            antecedent,
            consequent,
        } => stop_implies(
            antecedent_formula,
            stop_default(antecedent, time),
            stop_default(consequent, time),
        ),
        Residual::AndAlways { left, right, .. } => {
            match (stop_default(left, time), stop_default(right, time)) {
                (StopDefault::True, right) => right,
                (StopDefault::False(violation), _) => StopDefault::False(Violation::Always {
                    time,
                    violation: Box::new(violation),
                }),
            }
        }
        Residual::OrEventually { left, right, .. } => {
            match (stop_default(left, time), stop_default(right, time)) {
                (StopDefault::True, _) | (_, StopDefault::True) => StopDefault::True,
                (_, StopDefault::False(violation)) => StopDefault::False(violation),
            }
        }
    }
}

fn stop_and(left: StopDefault, right: StopDefault) -> StopDefault {
    match (left, right) {
        (StopDefault::True, right) => right,
        (left, StopDefault::True) => left,
        (StopDefault::False(left), StopDefault::False(right)) => {
            StopDefault::False(Violation::And {
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    }
}

fn stop_or(left: StopDefault, right: StopDefault) -> StopDefault {
    match (left, right) {
        (StopDefault::True, _) | (_, StopDefault::True) => StopDefault::True,
        (StopDefault::False(left), StopDefault::False(right)) => {
            StopDefault::False(Violation::Or {
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    }
}

fn stop_implies(
    antecedent_formula: &Formula,
    left: StopDefault,
    right: StopDefault,
) -> StopDefault {
    match (left, right) {
        (StopDefault::False(_), _) => StopDefault::True,
        (StopDefault::True, StopDefault::True) => StopDefault::True,
        (StopDefault::True, StopDefault::False(violation)) => {
            StopDefault::False(Violation::Implies {
                antecedent: antecedent_formula.clone(),
                consequent: Box::new(violation),
            })
        }
    }
}
