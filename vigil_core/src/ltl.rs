use crate::error::EvalError;
use crate::formula::{Formula, Node};
use crate::time::Time;
use serde::Serialize;

/// The three-valued verdict of evaluating a formula at a state.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The formula is definitely true; no future state can change this.
    True,
    /// The formula is definitely false, with evidence.
    False(Violation),
    /// The verdict depends on future states.
    Residual(Residual),
}

/// Structured evidence for *why* a formula evaluated to false, mirroring the
/// shape of the failed part of the formula.
///
/// Violations are produced at the moment of falsification and handed to the
/// caller unchanged; they serialise for consumption by external renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Violation {
    /// An atomic condition was false.
    False {
        /// Time of the falsifying state.
        time: Time,
        /// Prettyprint of the condition.
        condition: String,
    },
    /// An atomic formula was false; produced by negation of a true branch.
    Atomic {
        /// Time of the falsifying state.
        time: Time,
        /// The formula that was false.
        formula: Formula,
    },
    /// The subformula of a `next` failed at the following step.
    Next {
        /// Time of the following step.
        time: Time,
        /// The subformula that failed.
        formula: Formula,
    },
    /// An `always` was broken by one of its steps.
    Always {
        /// Time of the breaking step.
        time: Time,
        /// What went wrong at that step.
        violation: Box<Violation>,
    },
    /// An `eventually` ran out of time.
    Eventually {
        /// Time of the step that exceeded the deadline.
        time: Time,
        /// The subformula that never became true in the window.
        formula: Formula,
    },
    /// Both sides of a conjunction failed together.
    And {
        /// Left operand's violation.
        left: Box<Violation>,
        /// Right operand's violation.
        right: Box<Violation>,
    },
    /// Both sides of a disjunction failed.
    Or {
        /// Left operand's violation.
        left: Box<Violation>,
        /// Right operand's violation.
        right: Box<Violation>,
    },
    /// An implication whose antecedent held but whose consequent failed.
    Implies {
        /// The antecedent that held.
        antecedent: Formula,
        /// The consequent's violation.
        consequent: Box<Violation>,
    },
}

/// Deferred evaluation work, resumed by [`step`] at the next admitted state.
///
/// A residual is created at step N, consumed at step N+1 and dropped once the
/// verdict is terminal. It owns its substructure; formulas inside it are
/// shared with the user's specification.
#[derive(Debug, Clone, PartialEq)]
pub enum Residual {
    /// Already true; carried for compositional reasons.
    True,
    /// Already false; carried for compositional reasons.
    False(Violation),
    /// A freshly deferred temporal operator.
    Derived(Derived),
    /// Both conjuncts still pending.
    And {
        /// Left pending operand.
        left: Box<Residual>,
        /// Right pending operand.
        right: Box<Residual>,
    },
    /// Both disjuncts still pending.
    Or {
        /// Left pending operand.
        left: Box<Residual>,
        /// Right pending operand.
        right: Box<Residual>,
    },
    /// A pending implication.
    Implies {
        /// The antecedent formula, retained so that reports can show the
        /// condition under which the consequent was expected.
        antecedent_formula: Formula,
        /// The antecedent's pending verdict.
        antecedent: Box<Residual>,
        /// The consequent's pending verdict.
        consequent: Box<Residual>,
    },
    /// The step residual of an `always`'s subformula conjoined with a fresh
    /// deferral of the `always` for the next step.
    AndAlways {
        /// The monitored subformula.
        subformula: Formula,
        /// When the `always` opened.
        start: Time,
        /// End of the window, if bounded.
        deadline: Option<Time>,
        /// Pending verdict of the subformula at the current step.
        left: Box<Residual>,
        /// The re-opened `always`.
        right: Box<Residual>,
    },
    /// The step residual of an `eventually`'s subformula disjoined with a
    /// fresh deferral of the `eventually` for the next step.
    OrEventually {
        /// The awaited subformula.
        subformula: Formula,
        /// When the `eventually` opened.
        start: Time,
        /// The deadline by which the subformula must hold.
        deadline: Time,
        /// Pending verdict of the subformula at the current step.
        left: Box<Residual>,
        /// The re-opened `eventually`.
        right: Box<Residual>,
    },
}

/// A temporal operator whose evaluation was deferred whole to the next step.
#[derive(Debug, Clone, PartialEq)]
pub enum Derived {
    /// A `next`, waiting for the following admission.
    Next {
        /// The subformula to evaluate at the next state.
        subformula: Formula,
        /// Time of the state the `next` was evaluated at.
        start: Time,
    },
    /// A (re-)opened `always`.
    Always {
        /// The monitored subformula.
        subformula: Formula,
        /// When the `always` opened.
        start: Time,
        /// End of the window, if bounded.
        deadline: Option<Time>,
    },
    /// A (re-)opened `eventually`.
    Eventually {
        /// The awaited subformula.
        subformula: Formula,
        /// When the `eventually` opened.
        start: Time,
        /// The deadline by which the subformula must hold.
        deadline: Time,
    },
}

/// Evaluate `formula` at an admitted state's `time`, producing a three-valued
/// verdict.
///
/// Thunks are invoked exactly once per evaluation site, so all cell reads
/// within one call observe the same snapshot.
pub fn evaluate(formula: &Formula, time: Time) -> Result<Value, EvalError> {
    match formula.node() {
        Node::Pure { value: true, .. } => Ok(Value::True),
        Node::Pure {
            value: false,
            pretty,
        } => Ok(Value::False(Violation::False {
            time,
            condition: pretty.clone(),
        })),
        Node::Thunk { thunk, .. } => {
            let produced = thunk()?;
            evaluate(&produced, time)
        }
        Node::Not(subformula) => match evaluate(subformula, time)? {
            Value::True => Ok(Value::False(Violation::Atomic {
                time,
                formula: formula.clone(),
            })),
            Value::False(_) => Ok(Value::True),
            Value::Residual(_) => Err(EvalError::NegationOfModal {
                formula: formula.to_string(),
            }),
        },
        Node::And(left, right) => {
            let left = evaluate(left, time)?;
            let right = evaluate(right, time)?;
            Ok(evaluate_and(left, right))
        }
        Node::Or(left, right) => {
            let left = evaluate(left, time)?;
            let right = evaluate(right, time)?;
            Ok(evaluate_or(left, right))
        }
        Node::Implies(antecedent, consequent) => {
            let left = evaluate(antecedent, time)?;
            let right = evaluate(consequent, time)?;
            Ok(evaluate_implies(antecedent, left, right))
        }
        Node::Next(subformula) => Ok(Value::Residual(Residual::Derived(Derived::Next {
            subformula: subformula.clone(),
            start: time,
        }))),
        Node::Always { subformula, bound } => {
            let deadline = bound.map(|bound| time.after(bound));
            evaluate_always(subformula.clone(), time, deadline, time)
        }
        Node::Eventually { subformula, bound } => {
            // Construction guarantees the bound; data-driven frontends may
            // still reach this with none.
            let bound = bound.ok_or(crate::error::FormulaError::UnboundedEventually)?;
            evaluate_eventually(subformula.clone(), time, time.after(bound), time)
        }
    }
}

fn evaluate_and(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::True, right) => right,
        (left, Value::True) => left,
        (Value::False(left), Value::False(right)) => Value::False(Violation::And {
            left: Box::new(left),
            right: Box::new(right),
        }),
        // One side failed while the other is still pending: terminate now, a
        // second falsification later would not change the verdict.
        (Value::False(violation), _) | (_, Value::False(violation)) => Value::False(violation),
        (Value::Residual(left), Value::Residual(right)) => Value::Residual(Residual::And {
            left: Box::new(left),
            right: Box::new(right),
        }),
    }
}

fn evaluate_or(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::False(left), Value::False(right)) => Value::False(Violation::Or {
            left: Box::new(left),
            right: Box::new(right),
        }),
        (Value::True, _) | (_, Value::True) => Value::True,
        (value, Value::False(_)) | (Value::False(_), value) => value,
        (Value::Residual(left), Value::Residual(right)) => Value::Residual(Residual::Or {
            left: Box::new(left),
            right: Box::new(right),
        }),
    }
}

fn evaluate_implies(antecedent_formula: &Formula, left: Value, right: Value) -> Value {
    match (left, right) {
        // Vacuous truth.
        (Value::False(_), _) => Value::True,
        (Value::True, Value::True) => Value::True,
        (Value::True, Value::False(violation)) => Value::False(Violation::Implies {
            antecedent: antecedent_formula.clone(),
            consequent: Box::new(violation),
        }),
        (Value::True, Value::Residual(consequent)) => Value::Residual(Residual::Implies {
            antecedent_formula: antecedent_formula.clone(),
            antecedent: Box::new(Residual::True),
            consequent: Box::new(consequent),
        }),
        // Once the consequent holds, the antecedent no longer matters.
        (Value::Residual(_), Value::True) => Value::True,
        // Only violated if the antecedent later resolves true: stay pending,
        // keeping the consequent's violation.
        (Value::Residual(antecedent), Value::False(violation)) => {
            Value::Residual(Residual::Implies {
                antecedent_formula: antecedent_formula.clone(),
                antecedent: Box::new(antecedent),
                consequent: Box::new(Residual::False(violation)),
            })
        }
        (Value::Residual(antecedent), Value::Residual(consequent)) => {
            Value::Residual(Residual::Implies {
                antecedent_formula: antecedent_formula.clone(),
                antecedent: Box::new(antecedent),
                consequent: Box::new(consequent),
            })
        }
    }
}

fn evaluate_always(
    subformula: Formula,
    start: Time,
    deadline: Option<Time>,
    time: Time,
) -> Result<Value, EvalError> {
    if let Some(deadline) = deadline
        && deadline.is_before(time)
    {
        // The whole window held; obligations of the final in-window step have
        // already been stepped or are vacated with the window.
        return Ok(Value::True);
    }

    let reopened = Residual::Derived(Derived::Always {
        subformula: subformula.clone(),
        start,
        deadline,
    });

    Ok(match evaluate(&subformula, time)? {
        Value::True => Value::Residual(reopened),
        Value::False(violation) => Value::False(Violation::Always {
            time,
            violation: Box::new(violation),
        }),
        Value::Residual(left) => Value::Residual(Residual::AndAlways {
            subformula,
            start,
            deadline,
            left: Box::new(left),
            right: Box::new(reopened),
        }),
    })
}

fn step_and_always(
    subformula: Formula,
    start: Time,
    deadline: Option<Time>,
    time: Time,
    left: Value,
    right: Value,
) -> Value {
    if let Some(deadline) = deadline
        && deadline.is_before(time)
    {
        return Value::True;
    }

    match (left, right) {
        (Value::True, Value::True) => Value::True,
        (Value::False(violation), _) | (_, Value::False(violation)) => {
            Value::False(Violation::Always {
                time,
                violation: Box::new(violation),
            })
        }
        (Value::Residual(left), Value::True) => Value::Residual(Residual::AndAlways {
            subformula,
            start,
            deadline,
            left: Box::new(left),
            right: Box::new(Residual::True),
        }),
        (Value::True, Value::Residual(right)) => Value::Residual(Residual::AndAlways {
            subformula,
            start,
            deadline,
            left: Box::new(Residual::True),
            right: Box::new(right),
        }),
        (Value::Residual(left), Value::Residual(right)) => Value::Residual(Residual::AndAlways {
            subformula,
            start,
            deadline,
            left: Box::new(left),
            right: Box::new(right),
        }),
    }
}

fn evaluate_eventually(
    subformula: Formula,
    start: Time,
    deadline: Time,
    time: Time,
) -> Result<Value, EvalError> {
    if deadline.is_before(time) {
        return Ok(Value::False(Violation::Eventually {
            time,
            formula: subformula,
        }));
    }

    let reopened = Residual::Derived(Derived::Eventually {
        subformula: subformula.clone(),
        start,
        deadline,
    });

    Ok(match evaluate(&subformula, time)? {
        Value::True => Value::True,
        // NOTE: the step's violation is dropped on purpose; accumulating one
        // piece of non-evidence per state would bloat the final report
        // without strengthening it.
        Value::False(_) => Value::Residual(reopened),
        Value::Residual(left) => Value::Residual(Residual::OrEventually {
            subformula,
            start,
            deadline,
            left: Box::new(left),
            right: Box::new(reopened),
        }),
    })
}

fn step_or_eventually(
    subformula: Formula,
    start: Time,
    deadline: Time,
    time: Time,
    left: Value,
    right: Value,
) -> Value {
    if deadline.is_before(time) {
        return Value::False(Violation::Eventually {
            time,
            formula: subformula,
        });
    }

    match (left, right) {
        (Value::True, _) | (_, Value::True) => Value::True,
        (Value::False(_), Value::False(_)) => Value::False(Violation::Eventually {
            time,
            formula: subformula,
        }),
        (Value::False(_), Value::Residual(residual))
        | (Value::Residual(residual), Value::False(_)) => Value::Residual(residual),
        (Value::Residual(left), Value::Residual(right)) => Value::Residual(Residual::OrEventually {
            subformula,
            start,
            deadline,
            left: Box::new(left),
            right: Box::new(right),
        }),
    }
}

/// Resume a pending residual at a newly admitted state's `time`.
///
/// The runtime must have admitted the state first, so that thunk re-entry
/// reads cells at `time`.
pub fn step(residual: &Residual, time: Time) -> Result<Value, EvalError> {
    match residual {
        Residual::True => Ok(Value::True),
        Residual::False(violation) => Ok(Value::False(violation.clone())),
        Residual::And { left, right } => {
            let left = step(left, time)?;
            let right = step(right, time)?;
            Ok(evaluate_and(left, right))
        }
        Residual::Or { left, right } => {
            let left = step(left, time)?;
            let right = step(right, time)?;
            Ok(evaluate_or(left, right))
        }
        Residual::Implies {
            antecedent_formula,
            antecedent,
            consequent,
        } => {
            let left = step(antecedent, time)?;
            let right = step(consequent, time)?;
            Ok(evaluate_implies(antecedent_formula, left, right))
        }
        Residual::Derived(derived) => match derived {
            Derived::Next { subformula, .. } => match evaluate(subformula, time)? {
                Value::False(_) => Ok(Value::False(Violation::Next {
                    time,
                    formula: subformula.clone(),
                })),
                value => Ok(value),
            },
            Derived::Always {
                subformula,
                start,
                deadline,
            } => evaluate_always(subformula.clone(), *start, *deadline, time),
            Derived::Eventually {
                subformula,
                start,
                deadline,
            } => evaluate_eventually(subformula.clone(), *start, *deadline, time),
        },
        Residual::AndAlways {
            subformula,
            start,
            deadline,
            left,
            right,
        } => {
            let left = step(left, time)?;
            let right = step(right, time)?;
            Ok(step_and_always(
                subformula.clone(),
                *start,
                *deadline,
                time,
                left,
                right,
            ))
        }
        Residual::OrEventually {
            subformula,
            start,
            deadline,
            left,
            right,
        } => {
            let left = step(left, time)?;
            let right = step(right, time)?;
            Ok(step_or_eventually(
                subformula.clone(),
                *start,
                *deadline,
                time,
                left,
                right,
            ))
        }
    }
}
