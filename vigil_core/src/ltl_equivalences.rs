use crate::{
    Cell, ExtractorCell, Formula, IntoFormula, Residual, Runtime, StopDefault, TestResult, Time,
    TimeUnit, Value, always, and, eventually, evaluate, implies, next, not, now, or, pure,
    step, stop_default, test,
};
use proptest::prelude::*;

type State = (bool, bool);

#[derive(Copy, Clone, Debug, PartialEq)]
enum Atom {
    X,
    Y,
}

#[derive(Clone, Debug, PartialEq)]
enum Spec {
    Pure(bool),
    Atom(Atom),
    Not(Box<Spec>),
    And(Box<Spec>, Box<Spec>),
    Or(Box<Spec>, Box<Spec>),
    Implies(Box<Spec>, Box<Spec>),
    Next(Box<Spec>),
    Always(Box<Spec>, Option<u64>),
    Eventually(Box<Spec>, u64),
}

fn build(spec: &Spec, x: &ExtractorCell<State, bool>, y: &ExtractorCell<State, bool>) -> Formula {
    match spec {
        Spec::Pure(value) => pure(*value),
        Spec::Atom(Atom::X) => {
            let cell = x.clone();
            now("x", move || Ok(cell.current()?))
        }
        Spec::Atom(Atom::Y) => {
            let cell = y.clone();
            now("y", move || Ok(cell.current()?))
        }
        Spec::Not(sub) => not(build(sub, x, y)).unwrap(),
        Spec::And(left, right) => and(build(left, x, y), build(right, x, y)).unwrap(),
        Spec::Or(left, right) => or(build(left, x, y), build(right, x, y)).unwrap(),
        Spec::Implies(left, right) => implies(build(left, x, y), build(right, x, y)).unwrap(),
        Spec::Next(sub) => next(build(sub, x, y)).unwrap(),
        Spec::Always(sub, None) => always(build(sub, x, y)).into_formula().unwrap(),
        Spec::Always(sub, Some(bound)) => always(build(sub, x, y))
            .within(*bound, TimeUnit::Milliseconds)
            .into_formula()
            .unwrap(),
        Spec::Eventually(sub, bound) => eventually(build(sub, x, y))
            .within(*bound, TimeUnit::Milliseconds)
            .into_formula()
            .unwrap(),
    }
}

fn truth(spec: &Spec, state: State) -> bool {
    match spec {
        Spec::Pure(value) => *value,
        Spec::Atom(Atom::X) => state.0,
        Spec::Atom(Atom::Y) => state.1,
        Spec::Not(sub) => !truth(sub, state),
        Spec::And(left, right) => truth(left, state) && truth(right, state),
        Spec::Or(left, right) => truth(left, state) || truth(right, state),
        Spec::Implies(left, right) => !truth(left, state) || truth(right, state),
        modal => panic!("not propositional: {modal:?}"),
    }
}

fn atom() -> BoxedStrategy<Spec> {
    prop_oneof![
        any::<bool>().prop_map(Spec::Pure),
        prop_oneof![Just(Atom::X), Just(Atom::Y)].prop_map(Spec::Atom),
    ]
    .boxed()
}

/// Modal-free formulas; negation is unrestricted here.
fn propositional() -> BoxedStrategy<Spec> {
    atom()
        .prop_recursive(4, 24, 2, |inner| {
            prop_oneof![
                inner.clone().prop_map(|sub| Spec::Not(Box::new(sub))),
                (inner.clone(), inner.clone())
                    .prop_map(|(l, r)| Spec::And(Box::new(l), Box::new(r))),
                (inner.clone(), inner.clone())
                    .prop_map(|(l, r)| Spec::Or(Box::new(l), Box::new(r))),
                (inner.clone(), inner)
                    .prop_map(|(l, r)| Spec::Implies(Box::new(l), Box::new(r))),
            ]
        })
        .boxed()
}

fn bound() -> BoxedStrategy<Option<u64>> {
    prop::option::of(0..10u64).boxed()
}

/// Full formulas; negation only ever wraps propositional subtrees, since the
/// evaluator rejects negated temporal operators.
fn spec() -> BoxedStrategy<Spec> {
    propositional()
        .prop_recursive(5, 48, 3, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone())
                    .prop_map(|(l, r)| Spec::And(Box::new(l), Box::new(r))),
                (inner.clone(), inner.clone())
                    .prop_map(|(l, r)| Spec::Or(Box::new(l), Box::new(r))),
                (inner.clone(), inner.clone())
                    .prop_map(|(l, r)| Spec::Implies(Box::new(l), Box::new(r))),
                inner.clone().prop_map(|sub| Spec::Next(Box::new(sub))),
                (inner.clone(), bound())
                    .prop_map(|(sub, bound)| Spec::Always(Box::new(sub), bound)),
                (inner, 0..10u64)
                    .prop_map(|(sub, bound)| Spec::Eventually(Box::new(sub), bound)),
            ]
        })
        .boxed()
}

fn trace() -> BoxedStrategy<Vec<State>> {
    prop::collection::vec(any::<State>(), 1..10).boxed()
}

struct Session {
    runtime: Runtime<State>,
    x: ExtractorCell<State, bool>,
    y: ExtractorCell<State, bool>,
}

impl Session {
    fn new() -> Self {
        let mut runtime = Runtime::new();
        let x = runtime.extractor("x", |state: &State| state.0).unwrap();
        let y = runtime.extractor("y", |state: &State| state.1).unwrap();
        Session { runtime, x, y }
    }
}

/// Run two formulas in lock-step over the same trace, one millisecond per
/// state, and return the final verdicts and end time.
fn run_pair(left: &Spec, right: &Spec, trace: &[State]) -> (Value, Value, Time) {
    let mut session = Session::new();
    let left = build(left, &session.x, &session.y);
    let right = build(right, &session.x, &session.y);

    let mut time = session.runtime.register_state(trace[0], 0).unwrap();
    let mut left_value = evaluate(&left, time).unwrap();
    let mut right_value = evaluate(&right, time).unwrap();

    for (offset, state) in trace.iter().enumerate().skip(1) {
        let (Value::Residual(left_residual), Value::Residual(right_residual)) =
            (&left_value, &right_value)
        else {
            break;
        };
        let (left_residual, right_residual) = (left_residual.clone(), right_residual.clone());
        time = session
            .runtime
            .register_state(*state, offset as u64)
            .unwrap();
        left_value = step(&left_residual, time).unwrap();
        right_value = step(&right_residual, time).unwrap();
    }
    (left_value, right_value, time)
}

/// Verdicts agree up to violation shape; residuals are compared through
/// their stop defaults.
fn assert_verdicts_agree(left: Value, right: Value, time: Time) {
    fn class(value: &Value, time: Time) -> bool {
        match value {
            Value::True => true,
            Value::False(_) => false,
            Value::Residual(residual) => {
                matches!(stop_default(residual, time), StopDefault::True)
            }
        }
    }
    let (left_class, right_class) = (class(&left, time), class(&right, time));
    if left_class != right_class {
        panic!("\n{left:?}\n\n!=\n\n{right:?}\n");
    }
}

fn residual_or_fail(value: &Value) -> &Residual {
    match value {
        Value::Residual(residual) => residual,
        other => panic!("expected a residual, got {other:?}"),
    }
}

// Distributivity laws that survive bounded-online semantics.
proptest! {
    // X(p && q) <=> (X p) && (X q)
    #[test]
    fn next_distributes_over_conjunction(p in spec(), q in spec(), states in trace()) {
        let left = Spec::Next(Box::new(Spec::And(Box::new(p.clone()), Box::new(q.clone()))));
        let right = Spec::And(
            Box::new(Spec::Next(Box::new(p))),
            Box::new(Spec::Next(Box::new(q))),
        );
        let (lv, rv, time) = run_pair(&left, &right, &states);
        assert_verdicts_agree(lv, rv, time);
    }

    // X(p || q) <=> (X p) || (X q)
    #[test]
    fn next_distributes_over_disjunction(p in spec(), q in spec(), states in trace()) {
        let left = Spec::Next(Box::new(Spec::Or(Box::new(p.clone()), Box::new(q.clone()))));
        let right = Spec::Or(
            Box::new(Spec::Next(Box::new(p))),
            Box::new(Spec::Next(Box::new(q))),
        );
        let (lv, rv, time) = run_pair(&left, &right, &states);
        assert_verdicts_agree(lv, rv, time);
    }

    // G(p && q) <=> (G p) && (G q), with the same bound on both sides
    #[test]
    fn always_distributes_over_conjunction(
        p in spec(),
        q in spec(),
        b in bound(),
        states in trace(),
    ) {
        let left = Spec::Always(Box::new(Spec::And(Box::new(p.clone()), Box::new(q.clone()))), b);
        let right = Spec::And(
            Box::new(Spec::Always(Box::new(p), b)),
            Box::new(Spec::Always(Box::new(q), b)),
        );
        let (lv, rv, time) = run_pair(&left, &right, &states);
        assert_verdicts_agree(lv, rv, time);
    }

    // F(p || q) <=> (F p) || (F q), with the same bound on both sides
    #[test]
    fn eventually_distributes_over_disjunction(
        p in spec(),
        q in spec(),
        b in 0..10u64,
        states in trace(),
    ) {
        let left = Spec::Eventually(Box::new(Spec::Or(Box::new(p.clone()), Box::new(q.clone()))), b);
        let right = Spec::Or(
            Box::new(Spec::Eventually(Box::new(p), b)),
            Box::new(Spec::Eventually(Box::new(q), b)),
        );
        let (lv, rv, time) = run_pair(&left, &right, &states);
        assert_verdicts_agree(lv, rv, time);
    }
}

// Single-state invariants.
proptest! {
    // A modal-free formula agrees with the propositional truth value.
    #[test]
    fn propositional_agrees_with_truth_tables(p in propositional(), state in any::<State>()) {
        let mut session = Session::new();
        let formula = build(&p, &session.x, &session.y);
        let time = session.runtime.register_state(state, 0).unwrap();
        let value = evaluate(&formula, time).unwrap();
        match value {
            Value::True => prop_assert!(truth(&p, state)),
            Value::False(_) => prop_assert!(!truth(&p, state)),
            Value::Residual(_) => prop_assert!(false, "modal-free formula deferred"),
        }
    }

    // Evaluation at a fixed state is deterministic.
    #[test]
    fn evaluation_is_deterministic(p in propositional(), state in any::<State>()) {
        let mut session = Session::new();
        let formula = build(&p, &session.x, &session.y);
        let time = session.runtime.register_state(state, 0).unwrap();
        let first = evaluate(&formula, time).unwrap();
        let second = evaluate(&formula, time).unwrap();
        prop_assert_eq!(first, second);
    }

    // The prettyprint form is stable across rebuilds.
    #[test]
    fn prettyprint_is_stable(p in spec()) {
        let session = Session::new();
        let first = build(&p, &session.x, &session.y).to_string();
        let second = build(&p, &session.x, &session.y).to_string();
        prop_assert_eq!(first, second);
    }
}

// Whole-trace invariants.
proptest! {
    // always(x) passes iff every state satisfies x; otherwise the violation
    // points at the first falsifying timestamp.
    #[test]
    fn always_matches_universal_quantification(states in trace()) {
        let mut session = Session::new();
        let cell = session.x.clone();
        let property = always(now("x", move || Ok(cell.current()?)));
        let entries: Vec<(State, u64)> = states
            .iter()
            .enumerate()
            .map(|(offset, state)| (*state, offset as u64))
            .collect();
        let result = test(&mut session.runtime, property, entries).unwrap();
        let end = session.runtime.current_time().unwrap();
        match states.iter().position(|state| !state.0) {
            None => {
                prop_assert_eq!(result.settle(end), TestResult::Passed);
            }
            Some(first_false) => match result {
                TestResult::Failed {
                    violation: crate::Violation::Always { time, .. },
                } => {
                    prop_assert_eq!(time, Time::from_millis(first_false as u64));
                }
                other => panic!("expected an always violation, got {other:?}"),
            },
        }
    }

    // eventually(x).within(d) passes iff some state in the window satisfies
    // x; it fails at the first step past the deadline and is inconclusive
    // only if the trace ends inside the window.
    #[test]
    fn eventually_matches_windowed_existential(states in trace(), deadline in 0..12u64) {
        let mut session = Session::new();
        let cell = session.x.clone();
        let property = eventually(now("x", move || Ok(cell.current()?)))
            .within(deadline, TimeUnit::Milliseconds);
        let entries: Vec<(State, u64)> = states
            .iter()
            .enumerate()
            .map(|(offset, state)| (*state, offset as u64))
            .collect();
        let result = test(&mut session.runtime, property, entries).unwrap();

        let satisfied = states
            .iter()
            .enumerate()
            .any(|(offset, state)| offset as u64 <= deadline && state.0);
        let past_deadline = states.len() as u64 > deadline + 1;
        if satisfied {
            prop_assert_eq!(result, TestResult::Passed);
        } else if past_deadline {
            prop_assert!(matches!(result, TestResult::Failed { .. }), "expected Failed");
        } else {
            prop_assert!(matches!(result, TestResult::Inconclusive { .. }), "expected Inconclusive");
        }
    }

    // Admitting more states never reverts a decided verdict.
    #[test]
    fn verdicts_are_monotonic(p in spec(), states in trace(), extension in trace()) {
        let short = {
            let mut session = Session::new();
            let property = build(&p, &session.x, &session.y);
            let entries: Vec<(State, u64)> = states
                .iter()
                .enumerate()
                .map(|(offset, state)| (*state, offset as u64))
                .collect();
            test(&mut session.runtime, property, entries).unwrap()
        };
        if !matches!(short, TestResult::Inconclusive { .. }) {
            let long = {
                let mut session = Session::new();
                let property = build(&p, &session.x, &session.y);
                let entries: Vec<(State, u64)> = states
                    .iter()
                    .chain(extension.iter())
                    .enumerate()
                    .map(|(offset, state)| (*state, offset as u64))
                    .collect();
                test(&mut session.runtime, property, entries).unwrap()
            };
            match (short, long) {
                (TestResult::Passed, TestResult::Passed) => {}
                (TestResult::Failed { .. }, TestResult::Failed { .. }) => {}
                (short, long) => panic!("verdict flipped: {short:?} vs {long:?}"),
            }
        }
    }
}

// A residual stepped past an eventually deadline settles exactly like its
// stop default predicts (the default is a conservative prophecy).
proptest! {
    #[test]
    fn eventually_stop_default_predicts_timeout(deadline in 0..5u64) {
        let mut session = Session::new();
        let cell = session.x.clone();
        let formula = eventually(now("x", move || Ok(cell.current()?)))
            .within(deadline, TimeUnit::Milliseconds)
            .into_formula()
            .unwrap();
        let time = session.runtime.register_state((false, false), 0).unwrap();
        let value = evaluate(&formula, time).unwrap();
        let residual = residual_or_fail(&value).clone();
        prop_assert!(matches!(
            stop_default(&residual, time),
            StopDefault::False(_)
        ));
        let time = session
            .runtime
            .register_state((false, false), deadline + 1)
            .unwrap();
        prop_assert!(matches!(step(&residual, time).unwrap(), Value::False(_)));
    }
}
