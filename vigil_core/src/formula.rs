use crate::error::{EvalError, FormulaError};
use crate::time::{Duration, TimeUnit};
use serde::{Serialize, Serializer};
use std::fmt;
use std::rc::Rc;

pub(crate) type ThunkFn = Box<dyn Fn() -> Result<Formula, EvalError>>;

/// An LTL formula over opaque predicates.
///
/// Formulas are immutable and cheap to clone: aliased subformulas share their
/// nodes, and residuals hold formulas by shared ownership rather than by copy.
/// Equality and `Display` go through the stable prettyprint form.
#[derive(Clone)]
pub struct Formula(Rc<Node>);

pub(crate) enum Node {
    Pure { value: bool, pretty: String },
    Thunk { pretty: String, thunk: ThunkFn },
    Not(Formula),
    And(Formula, Formula),
    Or(Formula, Formula),
    Implies(Formula, Formula),
    Next(Formula),
    Always { subformula: Formula, bound: Option<Duration> },
    Eventually { subformula: Formula, bound: Option<Duration> },
}

impl Formula {
    fn new(node: Node) -> Self {
        Formula(Rc::new(node))
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0
    }

    pub(crate) fn pure_named(value: bool, pretty: String) -> Self {
        Formula::new(Node::Pure { value, pretty })
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Pure { pretty, .. } | Node::Thunk { pretty, .. } => f.write_str(pretty),
            Node::Not(sub) => write!(f, "not ({sub})"),
            Node::And(left, right) => write!(f, "({left} && {right})"),
            Node::Or(left, right) => write!(f, "({left} || {right})"),
            Node::Implies(left, right) => write!(f, "({left} ==> {right})"),
            Node::Next(sub) => write!(f, "next ({sub})"),
            Node::Always {
                subformula,
                bound: None,
            } => write!(f, "always ({subformula})"),
            Node::Always {
                subformula,
                bound: Some(bound),
            } => write!(f, "always[{bound}] ({subformula})"),
            Node::Eventually {
                subformula,
                bound: None,
            } => write!(f, "eventually ({subformula})"),
            Node::Eventually {
                subformula,
                bound: Some(bound),
            } => write!(f, "eventually[{bound}] ({subformula})"),
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Formula({self})")
    }
}

/// Formulas compare by their prettyprint form.
impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

/// Formulas serialise as their prettyprint form.
impl Serialize for Formula {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lift a constant boolean into a formula.
pub fn pure(value: bool) -> Formula {
    Formula::pure_named(value, value.to_string())
}

/// Lift a boolean-producing closure into a formula.
///
/// The closure is re-invoked at every evaluation site, so reads of cells see
/// the state admitted for that step. `pretty` names the condition in
/// prettyprints and violation reports.
pub fn now<F>(pretty: impl Into<String>, predicate: F) -> Formula
where
    F: Fn() -> Result<bool, EvalError> + 'static,
{
    let pretty = pretty.into();
    let label = pretty.clone();
    Formula::new(Node::Thunk {
        pretty,
        thunk: Box::new(move || Ok(Formula::pure_named(predicate()?, label.clone()))),
    })
}

/// Lift a formula-producing closure into a formula.
///
/// Like [`now`], but the closure picks a whole formula based on current cell
/// values, deferring the choice until the step it is observed in.
pub fn lift<F>(pretty: impl Into<String>, build: F) -> Formula
where
    F: Fn() -> Result<Formula, EvalError> + 'static,
{
    Formula::new(Node::Thunk {
        pretty: pretty.into(),
        thunk: Box::new(build),
    })
}

/// Negation. Only propositional subformulas may be negated; a negated
/// temporal operator is rejected at evaluation time.
pub fn not(subformula: impl IntoFormula) -> Result<Formula, FormulaError> {
    Ok(Formula::new(Node::Not(subformula.into_formula()?)))
}

/// Conjunction.
pub fn and(left: impl IntoFormula, right: impl IntoFormula) -> Result<Formula, FormulaError> {
    Ok(Formula::new(Node::And(
        left.into_formula()?,
        right.into_formula()?,
    )))
}

/// Disjunction.
pub fn or(left: impl IntoFormula, right: impl IntoFormula) -> Result<Formula, FormulaError> {
    Ok(Formula::new(Node::Or(
        left.into_formula()?,
        right.into_formula()?,
    )))
}

/// Implication.
pub fn implies(
    antecedent: impl IntoFormula,
    consequent: impl IntoFormula,
) -> Result<Formula, FormulaError> {
    Ok(Formula::new(Node::Implies(
        antecedent.into_formula()?,
        consequent.into_formula()?,
    )))
}

/// The subformula must hold at the next admitted state.
pub fn next(subformula: impl IntoFormula) -> Result<Formula, FormulaError> {
    Ok(Formula::new(Node::Next(subformula.into_formula()?)))
}

/// The subformula must hold at every admitted state from now on, or within
/// the window set by [`Modal::within`].
pub fn always(subformula: impl IntoFormula) -> Modal {
    Modal {
        kind: ModalKind::Always,
        inner: subformula.into_formula().map(|sub| (sub, None)),
    }
}

/// The subformula must hold at some admitted state within the window set by
/// [`Modal::within`]. The bound is mandatory: without one there is no moment
/// at which an online monitor could answer `false`.
pub fn eventually(subformula: impl IntoFormula) -> Modal {
    Modal {
        kind: ModalKind::Eventually,
        inner: subformula.into_formula().map(|sub| (sub, None)),
    }
}

#[derive(Clone, Copy)]
enum ModalKind {
    Always,
    Eventually,
}

/// An [`always`] or [`eventually`] under construction, accepting a
/// `within(n, unit)` bound before being used as a formula.
pub struct Modal {
    kind: ModalKind,
    inner: Result<(Formula, Option<Duration>), FormulaError>,
}

impl Modal {
    /// Attach a time bound to the operator. Setting a bound twice fails with
    /// [`FormulaError::BoundAlreadySet`].
    pub fn within(self, magnitude: u64, unit: TimeUnit) -> Modal {
        Modal {
            kind: self.kind,
            inner: self.inner.and_then(|(sub, bound)| match bound {
                Some(_) => Err(FormulaError::BoundAlreadySet),
                None => Ok((sub, Some(Duration::new(magnitude, unit)))),
            }),
        }
    }
}

/// Conversion of DSL arguments into formulas.
///
/// Implemented for formulas themselves, plain booleans, modal builders, and
/// the `Result`s the DSL functions return, so builders compose without
/// unwrapping at every level; construction errors surface once, at the
/// outermost conversion.
pub trait IntoFormula {
    /// Produce the formula, or the first construction error.
    fn into_formula(self) -> Result<Formula, FormulaError>;
}

impl IntoFormula for Formula {
    fn into_formula(self) -> Result<Formula, FormulaError> {
        Ok(self)
    }
}

impl IntoFormula for &Formula {
    fn into_formula(self) -> Result<Formula, FormulaError> {
        Ok(self.clone())
    }
}

impl IntoFormula for bool {
    fn into_formula(self) -> Result<Formula, FormulaError> {
        Ok(pure(self))
    }
}

impl IntoFormula for Result<Formula, FormulaError> {
    fn into_formula(self) -> Result<Formula, FormulaError> {
        self
    }
}

impl IntoFormula for Modal {
    fn into_formula(self) -> Result<Formula, FormulaError> {
        let (subformula, bound) = self.inner?;
        match self.kind {
            ModalKind::Always => Ok(Formula::new(Node::Always { subformula, bound })),
            ModalKind::Eventually => {
                if bound.is_none() {
                    return Err(FormulaError::UnboundedEventually);
                }
                Ok(Formula::new(Node::Eventually { subformula, bound }))
            }
        }
    }
}
