use crate::time::Time;
use thiserror::Error;

/// The cause a failing extractor reports through
/// [`RuntimeError::ExtractorFailed`].
pub type ExtractorError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by reads of cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// The requested time is later than the most recently admitted one.
    #[error("cell '{cell}' read at {requested}, after the current time {current}")]
    FutureAccess {
        /// Name of the cell that was read.
        cell: String,
        /// The requested timestamp.
        requested: Time,
        /// The cell's most recent snapshot time.
        current: Time,
    },
    /// The requested time is in the past but was never admitted.
    #[error("cell '{cell}' holds no snapshot at {time}")]
    UnknownTime {
        /// Name of the cell that was read.
        cell: String,
        /// The requested timestamp.
        time: Time,
    },
    /// `current()` was called before the first state admission.
    #[error("cell '{cell}' read before any state was admitted")]
    CurrentWithoutAdmission {
        /// Name of the cell that was read.
        cell: String,
    },
}

/// Errors raised by the runtime during registration and state admission.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The admitted timestamp is strictly earlier than the current time.
    #[error("admission at {new} is before the current time {current}")]
    NonMonotonicTime {
        /// Time of the latest successful admission.
        current: Time,
        /// The offending timestamp.
        new: Time,
    },
    /// An extractor cell was registered after the first state admission.
    #[error("extractor cells must be registered before the first state admission")]
    LateRegistration,
    /// An extractor failed while processing an admitted state.
    ///
    /// The admission is aborted: cells updated before the failing one retain
    /// the new snapshot, but the current time is unchanged.
    #[error("extractor '{cell}' failed")]
    ExtractorFailed {
        /// Name of the failing cell.
        cell: String,
        /// The underlying failure.
        #[source]
        cause: ExtractorError,
    },
}

/// Errors raised while constructing formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// `within` was applied to an operator that already has a bound.
    #[error("a time bound was already set on this operator")]
    BoundAlreadySet,
    /// `eventually` was used without a `within` bound; an unbounded
    /// `eventually` cannot be decided online.
    #[error("'eventually' requires a 'within' bound")]
    UnboundedEventually,
}

/// Errors raised while evaluating or stepping formulas.
#[derive(Debug, Error)]
pub enum EvalError {
    /// `not` was applied to a subformula whose verdict deferred to a later
    /// state. Rewrite the property to push the negation inwards.
    #[error("negation of a temporal operator is not supported: {formula}")]
    NegationOfModal {
        /// Prettyprint of the rejected formula.
        formula: String,
    },
    /// A trace with no states was submitted.
    #[error("trace must contain at least one state")]
    EmptyTrace,
    /// A cell read inside a thunk failed.
    #[error(transparent)]
    Cell(#[from] CellError),
    /// A thunk produced an invalid formula.
    #[error(transparent)]
    Formula(#[from] FormulaError),
    /// State admission failed while driving a trace.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
