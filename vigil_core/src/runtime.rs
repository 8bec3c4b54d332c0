use crate::error::{CellError, ExtractorError, RuntimeError};
use crate::time::Time;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Read access to a cell's time-indexed history of extracted values.
///
/// Thunks hold cell handles and read them while a formula is evaluated or
/// stepped; every read within one step sees the same admitted snapshot.
pub trait Cell<T> {
    /// The value at the most recently admitted time.
    fn current(&self) -> Result<T, CellError>;

    /// The value at an earlier admitted time.
    ///
    /// `at(t)` for the current time is `current()`; a later `t` fails with
    /// [`CellError::FutureAccess`], an earlier `t` that was never admitted
    /// with [`CellError::UnknownTime`].
    fn at(&self, time: Time) -> Result<T, CellError>;
}

type ExtractFn<S, T> = dyn Fn(&S) -> Result<T, ExtractorError>;

struct ExtractorState<S, T> {
    name: String,
    extract: Box<ExtractFn<S, T>>,
    history: RefCell<BTreeMap<Time, T>>,
}

/// A cell that applies a pure extraction function to every admitted state and
/// keeps the results keyed by admission time.
///
/// Handles are cheap to clone and share the same history; closures capture
/// them to read state from inside formulas.
pub struct ExtractorCell<S, T> {
    state: Rc<ExtractorState<S, T>>,
}

impl<S, T> Clone for ExtractorCell<S, T> {
    fn clone(&self) -> Self {
        ExtractorCell {
            state: Rc::clone(&self.state),
        }
    }
}

impl<S, T> ExtractorCell<S, T> {
    /// The name this cell was registered under.
    pub fn name(&self) -> &str {
        &self.state.name
    }
}

impl<S, T: Clone> Cell<T> for ExtractorCell<S, T> {
    fn current(&self) -> Result<T, CellError> {
        self.state
            .history
            .borrow()
            .last_key_value()
            .map(|(_, value)| value.clone())
            .ok_or_else(|| CellError::CurrentWithoutAdmission {
                cell: self.state.name.clone(),
            })
    }

    fn at(&self, time: Time) -> Result<T, CellError> {
        let history = self.state.history.borrow();
        if let Some(value) = history.get(&time) {
            return Ok(value.clone());
        }
        match history.last_key_value() {
            Some((&current, _)) if current.is_before(time) => Err(CellError::FutureAccess {
                cell: self.state.name.clone(),
                requested: time,
                current,
            }),
            _ => Err(CellError::UnknownTime {
                cell: self.state.name.clone(),
                time,
            }),
        }
    }
}

/// The distinguished cell whose current value is the runtime's current time.
#[derive(Clone)]
pub struct TimeCell {
    now: Rc<RefCell<Option<Time>>>,
}

impl Cell<Time> for TimeCell {
    fn current(&self) -> Result<Time, CellError> {
        self.now
            .borrow()
            .ok_or_else(|| CellError::CurrentWithoutAdmission {
                cell: "time".to_string(),
            })
    }

    fn at(&self, time: Time) -> Result<Time, CellError> {
        let current = self.current()?;
        if current.is_before(time) {
            Err(CellError::FutureAccess {
                cell: "time".to_string(),
                requested: time,
                current,
            })
        } else {
            Ok(time)
        }
    }
}

trait UpdateCell<S> {
    fn name(&self) -> &str;
    fn update(&self, state: &S, time: Time) -> Result<(), ExtractorError>;
}

impl<S, T> UpdateCell<S> for ExtractorCell<S, T> {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn update(&self, state: &S, time: Time) -> Result<(), ExtractorError> {
        let value = (self.state.extract)(state)?;
        self.state.history.borrow_mut().insert(time, value);
        Ok(())
    }
}

/// Per-test-run registrar of extractor cells and owner of the current
/// observation.
///
/// A runtime is single-threaded and drives one observation session: register
/// cells, then admit states one by one with non-decreasing timestamps. On each
/// admission every registered cell extracts and stores its snapshot, in
/// registration order. Extractors receive only the admitted state and cannot
/// reach back into the runtime.
pub struct Runtime<S> {
    state: Option<S>,
    now: Rc<RefCell<Option<Time>>>,
    cells: Vec<Box<dyn UpdateCell<S>>>,
}

impl<S: 'static> Default for Runtime<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> Runtime<S> {
    /// A fresh runtime with no cells and no admitted state.
    pub fn new() -> Self {
        Runtime {
            state: None,
            now: Rc::new(RefCell::new(None)),
            cells: Vec::new(),
        }
    }

    /// Register an extractor cell computing `extract` over every admitted
    /// state. Fails with [`RuntimeError::LateRegistration`] once a state has
    /// been admitted.
    pub fn extractor<T, F>(
        &mut self,
        name: impl Into<String>,
        extract: F,
    ) -> Result<ExtractorCell<S, T>, RuntimeError>
    where
        T: Clone + 'static,
        F: Fn(&S) -> T + 'static,
    {
        self.try_extractor(name, move |state| Ok(extract(state)))
    }

    /// Register a fallible extractor cell. A failing extraction aborts the
    /// admission with [`RuntimeError::ExtractorFailed`].
    pub fn try_extractor<T, F>(
        &mut self,
        name: impl Into<String>,
        extract: F,
    ) -> Result<ExtractorCell<S, T>, RuntimeError>
    where
        T: Clone + 'static,
        F: Fn(&S) -> Result<T, ExtractorError> + 'static,
    {
        if self.now.borrow().is_some() {
            return Err(RuntimeError::LateRegistration);
        }
        let cell = ExtractorCell {
            state: Rc::new(ExtractorState {
                name: name.into(),
                extract: Box::new(extract),
                history: RefCell::new(BTreeMap::new()),
            }),
        };
        self.cells.push(Box::new(cell.clone()));
        Ok(cell)
    }

    /// Handle to the distinguished time cell.
    pub fn time(&self) -> TimeCell {
        TimeCell {
            now: Rc::clone(&self.now),
        }
    }

    /// Time of the latest successful admission, if any.
    pub fn current_time(&self) -> Option<Time> {
        *self.now.borrow()
    }

    /// The latest admitted state, if any.
    pub fn current_state(&self) -> Option<&S> {
        self.state.as_ref()
    }

    /// Admit a new state snapshot at `timestamp_ms`.
    ///
    /// Timestamps must not decrease; admitting at the current time again
    /// replaces that snapshot in every cell. All registered cells are updated
    /// before the admission becomes current, so a failing extractor leaves
    /// the current time unchanged.
    pub fn register_state(&mut self, state: S, timestamp_ms: u64) -> Result<Time, RuntimeError> {
        let time = Time::from_millis(timestamp_ms);
        if let Some(current) = *self.now.borrow()
            && time.is_before(current)
        {
            return Err(RuntimeError::NonMonotonicTime { current, new: time });
        }
        for cell in &self.cells {
            cell.update(&state, time)
                .map_err(|cause| RuntimeError::ExtractorFailed {
                    cell: cell.name().to_owned(),
                    cause,
                })?;
        }
        *self.now.borrow_mut() = Some(time);
        self.state = Some(state);
        Ok(time)
    }

    /// Drop the current observation and clear all registered cells.
    pub fn reset(&mut self) {
        self.state = None;
        *self.now.borrow_mut() = None;
        self.cells.clear();
    }
}
