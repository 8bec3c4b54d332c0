use serde::Serialize;
use serde_json as json;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use vigil_core::{TestResult, Violation};

/// Outcome of one property checked against one recording.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CheckOutcome {
    pub(crate) recording: String,
    pub(crate) property: String,
    pub(crate) passed: bool,
    /// The structured violation tree, for machine consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) violation: Option<json::Value>,
    /// The violation rendered as one human-readable clause.
    #[serde(skip)]
    pub(crate) rendered: Option<String>,
}

impl CheckOutcome {
    /// Summarise a settled result. Verdicts are serialised here, inside the
    /// replay task, so outcomes can cross thread boundaries.
    pub(crate) fn new(recording: String, property: String, result: TestResult) -> Self {
        match result {
            TestResult::Passed => CheckOutcome {
                recording,
                property,
                passed: true,
                violation: None,
                rendered: None,
            },
            TestResult::Failed { violation } => CheckOutcome {
                recording,
                property,
                passed: false,
                violation: json::to_value(&violation).ok(),
                rendered: Some(render_violation(&violation)),
            },
            // `settle` decides every pending residual; this arm is for
            // callers that skipped it.
            TestResult::Inconclusive { .. } => CheckOutcome {
                recording,
                property,
                passed: false,
                violation: None,
                rendered: Some("verdict still pending at the end of the recording".to_string()),
            },
        }
    }
}

#[derive(Serialize)]
pub(crate) struct Report {
    pub(crate) spec: String,
    pub(crate) recordings: usize,
    pub(crate) checks: usize,
    pub(crate) passed: usize,
    pub(crate) failed: usize,
    pub(crate) property_failures: BTreeMap<String, u32>,
    pub(crate) outcomes: Vec<CheckOutcome>,
}

impl Report {
    pub(crate) fn assemble(
        spec: String,
        recordings: usize,
        outcomes: Vec<Vec<CheckOutcome>>,
    ) -> Self {
        let outcomes: Vec<CheckOutcome> = outcomes.into_iter().flatten().collect();
        let mut property_failures: BTreeMap<String, u32> = BTreeMap::new();
        let mut passed = 0;
        let mut failed = 0;
        for outcome in &outcomes {
            let failures = property_failures.entry(outcome.property.clone()).or_insert(0);
            if outcome.passed {
                passed += 1;
            } else {
                failed += 1;
                *failures += 1;
            }
        }
        Report {
            spec,
            recordings,
            checks: outcomes.len(),
            passed,
            failed,
            property_failures,
            outcomes,
        }
    }

    pub(crate) fn print(&self, json: bool) {
        if json {
            let report = json::ser::to_string_pretty(&self).expect("report serialization");
            println!("{report}");
        } else {
            // Print final report
            println!("{self}");
        };
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "VIGIL results for {} ({} recordings, {} checks)",
            self.spec, self.recordings, self.checks
        )?;
        writeln!(f, "{} passed, {} failed", self.passed, self.failed)?;
        for (property, &failures) in self.property_failures.iter() {
            if failures > 0 {
                writeln!(f, "{property}: {failures} fails")?;
            } else {
                writeln!(f, "{property}: ok")?;
            }
        }
        for outcome in self.outcomes.iter().filter(|outcome| !outcome.passed) {
            let rendered = outcome.rendered.as_deref().unwrap_or("no evidence recorded");
            writeln!(
                f,
                "[{}] {} failed: {}",
                outcome.recording, outcome.property, rendered
            )?;
        }
        Ok(())
    }
}

/// Render a violation tree as one human-readable clause.
pub(crate) fn render_violation(violation: &Violation) -> String {
    format!("{}", Rendered(violation))
}

struct Rendered<'a>(&'a Violation);

impl<'a> Display for Rendered<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Violation::False { time, condition } => {
                write!(f, "'{condition}' was false at {time}")
            }
            Violation::Atomic { time, formula } => {
                write!(f, "'{formula}' was false at {time}")
            }
            Violation::Next { time, formula } => {
                write!(f, "'{formula}' did not hold at the following step ({time})")
            }
            Violation::Always { time, violation } => {
                write!(f, "an invariant broke at {time}: {}", Rendered(violation))
            }
            Violation::Eventually { time, formula } => {
                write!(f, "'{formula}' did not happen in time (gave up at {time})")
            }
            Violation::And { left, right } => {
                write!(f, "{} and {}", Rendered(left), Rendered(right))
            }
            Violation::Or { left, right } => {
                write!(
                    f,
                    "neither alternative held: {}; {}",
                    Rendered(left),
                    Rendered(right)
                )
            }
            Violation::Implies {
                antecedent,
                consequent,
            } => {
                write!(f, "given '{antecedent}': {}", Rendered(consequent))
            }
        }
    }
}
