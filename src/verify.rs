use crate::properties::SpecFile;
use crate::recording::Recording;
use crate::report::{CheckOutcome, Report};
use anyhow::{Context, bail};
use clap::Parser;
use log::{info, trace};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use vigil_core::Runtime;

const NO_PROPS_ERR: &str = "no properties selected.\n
Examples:
'vigil SPEC.json verify RECORDING.json --all' checks every property in the specification
'vigil SPEC.json verify RECORDING.json -p PROPERTY_1 -p PROPERTY_2' checks the named properties only";

/// Verify properties against recorded sessions.
#[derive(Debug, Clone, Parser)]
#[deny(missing_docs)]
pub(crate) struct VerifyArgs {
    /// Recorded session files to replay (JSON).
    #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
    pub(crate) recordings: Vec<PathBuf>,
    /// Name of a property to check; may be repeated.
    #[arg(short, long = "property")]
    pub(crate) properties: Vec<String>,
    /// Check all properties found in the specification.
    /// It is equivalent to listing all of the properties.
    #[arg(short, long)]
    pub(crate) all: bool,
    /// Replay the recordings on a single thread.
    ///
    /// By default, VIGIL replays recordings in parallel, one isolated
    /// evaluation runtime per recording.
    #[arg(long)]
    pub(crate) single_thread: bool,
}

impl VerifyArgs {
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.properties.is_empty() && !self.all {
            bail!(NO_PROPS_ERR);
        }
        if !self.properties.is_empty() && self.all {
            bail!("the --all flag is incompatible with individually-selected properties");
        }
        Ok(())
    }

    pub(crate) fn verify(
        &self,
        spec_name: String,
        spec: &SpecFile,
        selected: &[String],
    ) -> anyhow::Result<Report> {
        info!("replay starting for {} recordings", self.recordings.len());
        let start_time = Instant::now();

        let replay = |path: &PathBuf| check_recording(spec, selected, path);
        let outcomes: Vec<Vec<CheckOutcome>> = if self.single_thread {
            self.recordings
                .iter()
                .map(replay)
                .collect::<anyhow::Result<_>>()?
        } else {
            self.recordings
                .par_iter()
                .map(replay)
                .collect::<anyhow::Result<_>>()?
        };

        let elapsed = start_time.elapsed();
        info!("replay time elapsed: {elapsed:0.2?}");
        Ok(Report::assemble(spec_name, self.recordings.len(), outcomes))
    }
}

/// Replay one recording against the selected properties.
///
/// Admission stops early once every property has settled; properties still
/// pending when the recording ends are resolved with their end-of-trace
/// defaults.
fn check_recording(
    spec: &SpecFile,
    selected: &[String],
    path: &Path,
) -> anyhow::Result<Vec<CheckOutcome>> {
    let recording = Recording::load(path)?;
    if recording.states.is_empty() {
        bail!("recording {} contains no states", path.display());
    }
    let label = recording.label(path);

    let mut runtime = Runtime::new();
    let mut monitor = spec
        .compile(&mut runtime, selected)
        .with_context(|| format!("compiling specification for {}", path.display()))?;

    for snapshot in &recording.states {
        let time = runtime
            .register_state(snapshot.state.clone(), snapshot.at)
            .with_context(|| {
                format!("admitting state at {}ms from {}", snapshot.at, path.display())
            })?;
        monitor
            .observe(time)
            .with_context(|| format!("evaluating properties at {}ms", snapshot.at))?;
        if monitor.decided() {
            trace!("all properties settled early for {label}");
            break;
        }
    }
    let end = runtime.current_time().expect("at least one admitted state");

    Ok(monitor
        .finish()?
        .into_iter()
        .map(|(property, result)| CheckOutcome::new(label.clone(), property, result.settle(end)))
        .collect())
}
