//! # VIGIL
//!
//! VIGIL checks recorded browser observation sessions against temporal
//! properties of the observed UI state.
//!
//! A *recording* is a JSON file of timestamped state snapshots captured while
//! driving an application. A *specification* is a JSON file of named
//! linear-temporal-logic properties over that state (invariants, response
//! deadlines, and the like). VIGIL replays each recording through the online
//! evaluator in [`vigil_core`], reaching a verdict as early as the trace
//! allows, and reports which properties held, which were violated and why.

mod properties;
mod recording;
mod report;
mod verify;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use properties::SpecFile;
use std::path::PathBuf;
use verify::VerifyArgs;
use vigil_core::Runtime;

/// VIGIL's available commands.
#[deny(missing_docs)]
#[derive(Subcommand)]
enum Commands {
    /// Validate the specification without replaying any recordings.
    Validate,
    /// Replay recordings and verify properties against them.
    ///
    /// EXAMPLE: vigil SPEC.json verify RECORDING.json --all
    /// EXAMPLE: vigil SPEC.json verify RECORDING.json -p PROPERTY -p ANOTHER_PROPERTY
    #[clap(verbatim_doc_comment)]
    Verify {
        /// Args for recording verification.
        #[clap(flatten)]
        args: VerifyArgs,
        /// Print the final report as JSON.
        ///
        /// By default, VIGIL prints a user-friendly report at the end of
        /// verification. This flag has the report printed in JSON format
        /// instead, including the structured violation trees.
        #[arg(long)]
        json: bool,
    },
}

/// A checker of temporal properties over recorded UI observation sessions.
///
/// VIGIL replays recorded state traces against linear-temporal-logic
/// properties, producing verdicts with structured evidence for every
/// violation.
#[derive(Parser)]
#[deny(missing_docs)]
#[command(version, about, long_about)]
pub struct Cli {
    /// Path of the property specification file (JSON).
    #[arg(value_hint = clap::ValueHint::FilePath)]
    spec: PathBuf,
    /// Verbose output
    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity,
    /// Actions to execute against the specification.
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let name = self
            .spec
            .file_name()
            .map(|os_str| os_str.to_str().expect("path is valid Unicode"))
            .unwrap_or("specification")
            .to_owned();
        let spec = SpecFile::load(&self.spec)?;

        match self.command {
            Commands::Verify { args, json } => {
                args.validate()?;
                let selected = if args.all {
                    spec.names()
                } else {
                    args.properties.clone()
                };
                validate_properties(&selected, &spec.names())?;
                eprint!("Replaying recordings...");
                let report = args.verify(name, &spec, &selected)?;
                eprintln!(" done");
                report.print(json);
            }
            Commands::Validate => {
                // Compiling against a throwaway runtime surfaces every
                // construction error a replay would hit.
                let mut runtime: Runtime<serde_json::Value> = Runtime::new();
                spec.compile(&mut runtime, &spec.names())?;
                println!("specification '{name}' successfully validated");
            }
        }
        Ok(())
    }
}

fn validate_properties(props: &[String], all_props: &[String]) -> anyhow::Result<()> {
    if let Some(prop) = props.iter().find(|prop| !all_props.contains(prop)) {
        Err(anyhow!(
            "no property named '{prop}' found in the specification.\n\nHint: maybe it is mispelled?"
        ))
    } else {
        Ok(())
    }
}

// From Clap tutorial <https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing>
#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
