use anyhow::Context;
use serde::Deserialize;
use serde_json as json;
use std::path::Path;

/// A recorded observation session: state snapshots with millisecond
/// timestamps, in capture order.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Recording {
    /// Optional human-readable label for the session.
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// The captured snapshots.
    pub(crate) states: Vec<Snapshot>,
}

/// One captured snapshot of observable state.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Snapshot {
    /// Capture time in milliseconds.
    pub(crate) at: u64,
    /// The observed state.
    pub(crate) state: json::Value,
}

impl Recording {
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading recording {}", path.display()))?;
        json::from_str(&contents).with_context(|| format!("parsing recording {}", path.display()))
    }

    /// The session's label: its own name if it carries one, the file name
    /// otherwise.
    pub(crate) fn label(&self, path: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        })
    }
}
