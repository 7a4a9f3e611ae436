//! End-of-run report.

use std::fmt::{self, Write as _};
use std::path::PathBuf;

use super::ResultsTable;
use crate::core::{RunWarning, WarningLog};

/// What happened to a plug-in folder during the per-plug-in pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOutcome {
    /// Built (or previously built) libraries were found; later stages use it.
    Registered,
    /// Discovery ran and found no platforms.
    NoPlatforms,
    /// No `NativeLibraries~` folder exists, so discovery never ran.
    MissingNativeLibraries,
    /// A compiler failure was not continued past.
    BuildAborted,
    /// The folder is not a usable plug-in.
    Abandoned(String),
    /// Already registered earlier in this run.
    AlreadyTracked,
    /// Excluded by the plug-in selection.
    NotSelected,
}

impl PluginOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered)
    }
}

impl fmt::Display for PluginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered => f.write_str("registered"),
            Self::NoPlatforms => f.write_str("no platforms discovered"),
            Self::MissingNativeLibraries => f.write_str("no native library folder"),
            Self::BuildAborted => f.write_str("build aborted"),
            Self::Abandoned(reason) => write!(f, "abandoned: {reason}"),
            Self::AlreadyTracked => f.write_str("already processed"),
            Self::NotSelected => f.write_str("not selected"),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Outcome per visited plug-in folder, in processing order
    pub outcomes: Vec<(String, PluginOutcome)>,

    /// Registered plug-ins
    pub results: ResultsTable,

    /// Projects opened with their own editor version
    pub touched: Vec<String>,

    /// Projects opened with a different editor version
    pub upgraded: Vec<String>,

    /// Archives written
    pub packed: Vec<PathBuf>,

    /// Test player folders written
    pub test_builds: Vec<PathBuf>,

    pub warnings: WarningLog,
}

impl RunReport {
    pub fn outcome(&self, plugin: &str) -> Option<&PluginOutcome> {
        self.outcomes.iter().find(|(id, _)| id == plugin).map(|(_, outcome)| outcome)
    }

    /// Plug-in identifiers in processing order.
    pub fn processing_order(&self) -> Vec<&str> {
        self.outcomes.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Warnings of one kind.
    pub fn warnings_where(&self, predicate: impl Fn(&RunWarning) -> bool) -> Vec<&RunWarning> {
        self.warnings.entries().iter().filter(|w| predicate(w)).collect()
    }

    /// Human readable summary printed at the end of `build`.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let width = self.outcomes.iter().map(|(id, _)| id.len()).max().unwrap_or(0);

        let _ = writeln!(out, "Plug-ins:");
        if self.outcomes.is_empty() {
            let _ = writeln!(out, "  (none found)");
        }
        for (id, outcome) in &self.outcomes {
            let platforms = self
                .results
                .get(id)
                .map(|p| p.unity_project.supported_platforms.keys().map(ToString::to_string).collect::<Vec<_>>())
                .filter(|names| !names.is_empty())
                .map(|names| format!(" ({})", names.join(", ")))
                .unwrap_or_default();
            let _ = writeln!(out, "  {id:<width$}  {outcome}{platforms}");
        }

        let _ = writeln!(out, "Touched: {}", list_or_dash(&self.touched));
        let _ = writeln!(out, "Upgraded: {}", list_or_dash(&self.upgraded));

        if !self.packed.is_empty() {
            let _ = writeln!(out, "Packages:");
            for archive in &self.packed {
                let _ = writeln!(out, "  {}", archive.display());
            }
        }
        if !self.test_builds.is_empty() {
            let _ = writeln!(out, "Test builds:");
            for dir in &self.test_builds {
                let _ = writeln!(out, "  {}", dir.display());
            }
        }

        if self.warnings.is_empty() {
            let _ = writeln!(out, "No warnings.");
        } else {
            let _ = writeln!(out, "Warnings ({}):", self.warnings.len());
            for warning in self.warnings.entries() {
                let _ = writeln!(out, "  - {warning}");
            }
        }
        out
    }
}

fn list_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
