//! Run stages: clean, compile and discover, reconcile, test, pack.

use std::collections::BTreeMap;

use crate::unity::NativePlugin;

mod clean;
mod orchestrator;
mod package;
mod reconcile;
mod report;
mod test_build;

/// Registered plug-ins keyed by identifier.
pub type ResultsTable = BTreeMap<String, NativePlugin>;

pub use clean::{clean_tests, remove_folder};
pub use orchestrator::{ordered_plugin_paths, BuildOrchestrator};
pub use package::{find_manifest, pack_command, pack_plugin, DemoStash, ManifestError, ManifestSearch, PackageManifest};
pub use reconcile::{matching_installation, partition, reconcile, ReconcileError, ReconcileReport};
pub use report::{PluginOutcome, RunReport};
pub use test_build::{build_tests, run_dir_name, test_identifier};
