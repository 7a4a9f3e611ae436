//! Matching built plug-ins with Unity installations.
//!
//! Projects whose editor version is installed are opened headlessly so Unity
//! regenerates their `.meta` files. The rest are only touched, and therefore
//! upgraded, after the user agrees.

use thiserror::Error;

use super::ResultsTable;
use crate::core::{CommandRunner, Decision, Prompter, RunWarning, WarningLog};
use crate::unity::{InstallationRegistry, NativePlugin, UnityInstallation};

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Upgrade was accepted but there is nothing to upgrade with.
    #[error("Cannot upgrade {} project(s) without a Unity installation", .unmatched.len())]
    NoInstallations { unmatched: Vec<String> },

    /// The prompt could not be answered.
    #[error(transparent)]
    Prompt(#[from] anyhow::Error),
}

/// What reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Opened with their own editor version
    pub touched: Vec<String>,

    /// Opened with a different editor version after consent
    pub upgraded: Vec<String>,

    /// Still without a matching installation
    pub left_unmatched: Vec<String>,
}

/// Installation matching a plug-in's editor version. `Unknown` never matches.
pub fn matching_installation<'r>(
    plugin: &NativePlugin,
    registry: &'r InstallationRegistry,
) -> Option<&'r UnityInstallation> {
    if !plugin.unity_project.has_known_version() {
        return None;
    }
    registry.get(&plugin.unity_project.version)
}

/// Split registered plug-ins into those with and without a matching installation.
pub fn partition<'a>(
    results: &'a ResultsTable,
    registry: &InstallationRegistry,
) -> (Vec<&'a NativePlugin>, Vec<&'a NativePlugin>) {
    results.values().partition(|plugin| matching_installation(plugin, registry).is_some())
}

/// Touch matched projects, then offer to upgrade the rest.
pub fn reconcile(
    results: &ResultsTable,
    registry: &InstallationRegistry,
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
    warnings: &mut WarningLog,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = ReconcileReport::default();
    let (matched, unmatched) = partition(results, registry);

    for plugin in matched {
        let Some(installation) = matching_installation(plugin, registry) else {
            continue;
        };
        if touch(installation, plugin, runner, warnings) {
            report.touched.push(plugin.id.clone());
        }
    }

    if unmatched.is_empty() {
        return Ok(report);
    }

    for plugin in &unmatched {
        tracing::info!(
            plugin = %plugin.id,
            version = %plugin.unity_project.version,
            "No matching Unity installation"
        );
    }

    let prompt = format!(
        "{} project(s) have no matching Unity installation. Upgrade them with an installed version?",
        unmatched.len()
    );
    if !prompter.confirm(Decision::UpgradeProjects, &prompt)? {
        for plugin in unmatched {
            warnings.push(RunWarning::NoMatchingInstallation {
                plugin: plugin.id.clone(),
                version: plugin.unity_project.version.clone(),
            });
            report.left_unmatched.push(plugin.id.clone());
        }
        return Ok(report);
    }

    let installation = match registry.len() {
        0 => {
            return Err(ReconcileError::NoInstallations {
                unmatched: unmatched.iter().map(|p| p.id.clone()).collect(),
            })
        }
        1 => registry.installations().next(),
        _ => {
            let versions = registry.versions();
            let index = prompter.select("Select the Unity version to upgrade with:", &versions)?;
            versions.get(index).and_then(|v| registry.get(v))
        }
    };
    let Some(installation) = installation else {
        return Err(ReconcileError::Prompt(anyhow::anyhow!("Invalid Unity version selection")));
    };

    for plugin in unmatched {
        tracing::info!(plugin = %plugin.id, from = %plugin.unity_project.version, to = %installation.version, "Upgrading project");
        if touch(installation, plugin, runner, warnings) {
            report.upgraded.push(plugin.id.clone());
        }
    }

    Ok(report)
}

fn touch(
    installation: &UnityInstallation,
    plugin: &NativePlugin,
    runner: &dyn CommandRunner,
    warnings: &mut WarningLog,
) -> bool {
    let project = &plugin.unity_project.path;
    match installation.touch_project(runner, project) {
        Ok(output) if output.success() => true,
        Ok(output) => {
            if !output.combined().trim().is_empty() {
                tracing::debug!(output = %output.combined(), "Unity output");
            }
            warnings.push(RunWarning::TouchFailed { project: project.clone(), code: output.code });
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not launch Unity");
            warnings.push(RunWarning::TouchFailed { project: project.clone(), code: None });
            false
        }
    }
}
