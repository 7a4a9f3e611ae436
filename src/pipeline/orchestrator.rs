//! The build pipeline.
//!
//! Plug-ins go through clean, compile, and discovery one at a time, Core
//! first. Those with at least one discovered platform are registered in the
//! results table, which is the only input to the later stages: version
//! reconciliation, test builds, and packing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::clean::{clean_tests, remove_folder};
use super::package::pack_plugin;
use super::reconcile::{reconcile, ReconcileError};
use super::report::{PluginOutcome, RunReport};
use super::test_build::build_tests;
use super::ResultsTable;
use crate::core::{
    BuildAction, CleanAction, CommandRunner, Decision, PluginSelection, Prompter, RunOptions, RunWarning,
    ToolOutput, WarningLog, WorkingDirGuard,
};
use crate::toolchain::{build_invocations, parse_xcode_version, select_codesign_identity, version_command};
use crate::unity::{
    locate_native_libraries, plugin_id_from_folder, scan_plugin, sorted_entries, InstallationRegistry,
    NativePlugin, PlatformDiscovery, CORE_PLUGIN_ID,
};

/// Plug-in folders under `root`, Core first and the rest in name order.
pub fn ordered_plugin_paths(root: &Path) -> io::Result<Vec<PathBuf>> {
    let (core, rest): (Vec<PathBuf>, Vec<PathBuf>) = sorted_entries(root)?
        .into_iter()
        .filter(|p| p.is_dir())
        .partition(|p| plugin_id_from_folder(p) == CORE_PLUGIN_ID);
    Ok(core.into_iter().chain(rest).collect())
}

/// Drives one run over every plug-in under the plug-in root.
pub struct BuildOrchestrator<'a> {
    options: RunOptions,
    runner: &'a dyn CommandRunner,
    prompter: &'a mut dyn Prompter,
    registry: InstallationRegistry,
    results: ResultsTable,
    warnings: WarningLog,
    outcomes: Vec<(String, PluginOutcome)>,
    codesign_identity: Option<String>,
}

impl<'a> BuildOrchestrator<'a> {
    /// Create an orchestrator. Relative paths in `options` are made absolute
    /// against the current directory, since stages change directory.
    pub fn new(options: &RunOptions, runner: &'a dyn CommandRunner, prompter: &'a mut dyn Prompter) -> Self {
        let mut options = options.clone();
        options.plugin_root = absolute(&options.plugin_root);
        options.output_path = absolute(&options.output_path);
        options.test_output_path = absolute(&options.test_output_path);
        options.unity_install_root = absolute(&options.unity_install_root);

        Self {
            options,
            runner,
            prompter,
            registry: InstallationRegistry::new(),
            results: ResultsTable::new(),
            warnings: WarningLog::new(),
            outcomes: Vec::new(),
            codesign_identity: None,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn results(&self) -> &ResultsTable {
        &self.results
    }

    pub fn registry(&self) -> &InstallationRegistry {
        &self.registry
    }

    /// Run every stage and return what happened.
    pub fn run(mut self) -> anyhow::Result<RunReport> {
        tracing::info!(
            plugins = %self.options.plugins.describe(),
            platforms = %self.options.platforms.describe(),
            configs = %self.options.configs.describe(),
            actions = %self.options.actions.describe(),
            "Starting build"
        );

        self.clean_outputs()?;
        self.prepare_outputs()?;

        let building = self.options.actions.contains(BuildAction::Build);
        if building {
            self.log_toolchain_version();
        }
        self.codesign_identity = select_codesign_identity(&self.options.codesign_identity, self.runner, self.prompter)?;

        self.registry = InstallationRegistry::scan(&self.options.unity_install_root, self.runner, &mut self.warnings);
        let have_installations = !self.registry.is_empty();

        let plugin_root = self.options.plugin_root.clone();
        let paths = ordered_plugin_paths(&plugin_root)
            .with_context(|| format!("Failed to read plug-in root {}", plugin_root.display()))?;
        for path in paths {
            let id = plugin_id_from_folder(&path);
            let outcome = self.process_plugin(&path)?;
            tracing::info!(plugin = %id, %outcome, "Plug-in processed");
            self.outcomes.push((id, outcome));
        }
        self.report_missing_selections();

        let mut report = RunReport::default();

        if self.options.touch_projects && !self.results.is_empty() {
            match reconcile(&self.results, &self.registry, self.runner, self.prompter, &mut self.warnings) {
                Ok(reconciled) => {
                    report.touched = reconciled.touched;
                    report.upgraded = reconciled.upgraded;
                }
                Err(ReconcileError::NoInstallations { unmatched }) => {
                    self.warnings.push(RunWarning::UpgradeUnavailable { plugins: unmatched.clone() });
                    for id in unmatched {
                        let version =
                            self.results.get(&id).map(|p| p.unity_project.version.clone()).unwrap_or_default();
                        self.warnings.push(RunWarning::NoMatchingInstallation { plugin: id, version });
                    }
                }
                Err(ReconcileError::Prompt(e)) => return Err(e),
            }
        }

        if self.options.build_tests && have_installations {
            report.test_builds = build_tests(
                &self.results,
                &self.registry,
                &self.options.test_output_path,
                self.runner,
                &mut self.warnings,
            )?;
        }

        if self.options.actions.contains(BuildAction::Pack) && have_installations {
            for plugin in self.results.values() {
                match pack_plugin(
                    plugin,
                    &self.options.output_path,
                    self.options.validate_asmdefs,
                    self.runner,
                    &mut self.warnings,
                ) {
                    Ok(Some(archive)) => report.packed.push(archive),
                    Ok(None) => {}
                    Err(e) => self.warnings.push(RunWarning::PackFailed {
                        plugin: plugin.id.clone(),
                        code: None,
                        output: format!("{e:#}"),
                    }),
                }
            }
        }

        report.outcomes = self.outcomes;
        report.results = self.results;
        report.warnings = self.warnings;
        Ok(report)
    }

    /// Clean, compile, and discover one plug-in folder.
    pub fn process_plugin(&mut self, path: &Path) -> anyhow::Result<PluginOutcome> {
        let id = plugin_id_from_folder(path);

        if self.results.contains_key(&id) {
            tracing::info!(plugin = %id, "Already processed; skipping");
            return Ok(PluginOutcome::AlreadyTracked);
        }
        if !self.options.plugins.includes(&id) {
            tracing::debug!(plugin = %id, "Not selected");
            return Ok(PluginOutcome::NotSelected);
        }

        tracing::info!(plugin = %id, path = %path.display(), "Processing plug-in");
        let mut plugin = match scan_plugin(path, &mut self.warnings) {
            Ok(plugin) => plugin,
            Err(e) => {
                tracing::error!(plugin = %id, error = %e, "Not a usable plug-in");
                return Ok(PluginOutcome::Abandoned(e.to_string()));
            }
        };

        if self.options.clean.contains(CleanAction::Native) {
            if let Some(libraries) = &plugin.unity_project.native_library_path {
                remove_folder(libraries, true, self.options.force_clean, self.prompter, &mut self.warnings)?;
            }
        }

        if self.options.actions.contains(BuildAction::Build) && !self.compile(&plugin)? {
            return Ok(PluginOutcome::BuildAborted);
        }

        let libraries = match plugin.unity_project.native_library_path.clone() {
            Some(existing) if existing.is_dir() => existing,
            _ => match locate_native_libraries(&plugin.unity_project.path, &plugin.id, &mut self.warnings) {
                Some(found) => found,
                None => {
                    tracing::warn!(plugin = %plugin.id, "No native library folder after build");
                    return Ok(PluginOutcome::MissingNativeLibraries);
                }
            },
        };

        let discovery = PlatformDiscovery::new().with_codesign_identity(self.codesign_identity.clone());
        let platforms = match discovery.discover(&libraries, self.runner, &mut self.warnings) {
            Ok(platforms) => platforms,
            Err(e) => {
                tracing::error!(plugin = %plugin.id, error = %e, "Platform discovery failed");
                return Ok(PluginOutcome::Abandoned(format!("could not read {}: {e}", libraries.display())));
            }
        };
        if platforms.is_empty() {
            tracing::warn!(plugin = %plugin.id, path = %libraries.display(), "No supported platforms found");
            return Ok(PluginOutcome::NoPlatforms);
        }

        plugin.unity_project.native_library_path = Some(libraries);
        plugin.unity_project.supported_platforms = platforms;
        self.register(plugin);
        Ok(PluginOutcome::Registered)
    }

    fn register(&mut self, plugin: NativePlugin) {
        tracing::info!(
            plugin = %plugin.id,
            platforms = plugin.unity_project.supported_platforms.len(),
            "Registered plug-in"
        );
        self.results.insert(plugin.id.clone(), plugin);
    }

    /// Run every selected compiler invocation from the native project folder.
    ///
    /// Returns `false` when the user chose not to continue after a failure.
    fn compile(&mut self, plugin: &NativePlugin) -> anyhow::Result<bool> {
        let _cwd = WorkingDirGuard::enter(&plugin.native_project_path)
            .with_context(|| format!("Failed to enter {}", plugin.native_project_path.display()))?;

        for invocation in build_invocations(&self.options.platforms, &self.options.configs, self.options.quiet) {
            let scheme = invocation.scheme();
            let destination = invocation.platform.destination();
            tracing::info!(plugin = %plugin.id, %scheme, %destination, "Compiling");
            tracing::debug!(command = %invocation.command, "Build command");

            let output = self
                .runner
                .run(&invocation.command)
                .unwrap_or_else(|e| ToolOutput::new(None, "", e.to_string()));
            if output.success() {
                continue;
            }

            self.warnings.push(RunWarning::CompileFailed {
                plugin: plugin.id.clone(),
                scheme: scheme.clone(),
                destination: destination.clone(),
                code: output.code,
                output: output.combined(),
            });
            let prompt = format!("Build of '{scheme}' ({destination}) failed for {}. Continue building?", plugin.id);
            if !self.prompter.confirm(Decision::ContinueAfterBuildFailure, &prompt)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn clean_outputs(&mut self) -> anyhow::Result<()> {
        let force = self.options.force_clean;
        if self.options.clean.contains(CleanAction::Packages) {
            remove_folder(&self.options.output_path, false, force, self.prompter, &mut self.warnings)?;
        }
        if self.options.clean.contains(CleanAction::Tests) {
            clean_tests(
                &self.options.test_output_path,
                &self.options.plugin_root,
                force,
                self.prompter,
                &mut self.warnings,
            )?;
        }
        Ok(())
    }

    fn prepare_outputs(&self) -> anyhow::Result<()> {
        if self.options.actions.contains(BuildAction::Pack) {
            fs::create_dir_all(&self.options.output_path)
                .with_context(|| format!("Failed to create {}", self.options.output_path.display()))?;
        }
        if self.options.build_tests {
            fs::create_dir_all(&self.options.test_output_path)
                .with_context(|| format!("Failed to create {}", self.options.test_output_path.display()))?;
        }
        Ok(())
    }

    fn log_toolchain_version(&self) {
        match self.runner.run(&version_command()) {
            Ok(output) if output.success() => match parse_xcode_version(&output.stdout) {
                Some(xcode) => {
                    tracing::info!(version = %xcode.version, build = xcode.build.as_deref().unwrap_or("?"), "Xcode");
                }
                None => tracing::warn!(output = %output.stdout.trim(), "Unrecognised xcodebuild -version output"),
            },
            Ok(output) => tracing::warn!(output = %output.combined().trim(), "xcodebuild -version failed"),
            Err(e) => tracing::warn!(error = %e, "xcodebuild not available"),
        }
    }

    fn report_missing_selections(&mut self) {
        let PluginSelection::Named(names) = &self.options.plugins else {
            return;
        };
        for name in names {
            if !self.outcomes.iter().any(|(id, _)| id == name) {
                self.warnings.push(RunWarning::PluginNotFound { plugin: name.clone() });
            }
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
