//! Unity test player builds.
//!
//! Every run writes into a fresh `TestBuild_<timestamp>` folder under the
//! test output root. Unity builds once per plug-in and platform; the players
//! are then copied into one subfolder per variant.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use walkdir::WalkDir;

use super::reconcile::matching_installation;
use super::ResultsTable;
use crate::core::{CommandRunner, RunWarning, WarningLog};
use crate::unity::{InstallationRegistry, NativePlugin, SdkVariant, UnityPlatform, CORE_PLUGIN_ID};

/// Folder name for a test run started at `started`.
pub fn run_dir_name(started: DateTime<Local>) -> String {
    format!("TestBuild_{}", started.format("%Y-%m-%d_%H-%M-%S"))
}

/// `<plugin>_<version>_<platform>_<variant>`
pub fn test_identifier(plugin: &NativePlugin, platform: UnityPlatform, variant: SdkVariant) -> String {
    format!("{}_{}_{}_{}", plugin.id, plugin.unity_project.version, platform, variant)
}

/// Build test players for every registered plug-in into a new run folder.
///
/// Returns the per-target folders that received a `TestPlayers` copy.
pub fn build_tests(
    results: &ResultsTable,
    registry: &InstallationRegistry,
    test_output: &Path,
    runner: &dyn CommandRunner,
    warnings: &mut WarningLog,
) -> anyhow::Result<Vec<PathBuf>> {
    let run_dir = test_output.join(run_dir_name(Local::now()));
    fs::create_dir_all(&run_dir)?;
    tracing::info!(dir = %run_dir.display(), "Building tests");

    build_tests_in(&run_dir, results, registry, runner, warnings)
}

pub(crate) fn build_tests_in(
    run_dir: &Path,
    results: &ResultsTable,
    registry: &InstallationRegistry,
    runner: &dyn CommandRunner,
    warnings: &mut WarningLog,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut produced = Vec::new();

    for plugin in results.values() {
        let project = &plugin.unity_project;

        let Some(installation) = matching_installation(plugin, registry) else {
            skip(warnings, plugin, format!("no Unity installation for {}", project.version));
            continue;
        };
        if project.test_assemblies.is_empty() {
            skip(warnings, plugin, "no test assemblies".to_string());
            continue;
        }
        if project.supported_platforms.is_empty() {
            skip(warnings, plugin, "no supported platforms".to_string());
            continue;
        }

        for (platform, variants) in &project.supported_platforms {
            if !plugin.is_core() && !core_provides(results, *platform) {
                warnings.push(RunWarning::MissingCoreLibraries {
                    plugin: plugin.id.clone(),
                    platform: platform.to_string(),
                });
                continue;
            }

            let log = run_dir.join(format!("{}_{}_{}_build.log", plugin.id, project.version, platform));
            let command = installation.test_command(&project.path, platform.name(), &project.test_assemblies, &log);
            tracing::info!(plugin = %plugin.id, %platform, "Building test player");
            tracing::debug!(command = %command, "Test build command");

            let succeeded = match runner.run(&command) {
                Ok(output) => {
                    if !output.success() && !output.stdout.trim().is_empty() {
                        tracing::debug!(output = %output.stdout, "Unity output");
                    }
                    output.success()
                }
                Err(e) => {
                    tracing::error!(error = %e, "Could not launch Unity");
                    false
                }
            };
            if !succeeded {
                warnings.push(RunWarning::TestBuildFailed {
                    plugin: plugin.id.clone(),
                    platform: platform.to_string(),
                    log: log.clone(),
                });
            }

            let players = project.test_players_path();
            if !players.is_dir() {
                warnings.push(RunWarning::MissingTestOutput { plugin: plugin.id.clone(), expected: players, log });
                continue;
            }

            for variant in variants.keys() {
                let target_dir = run_dir.join(test_identifier(plugin, *platform, *variant));
                let target = target_dir.join("TestPlayers");
                if let Err(e) = copy_dir(&players, &target) {
                    warnings.push(RunWarning::TestOutputFailed {
                        plugin: plugin.id.clone(),
                        target,
                        reason: e.to_string(),
                    });
                    continue;
                }
                produced.push(target_dir);
            }

            if let Err(e) = fs::remove_dir_all(&players) {
                warnings.push(RunWarning::FolderRemovalFailed { path: players, reason: e.to_string() });
            }
        }
    }

    Ok(produced)
}

fn skip(warnings: &mut WarningLog, plugin: &NativePlugin, reason: String) {
    warnings.push(RunWarning::SkippedTests { plugin: plugin.id.clone(), reason });
}

/// Whether the Core plug-in is registered with libraries for `platform`.
fn core_provides(results: &ResultsTable, platform: UnityPlatform) -> bool {
    results.get(CORE_PLUGIN_ID).is_some_and(|core| core.unity_project.supported_platforms.contains_key(&platform))
}

/// Recursive copy of `from` into `to`.
fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fake::FakeRunner;
    use crate::core::ToolOutput;
    use crate::unity::{SupportedPlatforms, UnityInstallation, UnityProject};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn plugin(root: &Path, id: &str, platforms: &[UnityPlatform]) -> NativePlugin {
        let supported: SupportedPlatforms = platforms
            .iter()
            .map(|p| (*p, [(SdkVariant::Device, PathBuf::from("/x"))].into_iter().collect()))
            .collect();
        let project = root.join(format!("Apple.{id}/Apple.{id}_Unity"));
        fs::create_dir_all(&project).unwrap();
        NativePlugin {
            id: id.to_string(),
            root_path: root.join(format!("Apple.{id}")),
            native_project_path: root.join(format!("Apple.{id}/Native")),
            unity_project: UnityProject {
                path: project,
                version: "6000.0.23f1".into(),
                native_library_path: None,
                supported_platforms: supported,
                test_assemblies: vec!["Apple.Core.Tests".into(), "Apple.Core.Tests.Runtime".into()],
                editor_test_assemblies: Vec::new(),
            },
        }
    }

    fn registry() -> InstallationRegistry {
        let mut registry = InstallationRegistry::new();
        registry.track(
            UnityInstallation {
                app_path: PathBuf::from("/Applications/Unity/6000.0.23f1/Unity.app"),
                executable_path: PathBuf::from("/Applications/Unity/6000.0.23f1/Unity.app/Contents/MacOS/Unity"),
                version: "6000.0.23f1".into(),
            },
            &mut WarningLog::new(),
        );
        registry
    }

    /// Runner that leaves a `TestPlayers` folder in the project being built.
    fn producing_runner() -> FakeRunner {
        FakeRunner::new(|command| {
            if let Some(project) = command.flag_value("-projectPath") {
                let players = Path::new(project).join("TestPlayers/Player.app");
                fs::create_dir_all(&players).unwrap();
                fs::write(players.join("Info.plist"), "<plist/>").unwrap();
            }
            ToolOutput::ok("")
        })
    }

    fn with_simulator(mut plugin: NativePlugin, platform: UnityPlatform) -> NativePlugin {
        if let Some(variants) = plugin.unity_project.supported_platforms.get_mut(&platform) {
            variants.insert(SdkVariant::Simulator, PathBuf::from("/y"));
        }
        plugin
    }

    #[test]
    fn test_run_dir_name() {
        let started = Local.with_ymd_and_hms(2024, 10, 3, 14, 5, 9).unwrap();
        assert_eq!(run_dir_name(started), "TestBuild_2024-10-03_14-05-09");
    }

    #[test]
    fn test_players_are_moved_into_target_folder() {
        let temp = TempDir::new().unwrap();
        let core = plugin(temp.path(), "Core", &[UnityPlatform::Ios]);
        let results: ResultsTable = [("Core".to_string(), core.clone())].into_iter().collect();
        let run_dir = temp.path().join("TestBuild_x");
        let runner = producing_runner();
        let mut warnings = WarningLog::new();

        let produced = build_tests_in(&run_dir, &results, &registry(), &runner, &mut warnings).unwrap();

        let target = run_dir.join("Core_6000.0.23f1_iOS_Device");
        assert_eq!(produced, vec![target.clone()]);
        assert!(target.join("TestPlayers/Player.app/Info.plist").is_file());
        assert!(!core.unity_project.test_players_path().exists());

        let command = &runner.calls()[0];
        assert_eq!(command.flag_value("-testPlatform"), Some("iOS"));
        assert_eq!(command.flag_value("-assemblyNames"), Some("Apple.Core.Tests;Apple.Core.Tests.Runtime"));
        assert_eq!(
            command.flag_value("-logFile").map(PathBuf::from),
            Some(run_dir.join("Core_6000.0.23f1_iOS_build.log"))
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_dependent_plugin_needs_core_platform() {
        let temp = TempDir::new().unwrap();
        let core = plugin(temp.path(), "Core", &[UnityPlatform::Ios]);
        let phase = plugin(temp.path(), "PHASE", &[UnityPlatform::Ios, UnityPlatform::Tvos]);
        let results: ResultsTable =
            [("Core".to_string(), core), ("PHASE".to_string(), phase)].into_iter().collect();
        let runner = producing_runner();
        let mut warnings = WarningLog::new();

        let produced = build_tests_in(temp.path(), &results, &registry(), &runner, &mut warnings).unwrap();

        assert_eq!(produced.len(), 2);
        assert_eq!(
            warnings.entries(),
            &[RunWarning::MissingCoreLibraries { plugin: "PHASE".into(), platform: "tvOS".into() }]
        );
    }

    #[test]
    fn test_missing_core_skips_dependent_plugin() {
        let temp = TempDir::new().unwrap();
        let phase = plugin(temp.path(), "PHASE", &[UnityPlatform::Ios]);
        let results: ResultsTable = [("PHASE".to_string(), phase)].into_iter().collect();
        let runner = producing_runner();
        let mut warnings = WarningLog::new();

        build_tests_in(temp.path(), &results, &registry(), &runner, &mut warnings).unwrap();

        assert!(runner.calls().is_empty());
        assert!(matches!(warnings.entries()[0], RunWarning::MissingCoreLibraries { .. }));
    }

    #[test]
    fn test_skips_without_installation_or_assemblies() {
        let temp = TempDir::new().unwrap();
        let mut core = plugin(temp.path(), "Core", &[UnityPlatform::Ios]);
        core.unity_project.test_assemblies.clear();
        let results: ResultsTable = [("Core".to_string(), core)].into_iter().collect();
        let runner = producing_runner();

        let mut warnings = WarningLog::new();
        build_tests_in(temp.path(), &results, &registry(), &runner, &mut warnings).unwrap();
        assert!(matches!(&warnings.entries()[0], RunWarning::SkippedTests { reason, .. } if reason == "no test assemblies"));

        let mut warnings = WarningLog::new();
        build_tests_in(temp.path(), &results, &InstallationRegistry::new(), &runner, &mut warnings).unwrap();
        assert!(matches!(&warnings.entries()[0], RunWarning::SkippedTests { reason, .. } if reason.contains("6000.0.23f1")));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_failed_build_without_output_warns_twice() {
        let temp = TempDir::new().unwrap();
        let core = plugin(temp.path(), "Core", &[UnityPlatform::StandaloneOsx]);
        let results: ResultsTable = [("Core".to_string(), core)].into_iter().collect();
        let runner = FakeRunner::new(|_| ToolOutput::failed(2, ""));
        let mut warnings = WarningLog::new();

        let produced = build_tests_in(temp.path(), &results, &registry(), &runner, &mut warnings).unwrap();

        assert!(produced.is_empty());
        assert!(matches!(&warnings.entries()[0], RunWarning::TestBuildFailed { platform, .. } if platform == "StandaloneOSX"));
        assert!(matches!(warnings.entries()[1], RunWarning::MissingTestOutput { .. }));
    }

    #[test]
    fn test_one_unity_build_per_platform_shared_by_variants() {
        let temp = TempDir::new().unwrap();
        let core = with_simulator(plugin(temp.path(), "Core", &[UnityPlatform::Ios]), UnityPlatform::Ios);
        let results: ResultsTable = [("Core".to_string(), core.clone())].into_iter().collect();
        let run_dir = temp.path().join("TestBuild_x");
        let runner = producing_runner();
        let mut warnings = WarningLog::new();

        let produced = build_tests_in(&run_dir, &results, &registry(), &runner, &mut warnings).unwrap();

        assert_eq!(runner.calls().len(), 1);
        assert_eq!(
            produced,
            vec![run_dir.join("Core_6000.0.23f1_iOS_Device"), run_dir.join("Core_6000.0.23f1_iOS_Simulator")]
        );
        for target in &produced {
            assert!(target.join("TestPlayers/Player.app/Info.plist").is_file());
        }
        assert!(!core.unity_project.test_players_path().exists());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_copy_failure_is_reported_and_other_targets_continue() {
        let temp = TempDir::new().unwrap();
        let core = with_simulator(plugin(temp.path(), "Core", &[UnityPlatform::Ios]), UnityPlatform::Ios);
        let phase = plugin(temp.path(), "PHASE", &[UnityPlatform::Ios]);
        let results: ResultsTable =
            [("Core".to_string(), core), ("PHASE".to_string(), phase)].into_iter().collect();
        let run_dir = temp.path().join("TestBuild_x");
        let blocked = run_dir.join("Core_6000.0.23f1_iOS_Device");
        fs::create_dir_all(&blocked).unwrap();
        fs::write(blocked.join("TestPlayers"), "not a folder").unwrap();
        let runner = producing_runner();
        let mut warnings = WarningLog::new();

        let produced = build_tests_in(&run_dir, &results, &registry(), &runner, &mut warnings).unwrap();

        assert_eq!(
            produced,
            vec![run_dir.join("Core_6000.0.23f1_iOS_Simulator"), run_dir.join("PHASE_6000.0.23f1_iOS_Device")]
        );
        assert_eq!(runner.calls().len(), 2);
        assert!(matches!(
            &warnings.entries()[0],
            RunWarning::TestOutputFailed { plugin, target, .. } if plugin == "Core" && target == &blocked.join("TestPlayers")
        ));
        assert_eq!(warnings.len(), 1);
    }
}
