//! Unity installation registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::{CommandRunner, RunWarning, ToolCommand, ToolOutput, WarningLog};

/// Bundle name searched for under the install root.
pub const UNITY_APP_NAME: &str = "Unity.app";

/// Executable inside a `Unity.app` bundle.
pub const UNITY_EXECUTABLE: &str = "Contents/MacOS/Unity";

/// A located Unity editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnityInstallation {
    /// `Unity.app` bundle
    pub app_path: PathBuf,

    /// Editor executable inside the bundle
    pub executable_path: PathBuf,

    /// Version reported by `-version`
    pub version: String,
}

impl UnityInstallation {
    /// Headless open-and-quit, which regenerates `.meta` files.
    pub fn touch_command(&self, project: &Path) -> ToolCommand {
        ToolCommand::new(&self.executable_path)
            .args(["-batchmode", "-nographics", "-projectPath"])
            .arg(project)
            .arg("-quit")
    }

    /// Open `project` headlessly.
    pub fn touch_project(&self, runner: &dyn CommandRunner, project: &Path) -> anyhow::Result<ToolOutput> {
        tracing::info!(project = %project.display(), version = %self.version, "Touching Unity project");
        runner.run(&self.touch_command(project))
    }

    /// Build test players for `assemblies` on `platform`.
    pub fn test_command(&self, project: &Path, platform: &str, assemblies: &[String], log_file: &Path) -> ToolCommand {
        ToolCommand::new(&self.executable_path)
            .args(["-runTests", "-batchmode", "-forgetProjectPath", "-projectPath"])
            .arg(project)
            .args(["-testPlatform", platform, "-assemblyNames"])
            .arg(assemblies.join(";"))
            .arg("-logFile")
            .arg(log_file)
    }
}

/// Installations keyed by version.
#[derive(Debug, Clone, Default)]
pub struct InstallationRegistry {
    installations: BTreeMap<String, UnityInstallation>,
}

impl InstallationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find every `Unity.app` under `root` and ask each for its version.
    ///
    /// Bundles are visited in name order. When two report the same version
    /// the first one visited is kept.
    pub fn scan(root: &Path, runner: &dyn CommandRunner, warnings: &mut WarningLog) -> Self {
        tracing::info!(root = %root.display(), "Scanning for Unity installations");

        let mut registry = Self::new();
        let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() || entry.file_name() != UNITY_APP_NAME {
                continue;
            }
            walker.skip_current_dir();

            let app_path = entry.into_path();
            let executable_path = app_path.join(UNITY_EXECUTABLE);
            if !executable_path.is_file() {
                warnings.push(RunWarning::MissingInstallationExecutable { app: app_path });
                continue;
            }

            let output = match runner.run(&ToolCommand::new(&executable_path).arg("-version")) {
                Ok(output) if output.success() => output,
                Ok(output) => {
                    warnings.push(RunWarning::UnreadableInstallation { app: app_path, reason: output.combined() });
                    continue;
                }
                Err(e) => {
                    warnings.push(RunWarning::UnreadableInstallation { app: app_path, reason: e.to_string() });
                    continue;
                }
            };

            let version = output.stdout.trim_end_matches(['\n', '\r']).to_string();
            registry.track(UnityInstallation { app_path, executable_path, version }, warnings);
        }

        if registry.is_empty() {
            warnings.push(RunWarning::NoInstallations { root: root.to_path_buf() });
        }
        registry
    }

    /// Add an installation unless its version is already tracked.
    pub fn track(&mut self, installation: UnityInstallation, warnings: &mut WarningLog) {
        if let Some(existing) = self.installations.get(&installation.version) {
            warnings.push(RunWarning::DuplicateInstallation {
                version: installation.version,
                kept: existing.app_path.clone(),
                ignored: installation.app_path,
            });
            return;
        }

        tracing::info!(
            version = %installation.version,
            app = %installation.app_path.display(),
            "Tracking Unity installation"
        );
        self.installations.insert(installation.version.clone(), installation);
    }

    /// Installation with exactly this version.
    pub fn get(&self, version: &str) -> Option<&UnityInstallation> {
        self.installations.get(version)
    }

    pub fn versions(&self) -> Vec<String> {
        self.installations.keys().cloned().collect()
    }

    pub fn installations(&self) -> impl Iterator<Item = &UnityInstallation> {
        self.installations.values()
    }

    pub fn len(&self) -> usize {
        self.installations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fake::FakeRunner;
    use std::fs;
    use tempfile::TempDir;

    fn make_app(root: &Path, relative: &str, with_executable: bool) -> PathBuf {
        let app = root.join(relative);
        fs::create_dir_all(app.join("Contents/MacOS")).unwrap();
        if with_executable {
            fs::write(app.join(UNITY_EXECUTABLE), "").unwrap();
        }
        app
    }

    fn version_runner() -> FakeRunner {
        FakeRunner::new(|command| {
            let version = if command.program().contains("/2022.3.40f1/") { "2022.3.40f1" } else { "6000.0.23f1" };
            ToolOutput::ok(format!("{version}\n"))
        })
    }

    #[test]
    fn test_scan_finds_installations() {
        let temp = TempDir::new().unwrap();
        make_app(temp.path(), "6000.0.23f1/Unity.app", true);
        make_app(temp.path(), "2022.3.40f1/Unity.app", true);

        let mut warnings = WarningLog::new();
        let registry = InstallationRegistry::scan(temp.path(), &version_runner(), &mut warnings);

        assert_eq!(registry.versions(), vec!["2022.3.40f1", "6000.0.23f1"]);
        let install = registry.get("6000.0.23f1").unwrap();
        assert!(install.executable_path.ends_with("Contents/MacOS/Unity"));
        assert!(registry.get("5999.0.1f1").is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_duplicate_version_keeps_first() {
        let temp = TempDir::new().unwrap();
        let first = make_app(temp.path(), "a/Unity.app", true);
        make_app(temp.path(), "b/Unity.app", true);

        let mut warnings = WarningLog::new();
        let registry = InstallationRegistry::scan(temp.path(), &version_runner(), &mut warnings);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("6000.0.23f1").unwrap().app_path, first);
        assert!(matches!(warnings.entries()[0], RunWarning::DuplicateInstallation { .. }));
    }

    #[test]
    fn test_missing_executable_is_skipped() {
        let temp = TempDir::new().unwrap();
        make_app(temp.path(), "broken/Unity.app", false);
        make_app(temp.path(), "good/Unity.app", true);

        let mut warnings = WarningLog::new();
        let runner = version_runner();
        let registry = InstallationRegistry::scan(temp.path(), &runner, &mut warnings);

        assert_eq!(registry.len(), 1);
        assert_eq!(runner.calls().len(), 1);
        assert!(matches!(warnings.entries()[0], RunWarning::MissingInstallationExecutable { .. }));
    }

    #[test]
    fn test_empty_root_is_detectable() {
        let temp = TempDir::new().unwrap();
        let mut warnings = WarningLog::new();
        let registry = InstallationRegistry::scan(temp.path(), &FakeRunner::succeeding(), &mut warnings);

        assert!(registry.is_empty());
        assert!(matches!(warnings.entries()[0], RunWarning::NoInstallations { .. }));
    }

    #[test]
    fn test_touch_and_test_commands() {
        let install = UnityInstallation {
            app_path: PathBuf::from("/Applications/Unity/Unity.app"),
            executable_path: PathBuf::from("/Applications/Unity/Unity.app/Contents/MacOS/Unity"),
            version: "6000.0.23f1".into(),
        };

        let touch = install.touch_command(Path::new("/p/Apple.Core_Unity"));
        assert_eq!(
            touch.arguments(),
            &["-batchmode", "-nographics", "-projectPath", "/p/Apple.Core_Unity", "-quit"]
        );

        let test = install.test_command(
            Path::new("/p"),
            "iOS",
            &["A.Tests".to_string(), "B.Tests".to_string()],
            Path::new("/logs/build.log"),
        );
        assert_eq!(test.flag_value("-testPlatform"), Some("iOS"));
        assert_eq!(test.flag_value("-assemblyNames"), Some("A.Tests;B.Tests"));
        assert_eq!(test.flag_value("-logFile"), Some("/logs/build.log"));
        assert!(test.has_arg("-forgetProjectPath"));
    }
}
