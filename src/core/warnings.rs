//! Non-fatal conditions collected over a run.
//!
//! Nothing in here stops the pipeline. Each warning is logged when it is
//! recorded and listed again in the end-of-run summary.

use std::fmt;
use std::path::PathBuf;

/// A recoverable problem encountered during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    /// No Unity installation was found under the install root.
    NoInstallations { root: PathBuf },
    /// A plug-in's editor version has no installed Unity and was not upgraded.
    NoMatchingInstallation { plugin: String, version: String },
    /// Upgrade was requested but no installation exists to upgrade with.
    UpgradeUnavailable { plugins: Vec<String> },
    /// An xcodebuild invocation exited non-zero.
    CompileFailed { plugin: String, scheme: String, destination: String, code: Option<i32>, output: String },
    /// codesign exited non-zero for an artifact.
    CodesignFailed { artifact: PathBuf, output: String },
    /// Headless project open failed.
    TouchFailed { project: PathBuf, code: Option<i32> },
    /// A platform folder name that maps to no known platform.
    UnknownPlatformFolder { path: PathBuf },
    /// A folder in the native library root that is not a known build configuration.
    UnknownConfigFolder { path: PathBuf },
    /// Two installations report the same version; the first one found is kept.
    DuplicateInstallation { version: String, kept: PathBuf, ignored: PathBuf },
    /// A `Unity.app` bundle without its executable.
    MissingInstallationExecutable { app: PathBuf },
    /// A `Unity.app` whose version could not be read.
    UnreadableInstallation { app: PathBuf, reason: String },
    /// No `Tests` folder under the project's Assets.
    NoTestsFolder { plugin: String },
    /// Several manifests found; the first one is used.
    AmbiguousManifest { plugin: String, chosen: PathBuf, ignored: Vec<PathBuf> },
    /// Several native library folders found; the first one is used.
    AmbiguousNativeLibraries { plugin: String, chosen: PathBuf, ignored: Vec<PathBuf> },
    /// No `package.json` found for a plug-in.
    MissingManifest { plugin: String },
    /// A `package.json` that could not be read or parsed.
    ManifestUnreadable { path: PathBuf, reason: String },
    /// The archive command failed.
    PackFailed { plugin: String, code: Option<i32>, output: String },
    /// A Unity test build exited non-zero.
    TestBuildFailed { plugin: String, platform: String, log: PathBuf },
    /// Test players could not be copied into the run folder.
    TestOutputFailed { plugin: String, target: PathBuf, reason: String },
    /// Unity exited without producing a `TestPlayers` folder.
    MissingTestOutput { plugin: String, expected: PathBuf, log: PathBuf },
    /// Tests for a plug-in were not built.
    SkippedTests { plugin: String, reason: String },
    /// Core libraries for a platform are missing, so dependent tests cannot build.
    MissingCoreLibraries { plugin: String, platform: String },
    /// An assembly definition could not be parsed for platform validation.
    AsmdefUnreadable { path: PathBuf, reason: String },
    /// An assembly definition backup could not be put back.
    AsmdefRestoreFailed { path: PathBuf, reason: String },
    /// A folder could not be removed during clean.
    FolderRemovalFailed { path: PathBuf, reason: String },
    /// A plug-in named in the selection does not exist.
    PluginNotFound { plugin: String },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInstallations { root } => {
                write!(f, "No Unity installations found under {}; packing and tests disabled", root.display())
            }
            Self::NoMatchingInstallation { plugin, version } => write!(
                f,
                "{plugin}: no Unity installation matches editor version {version}; project metadata may be stale"
            ),
            Self::UpgradeUnavailable { plugins } => {
                write!(f, "Cannot upgrade {} without any Unity installation", plugins.join(", "))
            }
            Self::CompileFailed { plugin, scheme, destination, code, .. } => {
                write!(f, "{plugin}: build of '{scheme}' for {destination} failed ({})", describe_code(*code))
            }
            Self::CodesignFailed { artifact, .. } => write!(f, "Failed to sign {}", artifact.display()),
            Self::TouchFailed { project, code } => {
                write!(f, "Failed to open {} in Unity ({})", project.display(), describe_code(*code))
            }
            Self::UnknownPlatformFolder { path } => write!(f, "Unknown platform folder {}", path.display()),
            Self::UnknownConfigFolder { path } => write!(f, "Unknown build config folder {}", path.display()),
            Self::DuplicateInstallation { version, kept, ignored } => write!(
                f,
                "Unity {version} found twice; keeping {} and ignoring {}",
                kept.display(),
                ignored.display()
            ),
            Self::MissingInstallationExecutable { app } => {
                write!(f, "No Unity executable inside {}", app.display())
            }
            Self::UnreadableInstallation { app, reason } => {
                write!(f, "Could not read version of {}: {reason}", app.display())
            }
            Self::NoTestsFolder { plugin } => write!(f, "{plugin}: no Tests folder found"),
            Self::AmbiguousManifest { plugin, chosen, ignored } => write!(
                f,
                "{plugin}: {} package manifests found; using {}",
                ignored.len() + 1,
                chosen.display()
            ),
            Self::AmbiguousNativeLibraries { plugin, chosen, ignored } => write!(
                f,
                "{plugin}: {} native library folders found; using {}",
                ignored.len() + 1,
                chosen.display()
            ),
            Self::MissingManifest { plugin } => write!(f, "{plugin}: no package.json found"),
            Self::ManifestUnreadable { path, reason } => {
                write!(f, "Could not read {}: {reason}", path.display())
            }
            Self::PackFailed { plugin, code: Some(code), .. } => {
                write!(f, "{plugin}: packing failed (exit code {code})")
            }
            Self::PackFailed { plugin, code: None, output } => write!(f, "{plugin}: packing failed: {output}"),
            Self::TestBuildFailed { plugin, platform, log } => {
                write!(f, "{plugin}: test build for {platform} failed, see {}", log.display())
            }
            Self::TestOutputFailed { plugin, target, reason } => {
                write!(f, "{plugin}: could not collect test players into {}: {reason}", target.display())
            }
            Self::MissingTestOutput { plugin, expected, log } => write!(
                f,
                "{plugin}: no test build output at {}, see {}",
                expected.display(),
                log.display()
            ),
            Self::SkippedTests { plugin, reason } => write!(f, "{plugin}: tests not built, {reason}"),
            Self::MissingCoreLibraries { plugin, platform } => {
                write!(f, "{plugin}: Core libraries for {platform} are missing; skipping tests")
            }
            Self::AsmdefUnreadable { path, reason } => {
                write!(f, "Could not validate {}: {reason}", path.display())
            }
            Self::AsmdefRestoreFailed { path, reason } => {
                write!(f, "Could not restore {}: {reason}", path.display())
            }
            Self::FolderRemovalFailed { path, reason } => {
                write!(f, "Could not remove {}: {reason}", path.display())
            }
            Self::PluginNotFound { plugin } => write!(f, "Plug-in '{plugin}' was selected but not found"),
        }
    }
}

fn describe_code(code: Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"))
}

/// Ordered collection of the warnings raised during a run.
#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    entries: Vec<RunWarning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it.
    pub fn push(&mut self, warning: RunWarning) {
        tracing::warn!("{warning}");
        self.entries.push(warning);
    }

    pub fn entries(&self) -> &[RunWarning] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Warnings matching a predicate.
    pub fn matching<'a>(
        &'a self,
        predicate: impl Fn(&RunWarning) -> bool + 'a,
    ) -> impl Iterator<Item = &'a RunWarning> + 'a {
        self.entries.iter().filter(move |w| predicate(w))
    }

    /// Plug-ins reported as having no matching installation.
    pub fn unmatched_plugins(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|w| match w {
                RunWarning::NoMatchingInstallation { plugin, .. } => Some(plugin.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn into_entries(self) -> Vec<RunWarning> {
        self.entries
    }
}
