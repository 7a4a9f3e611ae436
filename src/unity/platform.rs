//! Platform capability discovery.
//!
//! After compilation the native library folder looks like
//! `NativeLibraries~/<Config>/<PlatformFolder>/<artifacts>`. Discovery walks
//! that tree and rebuilds the map of platforms a plug-in actually supports.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::{CommandRunner, ConfigId, RunWarning, Selectable, WarningLog};
use crate::toolchain::codesign_command;

/// Device or simulator build of the same Unity platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SdkVariant {
    Device,
    Simulator,
}

impl SdkVariant {
    pub fn name(self) -> &'static str {
        match self {
            Self::Device => "Device",
            Self::Simulator => "Simulator",
        }
    }
}

impl fmt::Display for SdkVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unity build target a native library can be used from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnityPlatform {
    Ios,
    Tvos,
    StandaloneOsx,
    VisionOs,
}

impl UnityPlatform {
    /// Name passed to `-testPlatform` and used in test output folders.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Tvos => "tvOS",
            Self::StandaloneOsx => "StandaloneOSX",
            Self::VisionOs => "VisionOS",
        }
    }

    /// Name used in assembly definition `includePlatforms` lists.
    pub fn asmdef_name(self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Tvos => "tvOS",
            Self::StandaloneOsx => "macOSStandalone",
            Self::VisionOs => "VisionOS",
        }
    }

    /// Map a compiler output folder name to a platform and variant.
    pub fn from_folder(name: &str) -> Option<(Self, SdkVariant)> {
        let entry = match name {
            "iOS" => (Self::Ios, SdkVariant::Device),
            "iPhoneSimulator" => (Self::Ios, SdkVariant::Simulator),
            "tvOS" => (Self::Tvos, SdkVariant::Device),
            "AppleTVSimulator" => (Self::Tvos, SdkVariant::Simulator),
            "macOS" => (Self::StandaloneOsx, SdkVariant::Device),
            "visionOS" => (Self::VisionOs, SdkVariant::Device),
            "VisionSimulator" => (Self::VisionOs, SdkVariant::Simulator),
            _ => return None,
        };
        Some(entry)
    }
}

impl fmt::Display for UnityPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Platforms a plug-in was built for, with the output folder of each variant.
pub type SupportedPlatforms = BTreeMap<UnityPlatform, BTreeMap<SdkVariant, PathBuf>>;

/// Rebuilds [`SupportedPlatforms`] from a native library folder.
#[derive(Debug, Clone)]
pub struct PlatformDiscovery {
    known_configs: Vec<&'static str>,
    codesign_identity: Option<String>,
}

impl Default for PlatformDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformDiscovery {
    /// Discovery that recognises every build configuration and signs nothing.
    pub fn new() -> Self {
        Self { known_configs: ConfigId::ALL.iter().map(|c| c.name()).collect(), codesign_identity: None }
    }

    /// Sign dynamically loaded artifacts with `identity` while discovering.
    pub fn with_codesign_identity(mut self, identity: Option<String>) -> Self {
        self.codesign_identity = identity;
        self
    }

    /// Walk `root` and return the platforms found.
    ///
    /// The result is always built from scratch. When both Debug and Release
    /// exist for a platform, the Release folder wins.
    pub fn discover(
        &self,
        root: &Path,
        runner: &dyn CommandRunner,
        warnings: &mut WarningLog,
    ) -> io::Result<SupportedPlatforms> {
        let mut platforms = SupportedPlatforms::new();

        for config_dir in sorted_entries(root)? {
            if !config_dir.is_dir() {
                continue;
            }
            if !self.known_configs.iter().any(|c| dir_name(&config_dir) == *c) {
                warnings.push(RunWarning::UnknownConfigFolder { path: config_dir });
                continue;
            }

            for platform_dir in sorted_entries(&config_dir)? {
                if !platform_dir.is_dir() {
                    continue;
                }
                let Some((platform, variant)) = UnityPlatform::from_folder(&dir_name(&platform_dir)) else {
                    warnings.push(RunWarning::UnknownPlatformFolder { path: platform_dir });
                    continue;
                };

                if let Some(identity) = &self.codesign_identity {
                    sign_artifacts(&platform_dir, identity, runner, warnings)?;
                }

                tracing::debug!(%platform, %variant, path = %platform_dir.display(), "Found platform");
                platforms.entry(platform).or_default().insert(variant, platform_dir);
            }
        }

        Ok(platforms)
    }
}

fn sign_artifacts(
    dir: &Path,
    identity: &str,
    runner: &dyn CommandRunner,
    warnings: &mut WarningLog,
) -> io::Result<()> {
    for artifact in sorted_entries(dir)? {
        match artifact.extension().and_then(|e| e.to_str()) {
            Some("bundle" | "framework") => {
                let command = codesign_command(identity, &artifact);
                match runner.run(&command) {
                    Ok(output) if output.success() => {
                        tracing::info!(artifact = %artifact.display(), "Signed");
                    }
                    Ok(output) => warnings.push(RunWarning::CodesignFailed {
                        artifact,
                        output: output.combined(),
                    }),
                    Err(e) => warnings.push(RunWarning::CodesignFailed {
                        artifact,
                        output: e.to_string(),
                    }),
                }
            }
            Some("a") => {
                tracing::debug!(artifact = %artifact.display(), "Static library; not signing");
            }
            _ => {}
        }
    }
    Ok(())
}

/// Directory entries sorted by file name.
pub(crate) fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn dir_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
