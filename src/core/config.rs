//! Configuration management for upi-build.
//!
//! Handles loading configuration from TOML files and resolving it into
//! [`RunOptions`] for a single invocation.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::options::{
    BuildAction, CleanAction, ConfigId, PlatformId, PluginSelection, RunOptions, Selectable,
    Selection,
};

/// Name of the project-local configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".upi-build.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Input and output locations
    pub paths: PathsConfig,

    /// What to build and how
    pub build: BuildSettings,

    /// Code signing settings
    pub codesign: CodesignConfig,

    /// Answers used when running without a terminal
    pub prompts: PromptConfig,
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Folder containing one subfolder per plug-in
    pub plugin_root: PathBuf,

    /// Package output folder
    pub output: PathBuf,

    /// Root folder for test build output
    pub test_output: PathBuf,

    /// Folder searched recursively for Unity.app installations
    pub unity_install_root: PathBuf,
}

/// Build selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Plug-in identifiers, or "all"
    pub plugins: Vec<String>,

    /// Target platforms (iOS, iPhoneSimulator, ..., simulators, devices, all)
    pub platforms: Vec<String>,

    /// Build configurations (Debug, Release, all)
    pub configs: Vec<String>,

    /// Build actions (build, pack, none, all)
    pub actions: Vec<String>,

    /// Clean actions (native, packages, tests, none, all)
    pub clean: Vec<String>,

    /// Skip confirmation before deleting folders
    pub force_clean: bool,

    /// Build Unity tests for each plug-in
    pub build_tests: bool,

    /// Pass -quiet to xcodebuild
    pub quiet: bool,

    /// Open each project headlessly after building to regenerate metadata
    pub touch_projects: bool,

    /// Strip unbuilt platforms from assembly definitions while packing
    pub validate_asmdefs: bool,
}

/// Code signing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodesignConfig {
    /// Identity hash, "prompt" to choose interactively, or empty to skip
    pub identity: String,
}

/// Answers used by the non-interactive prompter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Ask on the terminal instead of answering from this section
    pub interactive: bool,

    /// Keep building remaining targets after a compiler failure
    pub continue_on_build_failure: bool,

    /// Upgrade projects that have no matching Unity installation
    pub upgrade_projects: bool,

    /// Approve folder deletion during clean
    pub confirm_deletion: bool,
}

impl BuildConfig {
    /// Load configuration from the default locations.
    ///
    /// Looks for config in:
    /// 1. `explicit`, when given
    /// 2. `.upi-build.toml` in current directory
    /// 3. `~/.config/upi-build/config.toml`
    /// 4. Falls back to defaults
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Get the global config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("upi-build"))
    }

    /// Resolve raw settings into typed run options.
    ///
    /// Unrecognised selection values are logged and ignored.
    pub fn resolve(&self) -> RunOptions {
        let (platforms, unknown) =
            Selection::<PlatformId>::resolve(&self.build.platforms, PlatformId::ALL);
        warn_unknown("platform", &unknown);

        let (configs, unknown) =
            Selection::<ConfigId>::resolve(&self.build.configs, &[ConfigId::Release]);
        warn_unknown("build config", &unknown);

        let (actions, unknown) = Selection::<BuildAction>::resolve(
            &self.build.actions,
            &[BuildAction::Build, BuildAction::Pack],
        );
        warn_unknown("build action", &unknown);

        let (clean, unknown) = Selection::<CleanAction>::resolve(&self.build.clean, &[]);
        warn_unknown("clean action", &unknown);

        RunOptions {
            plugin_root: expand_path(&self.paths.plugin_root),
            output_path: expand_path(&self.paths.output),
            test_output_path: expand_path(&self.paths.test_output),
            unity_install_root: expand_path(&self.paths.unity_install_root),
            plugins: PluginSelection::from_raw(&self.build.plugins),
            platforms,
            configs,
            actions,
            clean,
            force_clean: self.build.force_clean,
            build_tests: self.build.build_tests,
            quiet: self.build.quiet,
            touch_projects: self.build.touch_projects,
            validate_asmdefs: self.build.validate_asmdefs,
            codesign_identity: self.codesign.identity.trim().to_string(),
        }
    }
}

fn warn_unknown(kind: &str, unknown: &[String]) {
    for value in unknown {
        tracing::warn!(kind, value = %value, "Ignoring unknown option value");
    }
}

/// Expand `~` and environment variables in a configured path.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            tracing::warn!(path = %raw, error = %e, "Could not expand path; using it as written");
            path.to_path_buf()
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            plugin_root: PathBuf::from("plug-ins"),
            output: PathBuf::from("Build"),
            test_output: PathBuf::from("TestBuilds"),
            unity_install_root: PathBuf::from("/Applications/Unity"),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            plugins: vec!["all".to_string()],
            platforms: vec!["all".to_string()],
            configs: vec!["Release".to_string()],
            actions: vec!["build".to_string(), "pack".to_string()],
            clean: vec!["none".to_string()],
            force_clean: false,
            build_tests: false,
            quiet: true,
            touch_projects: true,
            validate_asmdefs: true,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            interactive: true,
            continue_on_build_failure: true,
            upgrade_projects: false,
            confirm_deletion: false,
        }
    }
}
