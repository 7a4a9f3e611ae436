//! Typed selection sets for platforms, build configurations, and actions.
//!
//! Raw option values arrive as strings (from the CLI or the TOML config) and
//! are resolved here into closed enum sets. Unknown values are reported back
//! to the caller instead of silently defaulting.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// A closed set of selectable values with optional group aliases.
pub trait Selectable: Copy + Ord + fmt::Debug + 'static {
    /// Every concrete value of this kind.
    const ALL: &'static [Self];

    /// Canonical option string for this value.
    fn name(self) -> &'static str;

    /// Expand a group alias (`all`, `devices`, ...) into concrete values.
    ///
    /// `Some(vec![])` means the alias is valid and selects nothing (`none`).
    fn group(_name: &str) -> Option<Vec<Self>> {
        None
    }

    /// Parse a single concrete value.
    fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.name().eq_ignore_ascii_case(name))
    }
}

/// An ordered set of selected values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<T: Selectable> {
    values: BTreeSet<T>,
}

impl<T: Selectable> Selection<T> {
    /// An empty selection.
    pub fn empty() -> Self {
        Self { values: BTreeSet::new() }
    }

    /// Every value of `T`.
    pub fn all() -> Self {
        Self::of(T::ALL)
    }

    /// Selection containing exactly `values`.
    pub fn of(values: &[T]) -> Self {
        Self { values: values.iter().copied().collect() }
    }

    /// Resolve raw option strings.
    ///
    /// Returns the selection plus any strings that matched nothing. When no
    /// string is recognised at all, `default` is used.
    pub fn resolve<S: AsRef<str>>(raw: &[S], default: &[T]) -> (Self, Vec<String>) {
        let mut values = BTreeSet::new();
        let mut unknown = Vec::new();
        let mut any_valid = false;

        for item in raw {
            let item = item.as_ref().trim();
            if let Some(group) = T::group(item) {
                any_valid = true;
                if group.is_empty() {
                    values.clear();
                    break;
                }
                values.extend(group);
            } else if let Some(value) = T::parse(item) {
                any_valid = true;
                values.insert(value);
            } else {
                unknown.push(item.to_string());
            }
        }

        if !any_valid {
            values = default.iter().copied().collect();
        }

        (Self { values }, unknown)
    }

    pub fn contains(&self, value: T) -> bool {
        self.values.contains(&value)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.values.iter().copied()
    }

    pub fn insert(&mut self, value: T) {
        self.values.insert(value);
    }

    pub fn remove(&mut self, value: T) {
        self.values.remove(&value);
    }

    /// Comma separated option names, for summaries.
    pub fn describe(&self) -> String {
        if self.values.is_empty() {
            return "none".to_string();
        }
        self.values.iter().map(|v| v.name()).collect::<Vec<_>>().join(", ")
    }
}

impl<T: Selectable> Default for Selection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Compiler target platforms (`-m`, `--platforms`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlatformId {
    Ios,
    IosSimulator,
    Tvos,
    TvosSimulator,
    Macos,
    VisionOs,
    VisionOsSimulator,
}

impl PlatformId {
    /// Platforms that target a simulator SDK.
    pub const SIMULATORS: [Self; 3] = [Self::IosSimulator, Self::TvosSimulator, Self::VisionOsSimulator];

    /// Platforms that target physical devices.
    pub const DEVICES: [Self; 4] = [Self::Ios, Self::Tvos, Self::Macos, Self::VisionOs];

    pub fn is_simulator(self) -> bool {
        Self::SIMULATORS.contains(&self)
    }

    /// SDK family used in the Xcode scheme name (`"<root> - <config>"`).
    pub fn sdk_root(self) -> &'static str {
        match self {
            Self::Ios | Self::IosSimulator => "iOS",
            Self::Tvos | Self::TvosSimulator => "tvOS",
            Self::Macos => "macOS",
            Self::VisionOs | Self::VisionOsSimulator => "visionOS",
        }
    }

    /// Value for `xcodebuild -destination`.
    pub fn destination(self) -> String {
        if self.is_simulator() {
            format!("generic/platform={} Simulator", self.sdk_root())
        } else {
            format!("generic/platform={}", self.sdk_root())
        }
    }
}

impl Selectable for PlatformId {
    const ALL: &'static [Self] = &[
        Self::Ios,
        Self::IosSimulator,
        Self::Tvos,
        Self::TvosSimulator,
        Self::Macos,
        Self::VisionOs,
        Self::VisionOsSimulator,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::IosSimulator => "iPhoneSimulator",
            Self::Tvos => "tvOS",
            Self::TvosSimulator => "AppleTVSimulator",
            Self::Macos => "macOS",
            Self::VisionOs => "visionOS",
            Self::VisionOsSimulator => "VisionSimulator",
        }
    }

    fn group(name: &str) -> Option<Vec<Self>> {
        match name.to_ascii_lowercase().as_str() {
            "all" => Some(Self::ALL.to_vec()),
            "simulators" => Some(Self::SIMULATORS.to_vec()),
            "devices" => Some(Self::DEVICES.to_vec()),
            _ => None,
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build configurations (`--build-config`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigId {
    Debug,
    Release,
}

impl Selectable for ConfigId {
    const ALL: &'static [Self] = &[Self::Debug, Self::Release];

    fn name(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
        }
    }

    fn group(name: &str) -> Option<Vec<Self>> {
        name.eq_ignore_ascii_case("all").then(|| Self::ALL.to_vec())
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build actions (`-b`, `--build-action`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildAction {
    /// Compile native libraries for each selected plug-in.
    Build,
    /// Archive each built plug-in into the package output folder.
    Pack,
}

impl Selectable for BuildAction {
    const ALL: &'static [Self] = &[Self::Build, Self::Pack];

    fn name(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Pack => "pack",
        }
    }

    fn group(name: &str) -> Option<Vec<Self>> {
        match name.to_ascii_lowercase().as_str() {
            "all" => Some(Self::ALL.to_vec()),
            "none" => Some(Vec::new()),
            _ => None,
        }
    }
}

/// Clean actions (`-k`, `--clean-action`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CleanAction {
    /// Remove compiled libraries from the plug-in projects.
    Native,
    /// Remove the package output folder.
    Packages,
    /// Remove test build output.
    Tests,
}

impl Selectable for CleanAction {
    const ALL: &'static [Self] = &[Self::Native, Self::Packages, Self::Tests];

    fn name(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Packages => "packages",
            Self::Tests => "tests",
        }
    }

    fn group(name: &str) -> Option<Vec<Self>> {
        match name.to_ascii_lowercase().as_str() {
            "all" => Some(Self::ALL.to_vec()),
            "none" => Some(Vec::new()),
            _ => None,
        }
    }
}

/// Which plug-ins to process (`-p`, `--plugin-list`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSelection {
    All,
    Named(BTreeSet<String>),
}

impl PluginSelection {
    pub fn from_raw<S: AsRef<str>>(raw: &[S]) -> Self {
        if raw.is_empty() || raw.iter().any(|p| p.as_ref().eq_ignore_ascii_case("all")) {
            return Self::All;
        }
        Self::Named(raw.iter().map(|p| p.as_ref().trim().to_string()).collect())
    }

    pub fn includes(&self, plugin_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(plugin_id),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Named(names) => names.iter().cloned().collect::<Vec<_>>().join(", "),
        }
    }
}

/// Fully resolved options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub plugin_root: PathBuf,
    pub output_path: PathBuf,
    pub test_output_path: PathBuf,
    pub unity_install_root: PathBuf,
    pub plugins: PluginSelection,
    pub platforms: Selection<PlatformId>,
    pub configs: Selection<ConfigId>,
    pub actions: Selection<BuildAction>,
    pub clean: Selection<CleanAction>,
    pub force_clean: bool,
    pub build_tests: bool,
    pub quiet: bool,
    pub touch_projects: bool,
    pub validate_asmdefs: bool,
    /// Codesign identity hash, `prompt`, or empty to skip signing.
    pub codesign_identity: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_groups_expand() {
        let (sel, unknown) = Selection::<PlatformId>::resolve(&["simulators"], &[]);
        assert!(unknown.is_empty());
        assert_eq!(sel.len(), 3);
        assert!(sel.iter().all(PlatformId::is_simulator));

        let (sel, _) = Selection::<PlatformId>::resolve(&["devices"], &[]);
        assert!(sel.contains(PlatformId::Macos));
        assert!(!sel.contains(PlatformId::IosSimulator));
    }

    #[test]
    fn test_unknown_values_are_reported_and_ignored() {
        let (sel, unknown) = Selection::<PlatformId>::resolve(&["iOS", "watchOS"], &[]);
        assert_eq!(unknown, vec!["watchOS".to_string()]);
        assert_eq!(sel, Selection::of(&[PlatformId::Ios]));
    }

    #[test]
    fn test_no_valid_value_falls_back_to_default() {
        let (sel, unknown) = Selection::<ConfigId>::resolve(&["Profile"], &[ConfigId::Release]);
        assert_eq!(unknown.len(), 1);
        assert_eq!(sel, Selection::of(&[ConfigId::Release]));
    }

    #[test]
    fn test_none_clears_selection() {
        let (sel, unknown) = Selection::<BuildAction>::resolve(&["build", "none"], &[BuildAction::Build]);
        assert!(unknown.is_empty());
        assert!(sel.is_empty());
    }

    #[test]
    fn test_destination_strings() {
        assert_eq!(PlatformId::Ios.destination(), "generic/platform=iOS");
        assert_eq!(PlatformId::IosSimulator.destination(), "generic/platform=iOS Simulator");
        assert_eq!(PlatformId::VisionOsSimulator.sdk_root(), "visionOS");
        assert_eq!(PlatformId::TvosSimulator.name(), "AppleTVSimulator");
    }

    #[test]
    fn test_plugin_selection() {
        assert_eq!(PluginSelection::from_raw(&["Core", "all"]), PluginSelection::All);

        let sel = PluginSelection::from_raw(&["Core", "PHASE"]);
        assert!(sel.includes("Core"));
        assert!(!sel.includes("GameKit"));
        assert_eq!(sel.describe(), "Core, PHASE");
    }
}
