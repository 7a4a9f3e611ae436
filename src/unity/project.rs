//! Plug-in project scanning.
//!
//! A plug-in folder follows a fixed layout:
//!
//! ```text
//! Apple.<Id>/
//!   Apple.<Id>_Unity/                        Unity project
//!     ProjectSettings/ProjectVersion.txt     editor version stamp
//!     Assets/**/NativeLibraries~/            compiler output root
//!     Assets/**/Tests/**/*.asmdef            test assemblies
//!   Native/                                  Xcode project
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use super::platform::SupportedPlatforms;
use crate::core::{RunWarning, WarningLog};

/// Folder name prefix shared by every plug-in.
pub const PLUGIN_PREFIX: &str = "Apple.";

/// Suffix appended to the plug-in folder name to form its Unity project folder.
pub const UNITY_PROJECT_SUFFIX: &str = "_Unity";

/// Folder holding the Xcode project of a plug-in.
pub const NATIVE_PROJECT_DIR: &str = "Native";

/// Version stamp, relative to the Unity project.
pub const PROJECT_VERSION_FILE: &str = "ProjectSettings/ProjectVersion.txt";

/// Token preceding the editor version in the version stamp.
pub const EDITOR_VERSION_MARKER: &str = "m_EditorVersion:";

/// Editor version used when the stamp has no usable version. Never matches an installation.
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Folder the Xcode projects copy their build products into.
pub const NATIVE_LIBRARIES_DIR: &str = "NativeLibraries~";

/// Identifier of the plug-in every other plug-in depends on.
pub const CORE_PLUGIN_ID: &str = "Core";

/// Structural problems that make a plug-in folder unusable.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// No version stamp in the Unity project.
    #[error("Not a Unity project: {0} does not exist")]
    NotAProject(PathBuf),

    /// No Unity project folder in the plug-in folder.
    #[error("Unity project not found at {0}")]
    MissingProject(PathBuf),

    /// No native project folder in the plug-in folder.
    #[error("Native project not found at {0}")]
    MissingNativeProject(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A Unity project embedded in a plug-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnityProject {
    /// Project root
    pub path: PathBuf,

    /// Editor version from the version stamp, or [`UNKNOWN_VERSION`]
    pub version: String,

    /// Compiler output root, once it exists
    pub native_library_path: Option<PathBuf>,

    /// Platforms found by the last discovery
    pub supported_platforms: SupportedPlatforms,

    /// Player test assemblies
    pub test_assemblies: Vec<String>,

    /// Editor-only test assemblies
    pub editor_test_assemblies: Vec<String>,
}

impl UnityProject {
    pub fn has_known_version(&self) -> bool {
        self.version != UNKNOWN_VERSION
    }

    pub fn assets_path(&self) -> PathBuf {
        self.path.join("Assets")
    }

    /// Where Unity leaves test players after `-runTests`.
    pub fn test_players_path(&self) -> PathBuf {
        self.path.join("TestPlayers")
    }
}

/// A plug-in: a native Xcode project paired with a Unity project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativePlugin {
    /// Folder name without [`PLUGIN_PREFIX`]
    pub id: String,

    /// Plug-in folder
    pub root_path: PathBuf,

    /// Xcode project folder
    pub native_project_path: PathBuf,

    pub unity_project: UnityProject,
}

impl NativePlugin {
    pub fn is_core(&self) -> bool {
        self.id == CORE_PLUGIN_ID
    }
}

/// Plug-in identifier for a plug-in folder (`Apple.CoreHaptics` -> `CoreHaptics`).
pub fn plugin_id_from_folder(folder: &Path) -> String {
    let name = folder.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    name.strip_prefix(PLUGIN_PREFIX).map(str::to_string).unwrap_or(name)
}

/// Unity project folder for a plug-in folder.
pub fn unity_project_path(plugin_root: &Path) -> PathBuf {
    let name = plugin_root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    plugin_root.join(format!("{name}{UNITY_PROJECT_SUFFIX}"))
}

/// Extract the editor version from version stamp contents.
///
/// Returns `None` when the marker is missing or nothing follows it.
pub fn parse_editor_version(contents: &str) -> Option<String> {
    let mut tokens = contents.split_whitespace();
    tokens.find(|t| *t == EDITOR_VERSION_MARKER)?;
    tokens.next().map(str::to_string)
}

/// Scan a plug-in folder.
///
/// Fails when the Unity project, the native project, or the version stamp is
/// missing. Missing tests are only warned about.
pub fn scan_plugin(plugin_root: &Path, warnings: &mut WarningLog) -> Result<NativePlugin, ProjectError> {
    let id = plugin_id_from_folder(plugin_root);

    let project_path = unity_project_path(plugin_root);
    if !project_path.is_dir() {
        return Err(ProjectError::MissingProject(project_path));
    }

    let native_project_path = plugin_root.join(NATIVE_PROJECT_DIR);
    if !native_project_path.is_dir() {
        return Err(ProjectError::MissingNativeProject(native_project_path));
    }

    let version_file = project_path.join(PROJECT_VERSION_FILE);
    if !version_file.is_file() {
        return Err(ProjectError::NotAProject(version_file));
    }

    let version = match parse_editor_version(&fs::read_to_string(&version_file)?) {
        Some(version) => {
            tracing::debug!(plugin = %id, %version, "Found project version");
            version
        }
        None => {
            tracing::warn!(file = %version_file.display(), "No editor version in version stamp");
            UNKNOWN_VERSION.to_string()
        }
    };

    let mut unity_project = UnityProject {
        path: project_path,
        version,
        native_library_path: None,
        supported_platforms: SupportedPlatforms::new(),
        test_assemblies: Vec::new(),
        editor_test_assemblies: Vec::new(),
    };

    let (general, editor) = find_test_assemblies(&unity_project.assets_path(), &id, warnings);
    unity_project.test_assemblies = general;
    unity_project.editor_test_assemblies = editor;
    unity_project.native_library_path = locate_native_libraries(&unity_project.path, &id, warnings);

    Ok(NativePlugin { id, root_path: plugin_root.to_path_buf(), native_project_path, unity_project })
}

/// Find test assembly names under `assets`, split into (general, editor).
fn find_test_assemblies(assets: &Path, plugin_id: &str, warnings: &mut WarningLog) -> (Vec<String>, Vec<String>) {
    let mut general = Vec::new();
    let mut editor = Vec::new();

    let tests_dirs = find_dirs_named(assets, "Tests");
    if tests_dirs.is_empty() {
        warnings.push(RunWarning::NoTestsFolder { plugin: plugin_id.to_string() });
        return (general, editor);
    }

    for tests_dir in tests_dirs {
        let asmdefs = WalkDir::new(&tests_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == "asmdef"));

        for entry in asmdefs {
            let Some(stem) = entry.path().file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let relative = entry.path().strip_prefix(assets).unwrap_or(entry.path());
            if relative.components().any(|c| c.as_os_str() == "Editor") {
                tracing::debug!(plugin = plugin_id, assembly = %stem, "Found editor test assembly");
                editor.push(stem);
            } else {
                tracing::debug!(plugin = plugin_id, assembly = %stem, "Found test assembly");
                general.push(stem);
            }
        }
    }

    (general, editor)
}

/// Locate the compiler output root inside a Unity project.
///
/// When several exist the first in name order is used and the rest are
/// reported.
pub fn locate_native_libraries(project: &Path, plugin_id: &str, warnings: &mut WarningLog) -> Option<PathBuf> {
    let mut found = find_dirs_named(&project.join("Assets"), NATIVE_LIBRARIES_DIR).into_iter();
    let chosen = found.next()?;
    let ignored: Vec<PathBuf> = found.collect();
    if !ignored.is_empty() {
        warnings.push(RunWarning::AmbiguousNativeLibraries {
            plugin: plugin_id.to_string(),
            chosen: chosen.clone(),
            ignored,
        });
    }
    Some(chosen)
}

/// Directories named `name` under `root`, not descending into matches.
fn find_dirs_named(root: &Path, name: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_dir() && entry.file_name() == name {
            found.push(entry.into_path());
            walker.skip_current_dir();
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_plugin(root: &Path, folder: &str, version_stamp: Option<&str>) -> PathBuf {
        let plugin = root.join(folder);
        let project = plugin.join(format!("{folder}_Unity"));
        fs::create_dir_all(project.join("ProjectSettings")).unwrap();
        fs::create_dir_all(project.join("Assets")).unwrap();
        fs::create_dir_all(plugin.join("Native")).unwrap();
        if let Some(stamp) = version_stamp {
            fs::write(project.join(PROJECT_VERSION_FILE), stamp).unwrap();
        }
        plugin
    }

    #[test]
    fn test_parse_editor_version() {
        let stamp = "m_EditorVersion: 6000.0.23f1\nm_EditorVersionWithRevision: 6000.0.23f1 (1c4764c07fb4)\n";
        assert_eq!(parse_editor_version(stamp), Some("6000.0.23f1".to_string()));
        assert_eq!(parse_editor_version("m_EditorVersion:"), None);
        assert_eq!(parse_editor_version("m_EditorVersion:   \n"), None);
        assert_eq!(parse_editor_version("nothing useful here"), None);
        assert_eq!(parse_editor_version(""), None);
    }

    #[test]
    fn test_plugin_id_from_folder() {
        assert_eq!(plugin_id_from_folder(Path::new("/x/Apple.CoreHaptics")), "CoreHaptics");
        assert_eq!(plugin_id_from_folder(Path::new("/x/Other")), "Other");
    }

    #[test]
    fn test_missing_version_stamp_is_not_a_project() {
        let temp = TempDir::new().unwrap();
        let plugin = write_plugin(temp.path(), "Apple.Core", None);

        let err = scan_plugin(&plugin, &mut WarningLog::new()).unwrap_err();
        assert!(matches!(err, ProjectError::NotAProject(_)));
    }

    #[test]
    fn test_missing_folders() {
        let temp = TempDir::new().unwrap();
        let plugin = temp.path().join("Apple.Empty");
        fs::create_dir_all(&plugin).unwrap();
        let err = scan_plugin(&plugin, &mut WarningLog::new()).unwrap_err();
        assert!(matches!(err, ProjectError::MissingProject(_)));

        let plugin = write_plugin(temp.path(), "Apple.PHASE", Some("m_EditorVersion: 1"));
        fs::remove_dir_all(plugin.join("Native")).unwrap();
        let err = scan_plugin(&plugin, &mut WarningLog::new()).unwrap_err();
        assert!(matches!(err, ProjectError::MissingNativeProject(_)));
    }

    #[test]
    fn test_unknown_version_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let plugin = write_plugin(temp.path(), "Apple.GameKit", Some("m_EditorVersion:"));

        let scanned = scan_plugin(&plugin, &mut WarningLog::new()).unwrap();
        assert_eq!(scanned.unity_project.version, UNKNOWN_VERSION);
        assert!(!scanned.unity_project.has_known_version());
    }

    #[test]
    fn test_test_assemblies_are_classified() {
        let temp = TempDir::new().unwrap();
        let plugin = write_plugin(temp.path(), "Apple.Core", Some("m_EditorVersion: 6000.0.23f1"));
        let tests = plugin.join("Apple.Core_Unity/Assets/Apple.Core/Tests");
        fs::create_dir_all(tests.join("Editor")).unwrap();
        fs::create_dir_all(tests.join("Runtime")).unwrap();
        fs::write(tests.join("Editor/Apple.Core.Editor.Tests.asmdef"), "{}").unwrap();
        fs::write(tests.join("Runtime/Apple.Core.Tests.asmdef"), "{}").unwrap();
        fs::write(tests.join("Runtime/Notes.txt"), "").unwrap();

        let mut warnings = WarningLog::new();
        let scanned = scan_plugin(&plugin, &mut warnings).unwrap();

        assert_eq!(scanned.id, "Core");
        assert!(scanned.is_core());
        assert_eq!(scanned.unity_project.version, "6000.0.23f1");
        assert_eq!(scanned.unity_project.test_assemblies, vec!["Apple.Core.Tests"]);
        assert_eq!(scanned.unity_project.editor_test_assemblies, vec!["Apple.Core.Editor.Tests"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_no_tests_folder_warns() {
        let temp = TempDir::new().unwrap();
        let plugin = write_plugin(temp.path(), "Apple.PHASE", Some("m_EditorVersion: 6000.0.23f1"));

        let mut warnings = WarningLog::new();
        let scanned = scan_plugin(&plugin, &mut warnings).unwrap();

        assert!(scanned.unity_project.test_assemblies.is_empty());
        assert_eq!(warnings.entries(), &[RunWarning::NoTestsFolder { plugin: "PHASE".into() }]);
    }

    #[test]
    fn test_ambiguous_native_libraries_uses_first() {
        let temp = TempDir::new().unwrap();
        let plugin = write_plugin(temp.path(), "Apple.Core", Some("m_EditorVersion: 1"));
        let assets = plugin.join("Apple.Core_Unity/Assets");
        fs::create_dir_all(assets.join("A/NativeLibraries~/Release")).unwrap();
        fs::create_dir_all(assets.join("B/NativeLibraries~")).unwrap();
        fs::create_dir_all(assets.join("Tests")).unwrap();

        let mut warnings = WarningLog::new();
        let scanned = scan_plugin(&plugin, &mut warnings).unwrap();

        assert_eq!(scanned.unity_project.native_library_path, Some(assets.join("A/NativeLibraries~")));
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings.entries()[0], RunWarning::AmbiguousNativeLibraries { .. }));
    }
}
