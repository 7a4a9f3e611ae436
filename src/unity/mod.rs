//! Unity installations, plug-in projects, and the platforms they were built for.

mod asmdef;
mod installation;
mod platform;
mod project;

pub use asmdef::{allowed_platforms, narrow_include_platforms, AsmdefPatch, EDITOR_PLATFORM};
pub use installation::{InstallationRegistry, UnityInstallation, UNITY_APP_NAME, UNITY_EXECUTABLE};
pub use platform::{PlatformDiscovery, SdkVariant, SupportedPlatforms, UnityPlatform};
pub(crate) use platform::sorted_entries;
pub use project::{
    locate_native_libraries, parse_editor_version, plugin_id_from_folder, scan_plugin, unity_project_path,
    NativePlugin, ProjectError, UnityProject, CORE_PLUGIN_ID, EDITOR_VERSION_MARKER, NATIVE_LIBRARIES_DIR,
    NATIVE_PROJECT_DIR, PLUGIN_PREFIX, PROJECT_VERSION_FILE, UNITY_PROJECT_SUFFIX, UNKNOWN_VERSION,
};
