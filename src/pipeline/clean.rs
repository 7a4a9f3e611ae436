//! Removal of build output before a run.

use std::fs;
use std::path::Path;

use crate::core::{Decision, Prompter, RunWarning, WarningLog};
use crate::unity::{sorted_entries, unity_project_path};

/// Files kept when a folder is emptied.
const PRESERVED_FILES: [&str; 2] = [".gitignore", ".npmignore"];

/// Delete `path`, or only its contents when `contents_only` is set.
///
/// Asks for confirmation unless `force`. Returns whether anything was
/// attempted.
pub fn remove_folder(
    path: &Path,
    contents_only: bool,
    force: bool,
    prompter: &mut dyn Prompter,
    warnings: &mut WarningLog,
) -> anyhow::Result<bool> {
    if !path.is_dir() {
        tracing::debug!(path = %path.display(), "Nothing to remove");
        return Ok(false);
    }

    if !force {
        let prompt = if contents_only {
            format!("Delete the contents of {}?", path.display())
        } else {
            format!("Delete {}?", path.display())
        };
        if !prompter.confirm(Decision::DeleteFolder, &prompt)? {
            tracing::info!(path = %path.display(), "Keeping folder");
            return Ok(false);
        }
    }

    if !contents_only {
        tracing::info!(path = %path.display(), "Removing folder");
        if let Err(e) = fs::remove_dir_all(path) {
            warnings.push(RunWarning::FolderRemovalFailed { path: path.to_path_buf(), reason: e.to_string() });
        }
        return Ok(true);
    }

    for item in sorted_entries(path)? {
        let preserved = item
            .file_name()
            .is_some_and(|name| PRESERVED_FILES.iter().any(|keep| name == *keep));
        if preserved {
            continue;
        }

        tracing::info!(path = %item.display(), "Removing");
        let result = if item.is_dir() { fs::remove_dir_all(&item) } else { fs::remove_file(&item) };
        if let Err(e) = result {
            warnings.push(RunWarning::FolderRemovalFailed { path: item, reason: e.to_string() });
        }
    }
    Ok(true)
}

/// Remove the test output root and every plug-in's leftover `TestPlayers`.
pub fn clean_tests(
    test_output: &Path,
    plugin_root: &Path,
    force: bool,
    prompter: &mut dyn Prompter,
    warnings: &mut WarningLog,
) -> anyhow::Result<()> {
    remove_folder(test_output, false, force, prompter, warnings)?;

    if !plugin_root.is_dir() {
        return Ok(());
    }
    for plugin in sorted_entries(plugin_root)? {
        if plugin.is_dir() {
            let test_players = unity_project_path(&plugin).join("TestPlayers");
            remove_folder(&test_players, false, force, prompter, warnings)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AutoPrompter;
    use crate::core::PromptConfig;
    use tempfile::TempDir;

    fn populated(temp: &TempDir) -> std::path::PathBuf {
        let dir = temp.path().join("NativeLibraries~");
        fs::create_dir_all(dir.join("Release/iOS")).unwrap();
        fs::write(dir.join(".gitignore"), "*").unwrap();
        fs::write(dir.join(".npmignore"), "").unwrap();
        fs::write(dir.join("stale.txt"), "").unwrap();
        dir
    }

    #[test]
    fn test_contents_only_keeps_ignore_files() {
        let temp = TempDir::new().unwrap();
        let dir = populated(&temp);

        let mut prompter = AutoPrompter::default();
        let mut warnings = WarningLog::new();
        assert!(remove_folder(&dir, true, true, &mut prompter, &mut warnings).unwrap());

        let mut left: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec![".gitignore", ".npmignore"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_declined_deletion_keeps_folder() {
        let temp = TempDir::new().unwrap();
        let dir = populated(&temp);

        let mut prompter = AutoPrompter::default();
        assert!(!remove_folder(&dir, false, false, &mut prompter, &mut WarningLog::new()).unwrap());
        assert!(dir.join("stale.txt").exists());

        let mut prompter = AutoPrompter::from_config(&PromptConfig { confirm_deletion: true, ..PromptConfig::default() }, false);
        assert!(remove_folder(&dir, false, false, &mut prompter, &mut WarningLog::new()).unwrap());
        assert!(!dir.exists());
    }

    #[test]
    fn test_clean_tests_removes_test_players() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("TestBuilds");
        let players = temp.path().join("plug-ins/Apple.Core/Apple.Core_Unity/TestPlayers");
        fs::create_dir_all(&output).unwrap();
        fs::create_dir_all(&players).unwrap();

        let mut prompter = AutoPrompter::default();
        clean_tests(&output, &temp.path().join("plug-ins"), true, &mut prompter, &mut WarningLog::new()).unwrap();

        assert!(!output.exists());
        assert!(!players.exists());
        assert!(players.parent().unwrap().exists());
    }
}
