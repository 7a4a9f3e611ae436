//! Scoped working directory changes.

use std::io;
use std::path::{Path, PathBuf};

/// Changes the process working directory and restores it when dropped.
///
/// xcodebuild and tar are run from inside the directory they operate on.
/// Holding the guard for the duration of a stage means every exit path,
/// including `?` propagation, puts the previous directory back.
#[derive(Debug)]
#[must_use = "the previous directory is restored as soon as the guard is dropped"]
pub struct WorkingDirGuard {
    previous: PathBuf,
}

impl WorkingDirGuard {
    /// Enter `path`, remembering the current directory.
    pub fn enter(path: impl AsRef<Path>) -> io::Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(path.as_ref())?;
        tracing::debug!(dir = %path.as_ref().display(), "Entered directory");
        Ok(Self { previous })
    }

    /// Directory that will be restored on drop.
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            tracing::error!(
                dir = %self.previous.display(),
                error = %e,
                "Failed to restore working directory"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_guard_restores_directory() {
        let original = std::env::current_dir().unwrap();
        let temp = TempDir::new().unwrap();

        {
            let guard = WorkingDirGuard::enter(temp.path()).unwrap();
            assert_eq!(guard.previous(), original.as_path());
            assert_eq!(
                std::env::current_dir().unwrap().canonicalize().unwrap(),
                temp.path().canonicalize().unwrap()
            );
        }

        assert_eq!(std::env::current_dir().unwrap(), original);
    }

    #[test]
    #[serial]
    fn test_guard_restores_on_early_return() {
        fn failing_stage(dir: &Path) -> io::Result<()> {
            let _guard = WorkingDirGuard::enter(dir)?;
            Err(io::Error::new(io::ErrorKind::Other, "stage failed"))
        }

        let original = std::env::current_dir().unwrap();
        let temp = TempDir::new().unwrap();

        assert!(failing_stage(temp.path()).is_err());
        assert_eq!(std::env::current_dir().unwrap(), original);
    }

    #[test]
    #[serial]
    fn test_enter_missing_directory_fails_without_moving() {
        let original = std::env::current_dir().unwrap();
        let temp = TempDir::new().unwrap();

        assert!(WorkingDirGuard::enter(temp.path().join("missing")).is_err());
        assert_eq!(std::env::current_dir().unwrap(), original);
    }
}
