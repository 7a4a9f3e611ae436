//! Packing built plug-ins into `.tgz` archives.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::{CommandRunner, RunWarning, ToolCommand, WarningLog, WorkingDirGuard};
use crate::unity::{allowed_platforms, AsmdefPatch, NativePlugin};

pub const MANIFEST_FILE: &str = "package.json";

/// Folder whose manifests belong to dependencies, not the plug-in.
const PACKAGE_CACHE_DIR: &str = "PackageCache";

const DEMOS_DIR: &str = "Demos";
const DEMOS_META: &str = "Demos.meta";
const HIDDEN_DEMOS_DIR: &str = "Demos~";

/// The fields of `package.json` used for naming archives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid package manifest {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

impl PackageManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content =
            fs::read_to_string(path).map_err(|source| ManifestError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse { path: path.to_path_buf(), source })
    }

    /// `<name>-<version>.tgz`
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.name, self.version)
    }
}

/// Result of searching a project for its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSearch {
    pub chosen: PathBuf,
    /// Further candidates, in name order
    pub ignored: Vec<PathBuf>,
}

/// Find the plug-in's `package.json`, skipping package caches.
pub fn find_manifest(project: &Path) -> Option<ManifestSearch> {
    let mut found = WalkDir::new(project)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != PACKAGE_CACHE_DIR)
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == MANIFEST_FILE)
        .map(walkdir::DirEntry::into_path);

    let chosen = found.next()?;
    Some(ManifestSearch { chosen, ignored: found.collect() })
}

/// Archive `package_dir` into `archive`, rooting entries at `package/`.
pub fn pack_command(archive: &Path, package_dir: &Path) -> ToolCommand {
    ToolCommand::new("tar")
        .args(["--auto-compress", "--create", "--file"])
        .arg(archive)
        .arg("--directory")
        .arg(package_dir)
        .args(["-s", "/./package/", "."])
}

/// Keeps a package's demo folder out of the archive.
///
/// `Demos` becomes `Demos~`, which Unity ignores, and `Demos.meta` moves up
/// one level. Both are moved back when the stash is dropped. Nothing is
/// moved onto an existing path.
#[derive(Debug, Default)]
#[must_use = "the demo folder is moved back as soon as the stash is dropped"]
pub struct DemoStash {
    moved: Vec<(PathBuf, PathBuf)>,
}

impl DemoStash {
    pub fn stash(package_dir: &Path) -> io::Result<Self> {
        let mut stash = Self::default();

        let demos = package_dir.join(DEMOS_DIR);
        if !demos.is_dir() {
            return Ok(stash);
        }
        stash.move_aside(demos, package_dir.join(HIDDEN_DEMOS_DIR))?;

        let meta = package_dir.join(DEMOS_META);
        if meta.exists() {
            stash.move_aside(meta, package_dir.join("..").join(DEMOS_META))?;
        }
        Ok(stash)
    }

    fn move_aside(&mut self, from: PathBuf, to: PathBuf) -> io::Result<()> {
        if to.symlink_metadata().is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("cannot move {} aside, {} already exists", from.display(), to.display()),
            ));
        }
        fs::rename(&from, &to)?;
        tracing::debug!(from = %from.display(), to = %to.display(), "Moved aside");
        self.moved.push((from, to));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.moved.is_empty()
    }

    /// Move everything back.
    pub fn restore(mut self) -> io::Result<()> {
        self.restore_all()
    }

    fn restore_all(&mut self) -> io::Result<()> {
        let mut first_error = None;
        while let Some((original, stashed)) = self.moved.pop() {
            if let Err(e) = fs::rename(&stashed, &original) {
                tracing::error!(path = %original.display(), error = %e, "Failed to restore");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for DemoStash {
    fn drop(&mut self) {
        let _ = self.restore_all();
    }
}

/// Pack one registered plug-in into `output_dir`.
///
/// Returns the archive path when tar succeeded. Filesystem problems are
/// recorded as `PackFailed` for this plug-in only. The demo folder and any
/// narrowed assembly definitions are restored whatever the outcome.
pub fn pack_plugin(
    plugin: &NativePlugin,
    output_dir: &Path,
    validate_asmdefs: bool,
    runner: &dyn CommandRunner,
    warnings: &mut WarningLog,
) -> anyhow::Result<Option<PathBuf>> {
    let project = &plugin.unity_project;
    tracing::info!(plugin = %plugin.id, "Packing");

    let Some(search) = find_manifest(&project.path) else {
        warnings.push(RunWarning::MissingManifest { plugin: plugin.id.clone() });
        return Ok(None);
    };
    if !search.ignored.is_empty() {
        warnings.push(RunWarning::AmbiguousManifest {
            plugin: plugin.id.clone(),
            chosen: search.chosen.clone(),
            ignored: search.ignored.clone(),
        });
    }

    let manifest = match PackageManifest::load(&search.chosen) {
        Ok(manifest) => manifest,
        Err(e) => {
            warnings.push(RunWarning::ManifestUnreadable { path: search.chosen, reason: e.to_string() });
            return Ok(None);
        }
    };

    let Some(package_dir) = search.chosen.parent().map(Path::to_path_buf) else {
        return Ok(None);
    };
    let archive = output_dir.join(manifest.archive_name());

    let _cwd = match WorkingDirGuard::enter(&project.path) {
        Ok(guard) => guard,
        Err(e) => {
            pack_failed(warnings, plugin, &e);
            return Ok(None);
        }
    };

    let patch = if validate_asmdefs {
        AsmdefPatch::apply(&package_dir, &allowed_platforms(&project.supported_platforms), warnings)
    } else {
        AsmdefPatch::default()
    };
    let stash = match DemoStash::stash(&package_dir) {
        Ok(stash) => stash,
        Err(e) => {
            pack_failed(warnings, plugin, &e);
            patch.restore(warnings);
            return Ok(None);
        }
    };

    let command = pack_command(&archive, &package_dir);
    tracing::debug!(command = %command, "Pack command");
    let packed = match runner.run(&command) {
        Ok(output) if output.success() => {
            tracing::info!(archive = %archive.display(), "Packed");
            Some(archive)
        }
        Ok(output) => {
            warnings.push(RunWarning::PackFailed { plugin: plugin.id.clone(), code: output.code, output: output.combined() });
            None
        }
        Err(e) => {
            pack_failed(warnings, plugin, &e);
            None
        }
    };

    if let Err(e) = stash.restore() {
        tracing::error!(plugin = %plugin.id, error = %e, "Demo folder was not fully restored");
    }
    patch.restore(warnings);

    Ok(packed)
}

fn pack_failed(warnings: &mut WarningLog, plugin: &NativePlugin, error: &dyn std::fmt::Display) {
    warnings.push(RunWarning::PackFailed { plugin: plugin.id.clone(), code: None, output: error.to_string() });
}
