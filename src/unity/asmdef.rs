//! Assembly definition platform validation.
//!
//! An `.asmdef` that lists a platform in `includePlatforms` fails to compile
//! in editors that lack the platform's native library. Before packing, the
//! list is narrowed to the platforms that were actually built and the
//! original file is put back afterwards.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use super::platform::SupportedPlatforms;
use crate::core::{RunWarning, WarningLog};

/// Platform name that is always allowed.
pub const EDITOR_PLATFORM: &str = "Editor";

const BACKUP_EXTENSION: &str = "asmdef.backup";

/// `includePlatforms` names a plug-in may keep, given what was built.
pub fn allowed_platforms(supported: &SupportedPlatforms) -> BTreeSet<String> {
    std::iter::once(EDITOR_PLATFORM.to_string())
        .chain(supported.keys().map(|p| p.asmdef_name().to_string()))
        .collect()
}

/// Narrow `includePlatforms` to `allowed`.
///
/// Returns the removed names, or `None` when the definition needs no change.
/// An empty or missing list means every platform and is left alone.
pub fn narrow_include_platforms(asmdef: &mut Value, allowed: &BTreeSet<String>) -> Option<Vec<String>> {
    let listed: Vec<String> = asmdef
        .get("includePlatforms")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    if listed.is_empty() {
        return None;
    }

    let (kept, removed): (BTreeSet<String>, BTreeSet<String>) =
        listed.into_iter().partition(|name| allowed.contains(name));
    if removed.is_empty() {
        return None;
    }

    asmdef["includePlatforms"] = Value::Array(kept.into_iter().map(Value::String).collect());
    Some(removed.into_iter().collect())
}

/// Rewritten assembly definitions, restored from backup when dropped.
#[derive(Debug, Default)]
#[must_use = "assembly definitions are restored as soon as the patch is dropped"]
pub struct AsmdefPatch {
    backups: Vec<(PathBuf, PathBuf)>,
}

impl AsmdefPatch {
    /// Validate every `.asmdef` under `package_dir`.
    pub fn apply(package_dir: &Path, allowed: &BTreeSet<String>, warnings: &mut WarningLog) -> Self {
        let mut patch = Self::default();

        let asmdefs = WalkDir::new(package_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == "asmdef"));

        for entry in asmdefs {
            let path = entry.into_path();
            if let Err(e) = patch.fix_file(&path, allowed) {
                warnings.push(RunWarning::AsmdefUnreadable { path, reason: e.to_string() });
            }
        }

        if !patch.backups.is_empty() {
            tracing::info!(count = patch.backups.len(), "Narrowed assembly definition platforms");
        }
        patch
    }

    fn fix_file(&mut self, path: &Path, allowed: &BTreeSet<String>) -> io::Result<()> {
        let mut asmdef: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        let Some(removed) = narrow_include_platforms(&mut asmdef, allowed) else {
            return Ok(());
        };

        let backup = path.with_extension(BACKUP_EXTENSION);
        fs::copy(path, &backup)?;
        self.backups.push((path.to_path_buf(), backup));

        fs::write(path, to_pretty_json(&asmdef)?)?;
        tracing::info!(file = %path.display(), removed = %removed.join(", "), "Removed unbuilt platforms");
        Ok(())
    }

    /// Files currently rewritten.
    pub fn patched_files(&self) -> impl Iterator<Item = &Path> {
        self.backups.iter().map(|(original, _)| original.as_path())
    }

    /// Put every original back, recording failures.
    pub fn restore(mut self, warnings: &mut WarningLog) {
        for (original, backup) in self.backups.drain(..) {
            if let Err(e) = fs::rename(&backup, &original) {
                warnings.push(RunWarning::AsmdefRestoreFailed { path: original, reason: e.to_string() });
            }
        }
    }
}

impl Drop for AsmdefPatch {
    fn drop(&mut self) {
        for (original, backup) in self.backups.drain(..) {
            if let Err(e) = fs::rename(&backup, &original) {
                tracing::error!(file = %original.display(), error = %e, "Failed to restore assembly definition");
            }
        }
    }
}

/// Four-space indented JSON with a trailing newline, as Unity writes it.
fn to_pretty_json(value: &Value) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}
