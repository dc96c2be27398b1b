use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::error::Result;

/// A discovered content source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the directory the walk started from.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
    /// Last modification time as seconds since the Unix epoch.
    pub mtime: u64,
    /// File size in bytes.
    pub size: u64,
}

const CONTENT_EXTENSION: &str = "md";

/// Recursively discover content files under a directory.
///
/// Skips entries whose names start with `.` or `_` and only returns `.md`
/// files, sorted by relative path so downstream processing is deterministic.
/// A missing root yields an empty list; a content type with no directory
/// simply has no items.
pub fn discover(root: &Path) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<SourceFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden entries and underscore-prefixed ones; `_taxonomies`
        // and friends are declarations, not content.
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), results)?;
        } else if file_type.is_symlink() {
            // Resolve the symlink; skip broken links and anything that
            // points back inside the root (cycle prevention).
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => continue,
            };
            if resolved.starts_with(root) && resolved.is_dir() {
                continue;
            }
            if resolved.is_file() && is_content(&resolved) {
                results.push(make_source(root, &entry.path(), &resolved)?);
            }
        } else if file_type.is_file() && is_content(&entry.path()) {
            let abs = entry.path().canonicalize()?;
            results.push(make_source(root, &entry.path(), &abs)?);
        }
    }

    Ok(())
}

fn is_content(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == CONTENT_EXTENSION)
}

fn make_source(
    root: &Path,
    original_path: &Path,
    absolute_path: &Path,
) -> Result<SourceFile> {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();

    let metadata = std::fs::metadata(absolute_path)?;
    let mtime = metadata
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    Ok(SourceFile {
        relative_path,
        absolute_path: absolute_path.to_path_buf(),
        mtime,
        size: metadata.len(),
    })
}
