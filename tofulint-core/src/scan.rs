//! Deterministic discovery of configuration files and module directories.
//!
//! - Early directory pruning via `WalkDir::filter_entry`
//! - Parallel entry filtering via Rayon's `par_bridge`
//! - Results are sorted so downstream output never depends on thread timing

use crate::syntax::is_config_filename;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories never descended into.
const EXCLUDED_DIRS: &[&str] = &[".terraform", ".git", "node_modules"];

#[inline]
fn is_excluded_dir(entry: &walkdir::DirEntry, excludes: &HashSet<&str>) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| excludes.contains(name))
}

#[inline]
fn is_config_file(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .file_name()
            .to_str()
            .is_some_and(is_config_filename)
}

/// Whether a file name matches one of the ignore patterns (exact name or suffix).
pub fn is_ignored(name: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|p| !p.is_empty() && (name == p || name.ends_with(p.as_str())))
}

/// Gathers the `.tf` and `.tf.json` files directly inside `dir`, sorted by name.
pub fn gather_tf_files(dir: &Path, ignore: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .par_bridge()
        .filter_map(|entry| match entry {
            Ok(e) if is_config_file(&e) => {
                let name = e.file_name().to_string_lossy();
                if is_ignored(&name, ignore) {
                    None
                } else {
                    Some(Ok(e.path().to_path_buf()))
                }
            }
            Ok(_) => None,
            Err(e) => Some(Err(e.into())),
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to gather configuration files from {}", dir.display()))?;

    files.sort();
    Ok(files)
}

/// Gathers every directory under `root` (inclusive) that holds configuration files.
///
/// Skips `.terraform/`, `.git/` and `node_modules/`.
pub fn gather_module_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let excludes: HashSet<&str> = EXCLUDED_DIRS.iter().copied().collect();

    let dirs = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, &excludes))
        .par_bridge()
        .filter_map(|entry| match entry {
            Ok(e) if is_config_file(&e) => e.path().parent().map(|p| Ok(p.to_path_buf())),
            Ok(_) => None,
            Err(e) => Some(Err(e.into())),
        })
        .collect::<Result<BTreeSet<_>>>()
        .with_context(|| format!("Failed to gather module directories from {}", root.display()))?;

    Ok(dirs.into_iter().collect())
}
