//! Directory scanning for indexable files.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Options controlling a directory scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Glob patterns excluded relative to the scan root. A bare name such as
    /// `node_modules` excludes that directory at any depth.
    pub exclude: Vec<String>,
    /// Whether to descend into subdirectories.
    pub recursive: bool,
}

/// Yield files under `root` whose lowercased extension satisfies
/// `supported`, honoring exclusion globs, in deterministic name order.
pub fn scan(
    root: &Path,
    options: &ScanOptions,
    supported: impl Fn(&str) -> bool,
) -> Result<Vec<PathBuf>> {
    let exclusions = build_globset(&options.exclude)?;
    let max_depth = if options.recursive { usize::MAX } else { 1 };

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            relative.as_os_str().is_empty() || !exclusions.is_match(relative)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let extension = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if supported(&extension) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Expand each pattern so a bare directory name matches at any depth.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expanded in [
            pattern.clone(),
            format!("{pattern}/**"),
            format!("**/{pattern}"),
            format!("**/{pattern}/**"),
        ] {
            let glob = Glob::new(&expanded)
                .map_err(|e| Error::Config(format!("invalid exclude pattern '{pattern}': {e}")))?;
            builder.add(glob);
        }
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid exclude patterns: {e}")))
}
