//! Naming and retention of rotated output files
//!
//! Rotated files are named `<prefix><UTC start time>_<index><suffix>`, so
//! sorting the names sorts them by age.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::Result;

/// Path of the `index`th rotated file started now
pub(crate) fn rotated_path(dir: &Path, prefix: &str, index: u32, suffix: &str) -> PathBuf {
    dir.join(format!(
        "{}{}_{:04}{}",
        prefix,
        Utc::now().format("%Y%m%dT%H%M%S"),
        index,
        suffix
    ))
}

/// Regular files in `dir` matching `prefix` and `suffix`, unsorted
pub(crate) fn matching_files(dir: &Path, prefix: &str, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix) && n.ends_with(suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Delete the oldest matching files beyond `keep`, never `current`
pub(crate) fn prune_oldest(dir: &Path, prefix: &str, suffix: &str, keep: usize, current: &Path) -> Result<()> {
    let mut files = matching_files(dir, prefix, suffix)?;
    if files.len() <= keep {
        return Ok(());
    }

    files.sort();
    let excess = files.len() - keep;
    for path in files.into_iter().take(excess) {
        if path == current {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed old file {}", path.display()),
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    Ok(())
}
