use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::error::ImportError;

/// List post files in `dir` whose name ends with `extension`, in byte order.
///
/// A missing or unreadable directory is fatal. Names that aren't valid UTF-8
/// are ignored.
pub fn scan_post_files(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|source| ImportError::Scan {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ImportError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;
        let Ok(name) = entry.file_name().into_string() else {
            debug!("Ignoring non UTF-8 entry in {}", dir.display());
            continue;
        };
        if name.ends_with(extension) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}
