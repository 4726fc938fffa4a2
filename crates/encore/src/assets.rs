use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::storage::Store;

#[derive(Error, Debug)]
pub enum CopyAssetsError {
    #[error("failed to walk asset directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Copies every file under `source_path` to `destination` in the output,
/// keeping the directory structure. A missing `source_path` copies nothing.
pub fn copy_tree(
    source_path: &Path,
    destination: &Path,
    storage: &impl Store,
) -> Result<usize, CopyAssetsError> {
    if !source_path.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;

    for entry in WalkDir::new(source_path).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let bytes = fs::read(path).map_err(|source| CopyAssetsError::Read {
            path: path.to_owned(),
            source,
        })?;

        let relative_path = path.strip_prefix(source_path).unwrap_or(path);

        storage
            .store_asset(&destination.join(relative_path), bytes)
            .map_err(|err| CopyAssetsError::Storage(err.to_string()))?;

        copied += 1;
    }

    Ok(copied)
}
