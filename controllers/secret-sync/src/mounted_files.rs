//! Files the CSI driver has already written to a pod's target path
//!
//! The driver writes each provider object as a file named after the object
//! (or its alias). With atomic writes the visible names are symlinks into a
//! hidden `..data` directory, so symlinks are followed and dot-prefixed
//! entries skipped.

use crate::error::ControllerError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Map of file name to full path for every visible regular file in `target_path`
pub async fn read_mounted_files(target_path: &Path) -> Result<BTreeMap<String, PathBuf>, ControllerError> {
    let io_err = |source| ControllerError::MountedFiles {
        path: target_path.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(target_path).await.map_err(io_err)?;
    let mut files = BTreeMap::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let Ok(name) = entry.file_name().into_string() else {
            debug!("Skipping non UTF-8 file name in {}", target_path.display());
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        // Follows symlinks
        let metadata = tokio::fs::metadata(&path).await.map_err(io_err)?;
        if metadata.is_file() {
            files.insert(name, path);
        }
    }
    Ok(files)
}
