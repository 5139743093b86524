//! On-disk trust caches: the saved license record and the negative cache.

pub mod file;
pub mod negative;
pub mod record;

use crate::LicensureError;
use std::fs;
use std::path::Path;

/// Write `contents` to `path` via a sibling temp file and a rename.
///
/// Creates the parent directory if needed.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), LicensureError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| LicensureError::CacheIO(format!("Failed to create cache dir: {}", e)))?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, contents)
        .map_err(|e| LicensureError::CacheIO(format!("Failed to write temp file: {}", e)))?;

    fs::rename(&temp_path, path)
        .map_err(|e| LicensureError::CacheIO(format!("Failed to rename cache file: {}", e)))?;

    Ok(())
}
