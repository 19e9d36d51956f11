/*!
 * Unpacking of zipped job results
 */

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

use crate::error::{LinkError, Result};

/// Extract a zip archive held in memory below `dir`
///
/// `dir` and any intermediate directories are created. Returns the files
/// written, in archive order. An entry whose path is absolute or climbs out
/// of `dir` aborts the extraction with a validation error.
pub fn extract_into(data: &[u8], dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| LinkError::Validation(format!("invalid results archive: {}", e)))?;

    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| LinkError::Validation(format!("invalid results archive: {}", e)))?;

        let relative = entry.enclosed_name().ok_or_else(|| {
            LinkError::Validation(format!(
                "archive entry '{}' points outside {}",
                entry.name(),
                dir.display()
            ))
        })?;
        let target = dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&target)?;
        io::copy(&mut entry, &mut file)?;
        debug!(path = %target.display(), size = entry.size(), "Extracted result");
        written.push(target);
    }

    Ok(written)
}
