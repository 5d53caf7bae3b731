//! Package extraction into a staging directory

use std::fs::File;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::core::error::{Result, UpdateError};

fn extraction_failed(reason: impl std::fmt::Display) -> UpdateError {
    UpdateError::ExtractionFailed {
        reason: reason.to_string(),
    }
}

/// Extract the zip at `archive_path` into `dest`, which must not exist yet.
///
/// Returns the number of files written. Entries whose names would escape
/// `dest` are rejected. On failure `dest` is removed.
pub fn extract_package(archive_path: &Path, dest: &Path) -> Result<usize> {
    if dest.exists() {
        return Err(extraction_failed(format!(
            "staging directory already exists: {}",
            dest.display()
        )));
    }

    let result = extract_into(archive_path, dest);
    if result.is_err() {
        if let Err(e) = std::fs::remove_dir_all(dest) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(dir = %dest.display(), error = %e, "Failed to remove partial staging directory");
            }
        }
    }
    result
}

fn extract_into(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .map_err(|e| extraction_failed(format!("{}: {}", archive_path.display(), e)))?;
    let mut archive = ZipArchive::new(file).map_err(extraction_failed)?;

    std::fs::create_dir_all(dest).map_err(extraction_failed)?;
    let mut files = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(extraction_failed)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| extraction_failed(format!("unsafe entry name: {}", entry.name())))?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(extraction_failed)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(extraction_failed)?;
        }
        let mut outfile = File::create(&out_path).map_err(extraction_failed)?;
        io::copy(&mut entry, &mut outfile).map_err(extraction_failed)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                .map_err(extraction_failed)?;
        }

        files += 1;
    }

    tracing::info!(files, dest = %dest.display(), "Package extracted");
    Ok(files)
}
