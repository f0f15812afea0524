//! Image loading utilities.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageError, ImageReader};

use crate::error::{Error, Result};

/// Load an image from disk.
///
/// The format is sniffed from the file contents, so the extension does not
/// need to match (or exist). The decoded image keeps its native pixel format.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    let load_error = |source: ImageError| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|err| load_error(ImageError::IoError(err)))?
        .decode()
        .map_err(load_error)
}

/// List the regular files in `dir`.
///
/// Entries come back in directory-listing order, which depends on the
/// filesystem. Pass `sort = true` for a stable, path-sorted order.
/// Subdirectories are skipped; nothing else is filtered, so non-image files
/// fail later when decoded.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_images<P: AsRef<Path>>(dir: P, sort: bool) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let read_dir_error = |source| Error::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if path.is_file() {
            files.push(path);
        }
    }

    if sort {
        files.sort();
    }

    Ok(files)
}
