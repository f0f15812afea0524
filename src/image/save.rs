//! Image saving utilities.

use std::ffi::{OsStr, OsString};
use std::path::Path;

use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};

/// Save an image, choosing the encoder from the file extension.
///
/// JPEG output uses `quality` (1-100) and drops any alpha channel. Paths
/// without a recognised extension are written as PNG.
///
/// # Errors
///
/// Returns an error if the image cannot be encoded or written.
pub fn save_image<P: AsRef<Path>>(img: &DynamicImage, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();
    let save_error = |source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    };

    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Jpeg) => {
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(save_error)?;
        }
        Ok(format) => img.save_with_format(path, format).map_err(save_error)?,
        Err(_) => img
            .save_with_format(path, ImageFormat::Png)
            .map_err(save_error)?,
    }

    Ok(())
}

/// File name for the `index`-th result generated from `input`.
///
/// The first result keeps the input's file name; later ones get a 1-based
/// suffix before the extension: `photo.png`, `photo-1.png`, `photo-2.png`.
#[must_use]
pub fn output_file_name(input: &Path, index: usize) -> OsString {
    let file_name = input.file_name().map(OsStr::to_os_string).unwrap_or_default();
    if index == 0 {
        return file_name;
    }

    let mut name = input
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or(file_name);
    name.push(format!("-{index}"));
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}
