//! Helpers shared by unit tests.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, Rgb, RgbImage};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Temporary directory removed when dropped.
pub struct ScratchDir {
    path: PathBuf,
}

impl Deref for ScratchDir {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for ScratchDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Create an empty scratch directory unique to this process and call site.
pub fn scratch_dir(name: &str) -> ScratchDir {
    let id = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "alphamix-{name}-{}-{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&path);
    std::fs::create_dir_all(&path).expect("create scratch dir");
    ScratchDir { path }
}

/// A single-colour RGB image.
pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

#[test]
fn test_scratch_dir_removed_on_drop() {
    let dir = scratch_dir("drop");
    std::fs::write(dir.join("leftover.png"), b"x").unwrap();
    let path = dir.to_path_buf();
    assert!(path.is_dir());

    drop(dir);
    assert!(!path.exists());
}
