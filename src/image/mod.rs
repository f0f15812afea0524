//! Image loading, blending, and saving utilities.

mod blend;
mod load;
mod save;

pub use blend::alpha_blend;
pub use load::{list_images, load_image};
pub use save::{output_file_name, save_image};

/// Default JPEG quality for saved results.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;
