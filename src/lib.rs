//! # alphamix
//!
//! Batch img2img over a directory of images, where each input can first be
//! alpha-blended with a reference: either the image generated for the
//! previous input, or the previous input itself.
//!
//! Generation is delegated to a [`Generator`]. [`WebUiGenerator`] talks to a
//! Stable-Diffusion-WebUI compatible HTTP API; anything else can implement
//! the trait.
//!
//! ## Example
//!
//! ```no_run
//! use alphamix::{BatchAlphaMix, Config, GenerationRequest, ReferenceMode, RunContext, Script};
//! use alphamix::{WebUiConfig, WebUiGenerator};
//!
//! # fn main() -> alphamix::Result<()> {
//! let mut generator = WebUiGenerator::new(WebUiConfig::default())?;
//! let config = Config {
//!     alpha: 0.3,
//!     input_dir: "frames".into(),
//!     output_dir: Some("out".into()),
//!     mode: ReferenceMode::PriorOutput,
//!     ..Config::default()
//! };
//!
//! BatchAlphaMix.run(
//!     &mut RunContext::new(),
//!     &mut generator,
//!     GenerationRequest::default(),
//!     &config,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod script;

#[cfg(test)]
mod test_util;

pub use context::{InterruptHandle, RunContext};
pub use error::{Error, Result};
pub use pipeline::{Generation, GenerationRequest, Generator, WebUiConfig, WebUiGenerator};
pub use script::{BatchAlphaMix, Config, ReferenceMode, Script, TabMode};
