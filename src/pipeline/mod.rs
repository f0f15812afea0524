//! The external image-generation pipeline.
//!
//! The batch runner never generates images itself. It fills in a
//! [`GenerationRequest`], hands it to a [`Generator`], and reads back the
//! images in the returned [`Generation`].

mod webui;

pub use webui::{WebUiConfig, WebUiGenerator};

use image::DynamicImage;
use rand::Rng;

use crate::error::{Error, Result};

/// A synchronous img2img backend.
pub trait Generator {
    /// Run one generation call.
    ///
    /// Implementations should return `batch_size * n_iter` images, but the
    /// caller only relies on there being at least one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails; the caller does not retry.
    fn generate(&mut self, request: &GenerationRequest) -> Result<Generation>;
}

/// Settings for one img2img call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Input images, one per batch slot.
    pub init_images: Vec<DynamicImage>,

    pub prompt: String,
    pub negative_prompt: String,

    /// Sampling steps.
    pub steps: u32,

    /// Classifier-free guidance scale.
    pub cfg_scale: f32,

    /// How far the output may drift from the input (0.0-1.0).
    pub denoising_strength: f32,

    /// Sampler name understood by the backend. `None` uses its default.
    pub sampler_name: Option<String>,

    /// Seed. `None` until [`GenerationRequest::fix_seed`] picks one.
    pub seed: Option<u64>,

    /// Images generated per iteration.
    pub batch_size: u32,

    /// Iterations per call.
    pub n_iter: u32,

    /// Output size. `None` follows the first input image.
    pub width: Option<u32>,
    pub height: Option<u32>,

    /// Ask the backend not to persist individual samples.
    pub do_not_save_samples: bool,

    /// Ask the backend not to persist the batch grid.
    pub do_not_save_grid: bool,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            init_images: Vec::new(),
            prompt: String::new(),
            negative_prompt: String::new(),
            steps: 20,
            cfg_scale: 7.0,
            denoising_strength: 0.75,
            sampler_name: None,
            seed: None,
            batch_size: 1,
            n_iter: 1,
            width: None,
            height: None,
            do_not_save_samples: false,
            do_not_save_grid: false,
        }
    }
}

impl GenerationRequest {
    /// Pick a random seed if none is set, so repeated calls share it.
    ///
    /// Returns the seed in effect.
    pub fn fix_seed(&mut self) -> u64 {
        *self.seed.get_or_insert_with(|| rand::rng().random_range(0..u64::from(u32::MAX)))
    }

    /// Validate the request settings.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidParameter {
                name: "batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.n_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "n_iter".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.steps == 0 {
            return Err(Error::InvalidParameter {
                name: "steps".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.seed.is_some_and(|seed| i64::try_from(seed).is_err()) {
            return Err(Error::InvalidParameter {
                name: "seed".to_string(),
                reason: format!("must be at most {}", i64::MAX),
            });
        }

        if !(0.0..=1.0).contains(&self.denoising_strength) {
            return Err(Error::InvalidParameter {
                name: "denoising_strength".to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }

        Ok(())
    }
}

/// Result of one generation call.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// Generated images, in backend order.
    pub images: Vec<DynamicImage>,

    /// Seed the backend actually used, if it reports one.
    pub seed: Option<u64>,

    /// Free-form metadata from the backend.
    pub info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_seed_keeps_explicit_seed() {
        let mut request = GenerationRequest {
            seed: Some(1234),
            ..GenerationRequest::default()
        };
        assert_eq!(request.fix_seed(), 1234);
        assert_eq!(request.seed, Some(1234));
    }

    #[test]
    fn test_fix_seed_is_stable() {
        let mut request = GenerationRequest::default();
        let seed = request.fix_seed();
        assert_eq!(request.fix_seed(), seed);
        assert_eq!(request.seed, Some(seed));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let request = GenerationRequest {
            batch_size: 0,
            ..GenerationRequest::default()
        };
        assert!(matches!(
            request.validate(),
            Err(Error::InvalidParameter { name, .. }) if name == "batch_size"
        ));
    }

    #[test]
    fn test_validate_rejects_strength_out_of_range() {
        let request = GenerationRequest {
            denoising_strength: 1.5,
            ..GenerationRequest::default()
        };
        assert!(request.validate().is_err());
        assert!(GenerationRequest::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_seed_beyond_backend_range() {
        let request = GenerationRequest {
            seed: Some(u64::MAX),
            ..GenerationRequest::default()
        };
        assert!(matches!(
            request.validate(),
            Err(Error::InvalidParameter { name, .. }) if name == "seed"
        ));

        let largest = GenerationRequest {
            seed: Some(i64::MAX.unsigned_abs()),
            ..GenerationRequest::default()
        };
        assert!(largest.validate().is_ok());
    }
}
