//! Batch img2img over a directory, blending each input with a reference.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ::image::{DynamicImage, RgbImage};

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::image;
use crate::pipeline::{Generation, GenerationRequest, Generator};

use super::{Parameter, ParameterKind, ParameterSchema, Script, TabMode};

/// What each input is blended against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMode {
    /// The first image generated for the previous input.
    #[default]
    PriorOutput,
    /// The previous input file, reloaded from disk.
    PriorInput,
}

impl ReferenceMode {
    /// Accepted spellings, as used on the command line.
    pub const NAMES: &'static [&'static str] = &["prior-output", "prior-input"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriorOutput => "prior-output",
            Self::PriorInput => "prior-input",
        }
    }
}

impl FromStr for ReferenceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prior-output" => Ok(Self::PriorOutput),
            "prior-input" => Ok(Self::PriorInput),
            _ => Err(Error::InvalidParameter {
                name: "mode".to_string(),
                reason: format!("expected one of {}", Self::NAMES.join(", ")),
            }),
        }
    }
}

/// Configuration for a batch alpha-mix run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Blend weight of the reference (0.0-1.0). 0 passes inputs through.
    pub alpha: f32,

    /// Directory whose regular files are processed.
    pub input_dir: PathBuf,

    /// Where results are written. `None` or an empty path leaves saving to
    /// the generation backend.
    pub output_dir: Option<PathBuf>,

    /// Accepted for compatibility; existing files are replaced either way.
    pub overwrite: bool,

    /// Reference policy.
    pub mode: ReferenceMode,

    /// Sort inputs by path instead of using directory-listing order.
    pub sort_inputs: bool,

    /// JPEG quality (1-100) for `.jpg` outputs.
    pub output_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: 0.0,
            input_dir: PathBuf::new(),
            output_dir: None,
            overwrite: false,
            mode: ReferenceMode::default(),
            sort_inputs: false,
            output_quality: image::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidParameter {
                name: "alpha".to_string(),
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }

        if self.input_dir.as_os_str().is_empty() {
            return Err(Error::InvalidParameter {
                name: "input_dir".to_string(),
                reason: "is required".to_string(),
            });
        }

        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }

    /// The output directory, if results should be written by this crate.
    #[must_use]
    pub fn explicit_output_dir(&self) -> Option<&Path> {
        self.output_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}

/// The "batch alpha-mix" script.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchAlphaMix;

impl BatchAlphaMix {
    /// Reference image for input `index`, before its generation runs.
    fn reference_for(
        mode: ReferenceMode,
        inputs: &[PathBuf],
        index: usize,
        prior_output: Option<RgbImage>,
    ) -> Result<Option<RgbImage>> {
        match mode {
            ReferenceMode::PriorOutput => Ok(prior_output),
            ReferenceMode::PriorInput => index
                .checked_sub(1)
                .map(|prev| image::load_image(&inputs[prev]).map(|img| img.to_rgb8()))
                .transpose(),
        }
    }

    fn save_results(
        generation: &Generation,
        input: &Path,
        output_dir: &Path,
        quality: u8,
    ) -> Result<()> {
        for (n, result) in generation.images.iter().enumerate() {
            let target = output_dir.join(image::output_file_name(input, n));
            if target.exists() {
                tracing::warn!("Replacing existing file {}", target.display());
            }
            image::save_image(result, &target, quality)?;
            tracing::debug!("Saved {}", target.display());
        }
        Ok(())
    }
}

impl Script for BatchAlphaMix {
    type Params = Config;

    fn name(&self) -> &'static str {
        "batch alpha-mix"
    }

    fn applies(&self, mode: TabMode) -> bool {
        mode == TabMode::Img2Img
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema {
            parameters: vec![
                Parameter {
                    name: "alpha",
                    label: "alpha (0 is raw input, 1 feeds an exact copy of the reference into input)",
                    kind: ParameterKind::Slider {
                        min: 0.0,
                        max: 1.0,
                        step: 0.05,
                        default: 0.0,
                    },
                },
                Parameter {
                    name: "input_dir",
                    label: "Input directory",
                    kind: ParameterKind::Path { required: true },
                },
                Parameter {
                    name: "output_dir",
                    label: "Output directory (empty saves through the backend)",
                    kind: ParameterKind::Path { required: false },
                },
                Parameter {
                    name: "overwrite",
                    label: "Overwrite existing files",
                    kind: ParameterKind::Checkbox { default: false },
                },
                Parameter {
                    name: "mode",
                    label: "Blend against the previous output or the previous input",
                    kind: ParameterKind::Choice {
                        options: ReferenceMode::NAMES,
                        default: ReferenceMode::PriorOutput.as_str(),
                    },
                },
            ],
        }
    }

    fn run(
        &self,
        ctx: &mut RunContext,
        generator: &mut dyn Generator,
        request: GenerationRequest,
        params: &Config,
    ) -> Result<Option<Generation>> {
        params.validate()?;
        request.validate()?;

        let result = Self::process_inputs(ctx, generator, request, params);
        ctx.finish();
        result
    }
}

impl BatchAlphaMix {
    fn process_inputs(
        ctx: &mut RunContext,
        generator: &mut dyn Generator,
        mut request: GenerationRequest,
        params: &Config,
    ) -> Result<Option<Generation>> {
        let seed = request.fix_seed();
        let output_dir = params.explicit_output_dir();
        request.do_not_save_grid = true;
        request.do_not_save_samples = output_dir.is_some();

        let inputs = image::list_images(&params.input_dir, params.sort_inputs)?;
        tracing::info!(
            "Found {} file(s) in {} (mode {}, alpha {}, seed {seed})",
            inputs.len(),
            params.input_dir.display(),
            params.mode.as_str(),
            params.alpha
        );

        let jobs_per_input = u64::from(request.n_iter);
        ctx.set_job_count(inputs.len() as u64 * jobs_per_input);

        let mut prior_output: Option<RgbImage> = None;
        let mut last = None;

        for (index, path) in inputs.iter().enumerate() {
            ctx.set_job(format!("{} out of {}", index + 1, inputs.len()));
            if ctx.skipped() {
                ctx.clear_skipped();
            }

            if ctx.interrupted() {
                tracing::info!("Interrupted after {index} of {} file(s)", inputs.len());
                break;
            }

            tracing::info!("Processing image: {}", path.display());
            let current = image::load_image(path)?;

            let reference = Self::reference_for(params.mode, &inputs, index, prior_output.take())?;
            let init = match reference {
                Some(reference) => {
                    tracing::debug!(
                        "Blending with {}x{} reference at alpha {}",
                        reference.width(),
                        reference.height(),
                        params.alpha
                    );
                    DynamicImage::ImageRgb8(image::alpha_blend(&current, &reference, params.alpha))
                }
                None => current,
            };

            request.init_images = vec![init; request.batch_size as usize];
            let generation = generator.generate(&request)?;
            ctx.advance(jobs_per_input);

            let first = generation.images.first().ok_or(Error::NoImages)?;
            if params.mode == ReferenceMode::PriorOutput {
                prior_output = Some(first.to_rgb8());
            }

            if let Some(dir) = output_dir {
                Self::save_results(&generation, path, dir, params.output_quality)?;
            }

            last = Some(generation);
        }

        Ok(last)
    }
}
