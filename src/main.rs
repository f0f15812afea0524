//! alphamix CLI - batch img2img with alpha-mix feedback.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alphamix::{
    BatchAlphaMix, Config, GenerationRequest, ReferenceMode, RunContext, Script, WebUiConfig,
    WebUiGenerator,
};

/// Run img2img over every file in a directory, blending each input with the
/// previous output or the previous input.
#[derive(Parser, Debug)]
#[command(name = "alphamix")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory of input images.
    #[arg(value_name = "INPUT_DIR", required_unless_present = "describe")]
    input_dir: Option<PathBuf>,

    /// Directory for results. Omit to let the backend save them.
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Blend weight of the reference (0.0-1.0). 0 is raw input.
    #[arg(short, long, default_value = "0.0", value_name = "FLOAT")]
    alpha: f32,

    /// What to blend each input with.
    #[arg(
        short,
        long,
        default_value = "prior-output",
        value_parser = PossibleValuesParser::new(ReferenceMode::NAMES.iter().copied())
            .try_map(|mode| mode.parse::<ReferenceMode>())
    )]
    mode: ReferenceMode,

    /// Overwrite existing files.
    #[arg(long)]
    overwrite: bool,

    /// Process inputs in path order instead of directory-listing order.
    #[arg(long)]
    sort: bool,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Backend server URL.
    #[arg(long, default_value = "http://127.0.0.1:7860", value_name = "URL")]
    url: String,

    /// Basic-auth credentials for the backend, as USER:PASSWORD.
    #[arg(long, value_name = "USER:PASSWORD")]
    auth: Option<String>,

    /// Backend request timeout in seconds.
    #[arg(long, default_value = "600", value_name = "SECS")]
    timeout: u64,

    /// Prompt text.
    #[arg(short, long, default_value = "")]
    prompt: String,

    /// Negative prompt text.
    #[arg(long, default_value = "")]
    negative_prompt: String,

    /// Number of sampling steps.
    #[arg(long, default_value = "20", value_name = "INT")]
    steps: u32,

    /// Classifier-free guidance scale.
    #[arg(long, default_value = "7.0", value_name = "FLOAT")]
    cfg_scale: f32,

    /// Denoising strength (0.0-1.0).
    #[arg(short, long, default_value = "0.75", value_name = "FLOAT")]
    denoising_strength: f32,

    /// Sampler name understood by the backend.
    #[arg(long, value_name = "NAME")]
    sampler: Option<String>,

    /// Seed shared by every input. Random if omitted.
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,

    /// Images generated per iteration.
    #[arg(long, default_value = "1", value_name = "INT")]
    batch_size: u32,

    /// Iterations per input.
    #[arg(long, default_value = "1", value_name = "INT")]
    n_iter: u32,

    /// Output width. Defaults to the input's width.
    #[arg(long, value_name = "INT")]
    width: Option<u32>,

    /// Output height. Defaults to the input's height.
    #[arg(long, value_name = "INT")]
    height: Option<u32>,

    /// Print the script's parameters and exit.
    #[arg(long)]
    describe: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("alphamix={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: Args) -> Result<()> {
    let script = BatchAlphaMix;

    if args.describe {
        print!("{}\n\n{}", script.name(), script.parameters());
        return Ok(());
    }

    let input_dir = args.input_dir.context("Input directory is required")?;
    if !input_dir.is_dir() {
        anyhow::bail!("Input directory does not exist: {}", input_dir.display());
    }

    let config = Config {
        alpha: args.alpha,
        input_dir,
        output_dir: args.output_dir,
        overwrite: args.overwrite,
        mode: args.mode,
        sort_inputs: args.sort,
        output_quality: args.quality,
    };

    if let Some(dir) = config.explicit_output_dir() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let credentials = args
        .auth
        .as_deref()
        .map(|auth| {
            auth.split_once(':')
                .map(|(user, password)| (user.to_string(), password.to_string()))
                .context("--auth must be USER:PASSWORD")
        })
        .transpose()?;

    let mut generator = WebUiGenerator::new(WebUiConfig {
        base_url: args.url,
        timeout: Duration::from_secs(args.timeout),
        credentials,
    })
    .context("Failed to initialize backend client")?;

    let request = GenerationRequest {
        prompt: args.prompt,
        negative_prompt: args.negative_prompt,
        steps: args.steps,
        cfg_scale: args.cfg_scale,
        denoising_strength: args.denoising_strength,
        sampler_name: args.sampler,
        seed: args.seed,
        batch_size: args.batch_size,
        n_iter: args.n_iter,
        width: args.width,
        height: args.height,
        ..GenerationRequest::default()
    };

    let mut ctx = RunContext::with_progress_bar();
    let last = script
        .run(&mut ctx, &mut generator, request, &config)
        .context("Batch run failed")?;

    match last {
        Some(generation) => println!(
            "Processed {} job(s) from {}, last seed {}",
            ctx.jobs_done(),
            config.input_dir.display(),
            generation
                .seed
                .map_or_else(|| "unknown".to_string(), |seed| seed.to_string())
        ),
        None => println!("No images processed in {}", config.input_dir.display()),
    }

    Ok(())
}
