//! Pluggable batch scripts.
//!
//! A host shows a script when [`Script::applies`] accepts the current tab,
//! renders a form from [`Script::parameters`], and calls [`Script::run`]
//! with the values the user entered.

mod alpha_mix;

pub use alpha_mix::{BatchAlphaMix, Config, ReferenceMode};

use std::fmt;

use crate::context::RunContext;
use crate::error::Result;
use crate::pipeline::{Generation, GenerationRequest, Generator};

/// Which generation tab a script is offered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabMode {
    Txt2Img,
    Img2Img,
}

/// A unit of work a host can discover and run.
pub trait Script {
    /// Typed parameter values accepted by [`Script::run`].
    type Params;

    /// Display name.
    fn name(&self) -> &'static str;

    /// Whether the script should be offered on `mode`.
    fn applies(&self, mode: TabMode) -> bool;

    /// Form description for the script's parameters.
    fn parameters(&self) -> ParameterSchema;

    /// Run the script.
    ///
    /// `request` is the host's base generation request; the script fills in
    /// the per-call input images. Returns the last generation produced, or
    /// `None` if no generation ran.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by loading, generation, or saving.
    fn run(
        &self,
        ctx: &mut RunContext,
        generator: &mut dyn Generator,
        request: GenerationRequest,
        params: &Self::Params,
    ) -> Result<Option<Generation>>;
}

/// Ordered list of parameters a script takes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSchema {
    pub parameters: Vec<Parameter>,
}

impl ParameterSchema {
    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl fmt::Display for ParameterSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in &self.parameters {
            writeln!(f, "{:<12} {:<32} {}", param.name, param.kind.to_string(), param.label)?;
        }
        Ok(())
    }
}

/// One form field.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ParameterKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    Slider {
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    },
    Path {
        required: bool,
    },
    Checkbox {
        default: bool,
    },
    Choice {
        options: &'static [&'static str],
        default: &'static str,
    },
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slider {
                min,
                max,
                step,
                default,
            } => write!(f, "float {min}..={max} step {step} [{default}]"),
            Self::Path { required: true } => f.write_str("path (required)"),
            Self::Path { required: false } => f.write_str("path (optional)"),
            Self::Checkbox { default } => write!(f, "bool [{default}]"),
            Self::Choice { options, default } => {
                write!(f, "{} [{default}]", options.join("|"))
            }
        }
    }
}
