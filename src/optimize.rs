//! External asset optimizers.
//!
//! The [`Optimizer`] trait is the seam between the build driver and the
//! outside tools (inkscape for SVG, optipng for PNG by default). The
//! production implementation, [`CommandOptimizer`], runs the command line
//! configured for a file's extension with `{input}` and `{output}` filled in.
//!
//! A failing optimizer is not fatal: the driver reports it and copies the
//! file verbatim instead.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("no optimizer configured for .{0}")]
    NotConfigured(String),
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    Status {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Trait for optimizer backends.
pub trait Optimizer: Sync {
    /// Whether files with this (lowercase) extension are optimized.
    fn handles(&self, ext: &str) -> bool;

    /// Write an optimized copy of `input` to `output`.
    fn optimize(&self, ext: &str, input: &Path, output: &Path) -> Result<(), OptimizeError>;
}

/// Runs external commands, one command line per extension.
#[derive(Debug, Clone, Default)]
pub struct CommandOptimizer {
    commands: BTreeMap<String, Vec<String>>,
}

impl CommandOptimizer {
    pub fn new(commands: BTreeMap<String, Vec<String>>) -> Self {
        Self { commands }
    }
}

impl Optimizer for CommandOptimizer {
    fn handles(&self, ext: &str) -> bool {
        self.commands.contains_key(ext)
    }

    fn optimize(&self, ext: &str, input: &Path, output: &Path) -> Result<(), OptimizeError> {
        let template = self
            .commands
            .get(ext)
            .ok_or_else(|| OptimizeError::NotConfigured(ext.to_string()))?;
        let argv = expand_command(template, input, output);
        let Some((program, args)) = argv.split_first() else {
            return Err(OptimizeError::NotConfigured(ext.to_string()));
        };

        let result = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| OptimizeError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(OptimizeError::Status {
                program: program.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Fill `{input}` and `{output}` into a command line.
pub fn expand_command(template: &[String], input: &Path, output: &Path) -> Vec<String> {
    let input = input.to_string_lossy();
    let output = output.to_string_lossy();
    template
        .iter()
        .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
        .collect()
}
