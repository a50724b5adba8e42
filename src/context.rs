//! Per-run build state.
//!
//! A [`BuildContext`] is created once per invocation and shared read-only by
//! every worker: the start instant, the mode, the resolved paths, the loaded
//! config with its base cvars, and the template parsed into blocks.

use crate::block::{Lexed, parse_blocks};
use crate::build::BuildError;
use crate::config::{SiteConfig, load_config};
use crate::cvars::CvarStore;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

/// Build mode. Decides the output directory, the path cvars and whether
/// optimizers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Absolute links, optimized assets. Output goes to `release/`.
    Release,
    /// Relative links for browsing from disk. Output goes to `test/`.
    Test,
}

impl Mode {
    /// Name of the output directory under the project root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Mode::Release => "release",
            Mode::Test => "test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug)]
pub struct BuildContext {
    pub start: Instant,
    pub mode: Mode,
    /// Regenerate every output regardless of modification times.
    pub force: bool,
    pub root: PathBuf,
    pub site_dir: PathBuf,
    pub out_dir: PathBuf,
    pub template_path: PathBuf,
    pub config: SiteConfig,
    pub base_cvars: CvarStore,
    pub template: Lexed,
    pub template_mtime: SystemTime,
}

impl BuildContext {
    /// Load the config and template for the project at `root`.
    ///
    /// `config_path` is resolved against `root` when relative.
    pub fn load(
        root: &Path,
        config_path: &Path,
        mode: Mode,
        force: bool,
    ) -> Result<Self, BuildError> {
        let start = Instant::now();
        let config = load_config(&root.join(config_path))?;
        Self::from_config(root, config, mode, force, start)
    }

    /// Build a context from an already loaded config.
    pub fn from_config(
        root: &Path,
        config: SiteConfig,
        mode: Mode,
        force: bool,
        start: Instant,
    ) -> Result<Self, BuildError> {
        config.validate()?;
        config.check_site_dir(root)?;
        let template_path = root.join(&config.template);
        let source = std::fs::read_to_string(&template_path)
            .map_err(|e| BuildError::io(&template_path, e))?;
        let template_mtime = std::fs::metadata(&template_path)
            .and_then(|m| m.modified())
            .map_err(|e| BuildError::io(&template_path, e))?;

        Ok(Self {
            start,
            mode,
            force,
            root: root.to_path_buf(),
            site_dir: root.join(&config.site_dir),
            out_dir: root.join(mode.dir_name()),
            template_path,
            base_cvars: config.cvars.clone(),
            template: parse_blocks(&source),
            template_mtime,
            config,
        })
    }
}
