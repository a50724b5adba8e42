//! Site configuration module.
//!
//! Handles loading and validating `config.json` from the project root. Every
//! key is optional; a missing file means stock defaults.
//!
//! ## Configuration Options
//!
//! ```json
//! {
//!   "cvars": { "site_name": "Example", "year": 2012 },
//!   "template": "template.html",
//!   "site_dir": "site",
//!   "placeholder": "#content#",
//!   "missing_cvar": "error",
//!   "optimize": {
//!     "svg": ["inkscape", "--vacuum-defs", "-f", "{input}", "-l", "{output}"],
//!     "png": ["optipng", "-quiet", "-o7", "-zm9", "-out", "{output}", "{input}"]
//!   },
//!   "processing": { "max_processes": 4 }
//! }
//! ```
//!
//! - `cvars`: base variables for every page. Values must be scalars
//!   (string, number, bool, null) and names must be identifiers.
//! - `missing_cvar`: `error`, `keep` or `empty`, the treatment of an
//!   `@name@` placeholder whose cvar is unset.
//! - `optimize`: lowercase file extension → command line. `{input}` and
//!   `{output}` are replaced with the source and destination paths. Only used
//!   in release mode.
//! - `processing.max_processes`: worker threads (omit for one per core).
//!
//! Unknown keys are rejected to catch typos early.

use crate::cvars::{CvarStore, MissingCvar, is_valid_name};
use crate::page::{DEFAULT_PLACEHOLDER, PageOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::context::Mode;
use thiserror::Error;

/// Default config file name, relative to the project root.
pub const CONFIG_FILENAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Base cvars, copied into every page. Arrays and objects fail to parse.
    pub cvars: CvarStore,
    /// Shared page template, relative to the project root.
    pub template: String,
    /// Source tree, relative to the project root.
    pub site_dir: String,
    /// Token in the template replaced by the page content.
    pub placeholder: String,
    /// Treatment of `@name@` placeholders naming an unset cvar.
    pub missing_cvar: MissingCvar,
    /// External optimizers by file extension.
    pub optimize: BTreeMap<String, Vec<String>>,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            cvars: CvarStore::new(),
            template: "template.html".to_string(),
            site_dir: "site".to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            missing_cvar: MissingCvar::default(),
            optimize: default_optimizers(),
            processing: ProcessingConfig::default(),
        }
    }
}

fn default_optimizers() -> BTreeMap<String, Vec<String>> {
    let command = |args: &[&str]| args.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        (
            "svg".to_string(),
            command(&["inkscape", "--vacuum-defs", "-f", "{input}", "-l", "{output}"]),
        ),
        (
            "png".to_string(),
            command(&["optipng", "-quiet", "-o7", "-zm9", "-out", "{output}", "{input}"]),
        ),
    ])
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = self.cvars.names().find(|name| !is_valid_name(name)) {
            return Err(ConfigError::Validation(format!(
                "cvars.{name}: name must be an identifier ([A-Za-z_][A-Za-z0-9_]*)"
            )));
        }
        if self.placeholder.is_empty() {
            return Err(ConfigError::Validation(
                "placeholder must not be empty".into(),
            ));
        }
        if self.template.is_empty() || self.site_dir.is_empty() {
            return Err(ConfigError::Validation(
                "template and site_dir must not be empty".into(),
            ));
        }
        for (ext, command) in &self.optimize {
            if ext.is_empty() || ext.starts_with('.') || *ext != ext.to_lowercase() {
                return Err(ConfigError::Validation(format!(
                    "optimize.{ext}: extension must be lowercase without a leading dot"
                )));
            }
            if command.first().is_none_or(|program| program.is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "optimize.{ext}: command must not be empty"
                )));
            }
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Reject a site directory that contains an output directory, which
    /// would make every build copy the previous build into itself.
    ///
    /// Paths are compared after resolving symlinks and `..`; a site
    /// directory that does not exist yet is left for the build to report.
    pub fn check_site_dir(&self, root: &Path) -> Result<(), ConfigError> {
        let (Ok(site), Ok(root)) = (
            root.join(&self.site_dir).canonicalize(),
            root.canonicalize(),
        ) else {
            return Ok(());
        };
        for mode in [Mode::Release, Mode::Test] {
            let out = root.join(mode.dir_name());
            if out.starts_with(&site) {
                return Err(ConfigError::Validation(format!(
                    "site_dir {:?} contains the output directory {}/",
                    self.site_dir,
                    mode.dir_name()
                )));
            }
        }
        Ok(())
    }

    pub fn page_options(&self) -> PageOptions {
        PageOptions {
            placeholder: self.placeholder.clone(),
            missing_cvar: self.missing_cvar,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Load config from a `config.json` file.
///
/// A missing file yields the defaults. Unknown keys are rejected and the
/// result is validated.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    if !path.exists() {
        return Ok(SiteConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: SiteConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// The default configuration as pretty-printed JSON.
///
/// Used by the `--print-config` CLI flag.
pub fn stock_config_json() -> String {
    serde_json::to_string_pretty(&SiteConfig::default()).expect("default config must serialize")
}
