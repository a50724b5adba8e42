//! Build driver: mirror the site directory into the output directory.
//!
//! Every file under the site directory is handled by exactly one action:
//!
//! | File | Action |
//! |------|--------|
//! | name ends with `~` | skipped (editor backup) |
//! | `.html`, `.htm` | page generation against the template |
//! | extension with a configured optimizer, release mode | external optimizer |
//! | anything else | byte-for-byte copy |
//!
//! Outputs are only rewritten when stale: the output is missing, or the
//! source or the template was modified at or after the output. `--force`
//! rewrites everything.
//!
//! ## Page cvars
//!
//! On top of the config cvars every page gets:
//!
//! | Cvar | Release | Test |
//! |------|---------|------|
//! | `page_root` | `/` | `../` once per directory level (`""` at the top) |
//! | `data_root` | `/data/` | `page_root` + `data/` |
//! | `content_mtime` | source mtime, seconds since the epoch | same |
//! | `page_path` | output path relative to the output dir, `/` separated | same |
//!
//! ## Parallel Processing
//!
//! Files are independent and processed on a [rayon](https://docs.rs/rayon)
//! pool sized by `processing.max_processes`. Progress is reported as
//! [`BuildEvent`]s over an optional channel; the first error aborts the run.

use crate::block::parse_blocks;
use crate::config::{ConfigError, effective_threads};
use crate::context::{BuildContext, Mode};
use crate::cvars::{CvarStore, Value};
use crate::optimize::Optimizer;
use crate::page::{PageError, PageOptions, generate_page};
use crate::script::Evaluator;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{path}: {source}")]
    Page {
        path: String,
        #[source]
        source: PageError,
    },
    #[error("Walking site directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl BuildError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        BuildError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What happens to a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    Skip,
    Page,
    /// Run the optimizer registered for this extension.
    Optimize(String),
    Copy,
}

/// Progress events emitted during a build.
///
/// Paths are relative to the output directory with `/` separators.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Generated { path: String },
    Optimized { path: String },
    Copied { path: String },
    UpToDate { path: String },
    Skipped { path: String },
    Warning { path: String, warning: BuildWarning },
}

/// Non-fatal problems. The build carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildWarning {
    /// The optimizer failed; the file was copied unoptimized.
    OptimizeFailed(String),
    /// The template has no placeholder; the page content was dropped.
    PlaceholderMissing(String),
    /// A `<?` without a matching `?>`; the code runs to the end of the file.
    UnterminatedCode,
}

/// Counts per action for a finished build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub generated: usize,
    pub optimized: usize,
    pub copied: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub warnings: usize,
    pub elapsed: Duration,
}

impl BuildSummary {
    fn record(&mut self, event: &BuildEvent) {
        match event {
            BuildEvent::Generated { .. } => self.generated += 1,
            BuildEvent::Optimized { .. } => self.optimized += 1,
            BuildEvent::Copied { .. } => self.copied += 1,
            BuildEvent::UpToDate { .. } => self.up_to_date += 1,
            BuildEvent::Skipped { .. } => self.skipped += 1,
            BuildEvent::Warning { .. } => self.warnings += 1,
        }
    }

    /// Number of outputs written by this run.
    pub fn written(&self) -> usize {
        self.generated + self.optimized + self.copied
    }
}

/// Build the whole site described by `ctx`.
pub fn build_site(
    ctx: &BuildContext,
    evaluator: &impl Evaluator,
    optimizer: &impl Optimizer,
    progress: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, BuildError> {
    let emit = |event: &BuildEvent| {
        if let Some(tx) = &progress {
            tx.send(event.clone()).ok();
        }
    };
    let mut summary = BuildSummary::default();

    if ctx.template.unterminated {
        let event = BuildEvent::Warning {
            path: ctx.template_path.display().to_string(),
            warning: BuildWarning::UnterminatedCode,
        };
        emit(&event);
        summary.record(&event);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&ctx.site_dir)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(effective_threads(&ctx.config.processing))
        .build()?;
    let options = ctx.config.page_options();

    let per_file: Vec<Vec<BuildEvent>> = pool.install(|| {
        files
            .par_iter()
            .map(|source| {
                let events = process_file(ctx, source, evaluator, optimizer, &options)?;
                for event in &events {
                    emit(event);
                }
                Ok(events)
            })
            .collect::<Result<_, BuildError>>()
    })?;

    for event in per_file.iter().flatten() {
        summary.record(event);
    }
    summary.elapsed = ctx.start.elapsed();
    Ok(summary)
}

fn process_file(
    ctx: &BuildContext,
    source: &Path,
    evaluator: &impl Evaluator,
    optimizer: &impl Optimizer,
    options: &PageOptions,
) -> Result<Vec<BuildEvent>, BuildError> {
    let rel = source.strip_prefix(&ctx.site_dir).unwrap_or(source);
    let path = display_path(rel);

    let action = classify(rel, ctx.mode, optimizer);
    if action == FileAction::Skip {
        return Ok(vec![BuildEvent::Skipped { path }]);
    }

    let output = ctx.out_dir.join(rel);
    let source_mtime = modified(source)?;
    if !ctx.force
        && !needs_update(source_mtime, ctx.template_mtime, &output)
            .map_err(|e| BuildError::io(&output, e))?
    {
        return Ok(vec![BuildEvent::UpToDate { path }]);
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }

    match action {
        FileAction::Page => {
            let text = fs::read_to_string(source).map_err(|e| BuildError::io(source, e))?;
            let content = parse_blocks(&text);
            let cvars = page_cvars(&ctx.base_cvars, rel, ctx.mode, source_mtime);
            let page = generate_page(
                &ctx.template.blocks,
                &content.blocks,
                &cvars,
                evaluator,
                options,
            )
            .map_err(|source| BuildError::Page {
                path: path.clone(),
                source,
            })?;
            fs::write(&output, &page.html).map_err(|e| BuildError::io(&output, e))?;

            let mut events = Vec::new();
            if content.unterminated {
                events.push(BuildEvent::Warning {
                    path: path.clone(),
                    warning: BuildWarning::UnterminatedCode,
                });
            }
            if !page.content_merged {
                events.push(BuildEvent::Warning {
                    path: path.clone(),
                    warning: BuildWarning::PlaceholderMissing(options.placeholder.clone()),
                });
            }
            events.push(BuildEvent::Generated { path });
            Ok(events)
        }
        FileAction::Optimize(ext) => match optimizer.optimize(&ext, source, &output) {
            Ok(()) => Ok(vec![BuildEvent::Optimized { path }]),
            Err(e) => {
                copy_file(source, &output)?;
                Ok(vec![
                    BuildEvent::Warning {
                        path: path.clone(),
                        warning: BuildWarning::OptimizeFailed(e.to_string()),
                    },
                    BuildEvent::Copied { path },
                ])
            }
        },
        FileAction::Copy => {
            copy_file(source, &output)?;
            Ok(vec![BuildEvent::Copied { path }])
        }
        FileAction::Skip => Ok(vec![BuildEvent::Skipped { path }]),
    }
}

/// Decide what to do with a file, by name alone.
pub fn classify(rel: &Path, mode: Mode, optimizer: &impl Optimizer) -> FileAction {
    let name = rel.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if name.ends_with('~') {
        return FileAction::Skip;
    }
    let ext = rel
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => FileAction::Page,
        _ if mode == Mode::Release && optimizer.handles(&ext) => FileAction::Optimize(ext),
        _ => FileAction::Copy,
    }
}

/// Whether `output` must be rewritten.
///
/// Up to date only when the output exists and is strictly newer than both
/// the source and the template.
pub fn needs_update(
    source_mtime: SystemTime,
    template_mtime: SystemTime,
    output: &Path,
) -> io::Result<bool> {
    let output_mtime = match fs::metadata(output) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    Ok(source_mtime.max(template_mtime) >= output_mtime)
}

/// The cvars for one page: the base cvars plus the path and mtime cvars.
pub fn page_cvars(base: &CvarStore, rel: &Path, mode: Mode, content_mtime: SystemTime) -> CvarStore {
    let mut cvars = base.clone();
    let (page_root, data_root) = page_roots(rel, mode);
    let mtime = content_mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    cvars.set("content_mtime", Value::Float(mtime));
    cvars.set("page_root", page_root);
    cvars.set("data_root", data_root);
    cvars.set("page_path", display_path(rel));
    cvars
}

/// `(page_root, data_root)` for a page at `rel`.
pub fn page_roots(rel: &Path, mode: Mode) -> (String, String) {
    match mode {
        Mode::Release => ("/".to_string(), "/data/".to_string()),
        Mode::Test => {
            let levels = rel.components().count().saturating_sub(1);
            let up = "../".repeat(levels);
            let data = format!("{up}data/");
            (up, data)
        }
    }
}

fn display_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn modified(path: &Path) -> Result<SystemTime, BuildError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| BuildError::io(path, e))
}

fn copy_file(source: &Path, output: &Path) -> Result<(), BuildError> {
    fs::copy(source, output)
        .map(|_| ())
        .map_err(|e| BuildError::io(source, e))
}
