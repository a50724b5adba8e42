//! Page generation: template + content → final HTML.
//!
//! A page is produced from two block sequences, the shared template and one
//! content file, in four passes whose order matters:
//!
//! 1. content code blocks, in order
//! 2. template code blocks, in order, against the same bindings
//! 3. content text blocks, `@name@` substituted with the cvars as left by
//!    both code passes
//! 4. template text blocks, substituted the same way
//!
//! So a content block setting `cvars.title` is seen by template code and by
//! every `@title@` in the page, wherever it appears. Each pass fills a result
//! slot per block; the slots are joined per sequence and the content text
//! replaces the first occurrence of the placeholder token (`#content#` by
//! default) in the template text.
//!
//! The cvars passed in are cloned, never mutated: pages cannot observe each
//! other's changes.

use crate::block::Block;
use crate::cvars::{CvarStore, MissingCvar, SubstituteError, substitute};
use crate::indent::strip_base_indent;
use crate::script::{Bindings, Evaluator, ScriptError};
use std::fmt;
use thiserror::Error;

/// Token in the template that receives the rendered content.
pub const DEFAULT_PLACEHOLDER: &str = "#content#";

#[derive(Error, Debug)]
pub enum PageError {
    #[error("{pass} code block {block}: {source}")]
    Script {
        pass: Pass,
        block: usize,
        #[source]
        source: ScriptError,
    },
    #[error("{pass} text block {block}: {source}")]
    Substitute {
        pass: Pass,
        block: usize,
        #[source]
        source: SubstituteError,
    },
}

/// Which block sequence a fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Content,
    Template,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Content => f.write_str("content"),
            Pass::Template => f.write_str("template"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub placeholder: String,
    pub missing_cvar: MissingCvar,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            missing_cvar: MissingCvar::default(),
        }
    }
}

/// A generated page.
#[derive(Debug, Clone)]
pub struct Page {
    pub html: String,
    /// False when the template had no placeholder and the content was dropped.
    pub content_merged: bool,
    /// The page's cvars after both code passes.
    pub cvars: CvarStore,
}

/// Generate one page. See the [module docs](self) for the pass order.
pub fn generate_page(
    template: &[Block],
    content: &[Block],
    cvars: &CvarStore,
    evaluator: &impl Evaluator,
    options: &PageOptions,
) -> Result<Page, PageError> {
    let mut bindings = Bindings::new(cvars.clone());
    let mut content_out = vec![String::new(); content.len()];
    let mut template_out = vec![String::new(); template.len()];

    run_code_blocks(Pass::Content, content, &mut content_out, evaluator, &mut bindings)?;
    run_code_blocks(Pass::Template, template, &mut template_out, evaluator, &mut bindings)?;
    render_text_blocks(Pass::Content, content, &mut content_out, &bindings.cvars, options)?;
    render_text_blocks(Pass::Template, template, &mut template_out, &bindings.cvars, options)?;

    let (html, content_merged) = merge(
        &template_out.concat(),
        &content_out.concat(),
        &options.placeholder,
    );

    Ok(Page {
        html,
        content_merged,
        cvars: bindings.cvars,
    })
}

fn run_code_blocks(
    pass: Pass,
    blocks: &[Block],
    results: &mut [String],
    evaluator: &impl Evaluator,
    bindings: &mut Bindings,
) -> Result<(), PageError> {
    for (i, block) in blocks.iter().enumerate().filter(|(_, b)| b.is_code()) {
        let code = strip_base_indent(&block.content);
        results[i] = evaluator
            .evaluate(&code, bindings)
            .map_err(|source| PageError::Script {
                pass,
                block: i,
                source,
            })?;
    }
    Ok(())
}

fn render_text_blocks(
    pass: Pass,
    blocks: &[Block],
    results: &mut [String],
    cvars: &CvarStore,
    options: &PageOptions,
) -> Result<(), PageError> {
    for (i, block) in blocks.iter().enumerate().filter(|(_, b)| !b.is_code()) {
        results[i] = substitute(&block.content, cvars, options.missing_cvar).map_err(|source| {
            PageError::Substitute {
                pass,
                block: i,
                source,
            }
        })?;
    }
    Ok(())
}

/// Replace the first `placeholder` in `template` with `content`.
///
/// Returns the template unchanged and `false` when the placeholder is absent.
pub fn merge(template: &str, content: &str, placeholder: &str) -> (String, bool) {
    match template.find(placeholder) {
        Some(at) if !placeholder.is_empty() => {
            let mut out = String::with_capacity(template.len() + content.len());
            out.push_str(&template[..at]);
            out.push_str(content);
            out.push_str(&template[at + placeholder.len()..]);
            (out, true)
        }
        _ => (template.to_string(), false),
    }
}
