//! # Sitepress
//!
//! A small static site generator. One shared HTML template, a directory of
//! content pages, and code embedded in both between `<?` and `?>`:
//!
//! ```html
//! <? cvars.title = "About" ?>
//! <h1>@title@</h1>
//! <p><? print("Built with", cvars.site_name) ?></p>
//! ```
//!
//! Each content page is wrapped in the template at its `#content#`
//! placeholder. Code runs before any `@name@` substitution, content before
//! template, so a page can set variables the template reads.
//!
//! # Architecture
//!
//! ```text
//! site/ ──walk──▶ classify ──┬─ .html ─▶ lex ─▶ generate page ─▶ release|test/
//!                            ├─ .svg/.png (release) ─▶ optimizer ─┘
//!                            └─ other ─▶ copy ───────────────────┘
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`block`] | Splits source into text and code blocks |
//! | [`indent`] | Removes the base indentation of a code block |
//! | [`cvars`] | Cvar values, the per-page store, `@name@` substitution |
//! | [`script`] | The [`Evaluator`](script::Evaluator) seam and the built-in script language |
//! | [`page`] | Four-pass page generation and the `#content#` merge |
//! | [`config`] | `config.json` loading and validation |
//! | [`context`] | Per-run state shared by all workers |
//! | [`optimize`] | External optimizer commands for release assets |
//! | [`build`] | Walks the site, checks staleness, dispatches files in parallel |
//! | [`output`] | CLI output formatting for build progress and summary |
//!
//! # Design Decisions
//!
//! ## Sandboxed Scripts
//!
//! Embedded code runs in a small purpose-built language, not a general
//! interpreter. It can set cvars, branch, do arithmetic and string work, and
//! print. It cannot touch the filesystem or the network, and every fault
//! names the page, the block and the line.
//!
//! ## Pages Never See Each Other
//!
//! Every page starts from a fresh copy of the config cvars. Pages are
//! independent, which is what lets the build run them in parallel.
//!
//! ## Modification Times, Not Manifests
//!
//! Staleness is decided from file modification times alone: an output is
//! rebuilt when its source or the template is at least as new as it. There
//! is no cache file to get out of sync.

pub mod block;
pub mod build;
pub mod config;
pub mod context;
pub mod cvars;
pub mod indent;
pub mod optimize;
pub mod output;
pub mod page;
pub mod script;

#[cfg(test)]
pub(crate) mod test_helpers;
