//! Execution environment for embedded page code.
//!
//! The page generator only needs one capability from a scripting backend:
//! run a piece of code with access to the page's variables and return the
//! text it emitted. That is the [`Evaluator`] trait. [`ScriptEvaluator`] is
//! the built-in implementation, a small statement language:
//!
//! ```text
//! # comments run to end of line
//! cvars.title = "About"              # set a cvar (visible to @title@)
//! year = 2012                        # script variable, shared by later blocks
//! if cvars.draft {
//!     print("<p class=\"draft\">Draft</p>")
//! } else {
//!     print("<p>", escape(cvars.title), year + 1, "</p>")
//! }
//! ```
//!
//! | Form | Meaning |
//! |------|---------|
//! | `name = expr` | assign a script variable |
//! | `cvars.name = expr` | set a cvar; reading an unset cvar yields `null` |
//! | `print(a, b, ...)` | append arguments, space separated, to the block output |
//! | `if c { } else if c { } else { }` | conditionals |
//! | `+ - * / %`, `== != < <= > >=`, `and or not` | operators (`+` concatenates if either side is a string) |
//! | `str int float len upper lower trim replace escape default defined` | built-in functions |
//!
//! Faults are never swallowed: every error surfaces as a [`ScriptError`]
//! carrying the line inside the block.

mod ast;
mod error;
mod interp;
mod parser;
mod token;

pub use error::{ScriptError, ScriptErrorKind};
pub use interp::escape_html;

use crate::cvars::{CvarStore, Value};
use std::collections::BTreeMap;

/// Everything a code block may read and mutate during one page generation.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    /// The page's own copy of the cvars.
    pub cvars: CvarStore,
    /// Plain script variables. They persist across the code blocks of one
    /// page but are never visible to `@name@` substitution.
    pub globals: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new(cvars: CvarStore) -> Self {
        Self {
            cvars,
            globals: BTreeMap::new(),
        }
    }
}

/// A scripting backend.
///
/// `evaluate` runs `code` against `bindings` and returns everything the code
/// emitted. The output buffer is scoped to that single call.
pub trait Evaluator: Sync {
    fn evaluate(&self, code: &str, bindings: &mut Bindings) -> Result<String, ScriptError>;
}

/// The built-in script language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEvaluator;

impl Evaluator for ScriptEvaluator {
    fn evaluate(&self, code: &str, bindings: &mut Bindings) -> Result<String, ScriptError> {
        let stmts = parser::parse(code)?;
        interp::Interpreter::new(bindings).run(&stmts)
    }
}
