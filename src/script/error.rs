use thiserror::Error;

/// A script fault, located by its 1-based line inside the (indent-stripped)
/// code block.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {kind}")]
pub struct ScriptError {
    pub line: usize,
    pub kind: ScriptErrorKind,
}

impl ScriptError {
    pub fn new(line: usize, kind: ScriptErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence \\{0}")]
    InvalidEscape(char),
    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),
    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{name}` takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },
    #[error("cannot apply `{op}` to {left} and {right}")]
    BinaryType {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("type error: {0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("code nested too deeply (limit {0})")]
    TooDeep(usize),
}
