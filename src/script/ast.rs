//! Syntax tree for the page script language.

use crate::cvars::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { target: Target, value: Expr },
    Expr(Expr),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
}

/// Where an assignment writes to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Plain script variable, shared by the code blocks of one page.
    Global(String),
    /// `cvars.name`
    Cvar(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    /// Height of this subtree; a leaf is 1.
    pub height: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        let below = match &kind {
            ExprKind::Literal(_) | ExprKind::Global(_) | ExprKind::Cvar(_) => 0,
            ExprKind::Unary(_, operand) => operand.height,
            ExprKind::Binary(_, left, right)
            | ExprKind::And(left, right)
            | ExprKind::Or(left, right) => left.height.max(right.height),
            ExprKind::Call { args, .. } => args.iter().map(|a| a.height).max().unwrap_or(0),
        };
        Self {
            kind,
            line,
            height: below + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Global(String),
    Cvar(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}
