//! Recursive-descent parser for the page script language.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / %`, unary `-`, primary.
//!
//! Nesting is bounded. The parser's own recursion (parentheses, call
//! arguments, unary chains, `if` bodies) stays within [`MAX_NESTING`] and
//! every expression tree within [`MAX_HEIGHT`], so neither parsing nor
//! evaluation can exhaust a worker's stack.

use super::ast::{BinaryOp, Expr, ExprKind, Stmt, Target, UnaryOp};
use super::error::{ScriptError, ScriptErrorKind};
use super::token::{Token, TokenKind, tokenize};
use crate::cvars::Value;

/// Name through which scripts reach the cvar store.
pub const CVARS: &str = "cvars";

/// Deepest nesting of parentheses, calls, unary operators and `if` bodies.
pub const MAX_NESTING: usize = 64;

/// Tallest expression tree, counting operator chains such as `a + b + c`.
pub const MAX_HEIGHT: usize = 256;

/// Parse a whole code block into statements.
pub fn parse(code: &str) -> Result<Vec<Stmt>, ScriptError> {
    let tokens = tokenize(code)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let stmts = parser.statements()?;
    parser.expect(&TokenKind::Eof, "end of code")?;
    Ok(stmts)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Current recursion depth of the nesting productions.
    depth: usize,
}

type PResult<T> = Result<T, ScriptError>;

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expected(&self, what: &str) -> ScriptError {
        ScriptError::new(
            self.line(),
            ScriptErrorKind::Expected {
                expected: what.to_string(),
                found: self.peek().describe(),
            },
        )
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.expected(what))
        }
    }

    /// Run a nesting production one level deeper.
    fn nested<T>(&mut self, production: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(ScriptError::new(
                self.line(),
                ScriptErrorKind::TooDeep(MAX_NESTING),
            ));
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    /// Reject expression trees too tall to evaluate.
    fn checked(&self, expr: Expr) -> PResult<Expr> {
        if expr.height > MAX_HEIGHT {
            return Err(ScriptError::new(
                expr.line,
                ScriptErrorKind::TooDeep(MAX_HEIGHT),
            ));
        }
        Ok(expr)
    }

    fn skip_separators(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    /// Statements up to (not including) `}` or end of code.
    fn statements(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if matches!(self.peek(), TokenKind::RBrace | TokenKind::Eof) {
                return Ok(stmts);
            }
            stmts.push(self.statement()?);
            if !matches!(
                self.peek(),
                TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof
            ) {
                return Err(self.expected("end of statement"));
            }
        }
    }

    fn statement(&mut self) -> PResult<Stmt> {
        if self.check(&TokenKind::If) {
            return self.if_statement();
        }

        let expr = self.expression()?;
        if !self.check(&TokenKind::Assign) {
            return Ok(Stmt::Expr(expr));
        }

        let target = match expr.kind {
            ExprKind::Global(name) => Target::Global(name),
            ExprKind::Cvar(name) => Target::Cvar(name),
            _ => return Err(self.expected("variable or `cvars.name` before `=`")),
        };
        self.advance();
        let value = self.expression()?;
        Ok(Stmt::Assign { target, value })
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        let mut branches = Vec::new();
        let mut otherwise = None;

        self.expect(&TokenKind::If, "`if`")?;
        let cond = self.expression()?;
        branches.push((cond, self.block()?));

        while self.else_follows() {
            self.skip_separators();
            self.advance();
            if self.eat(&TokenKind::If) {
                let cond = self.expression()?;
                branches.push((cond, self.block()?));
            } else {
                otherwise = Some(self.block()?);
                break;
            }
        }

        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    /// Whether the next non-separator token is `else`. Does not consume.
    fn else_follows(&self) -> bool {
        self.tokens[self.pos..]
            .iter()
            .find(|t| t.kind != TokenKind::Newline)
            .is_some_and(|t| t.kind == TokenKind::Else)
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        let stmts = self.nested(Self::statements)?;
        self.expect(&TokenKind::RBrace, "`}`")?;
        Ok(stmts)
    }

    fn expression(&mut self) -> PResult<Expr> {
        self.nested(Self::or)
    }

    fn or(&mut self) -> PResult<Expr> {
        let mut left = self.and()?;
        while self.check(&TokenKind::Or) {
            let line = self.advance().line;
            let right = self.and()?;
            left = self.checked(Expr::new(
                ExprKind::Or(Box::new(left), Box::new(right)),
                line,
            ))?;
        }
        Ok(left)
    }

    fn and(&mut self) -> PResult<Expr> {
        let mut left = self.not()?;
        while self.check(&TokenKind::And) {
            let line = self.advance().line;
            let right = self.not()?;
            left = self.checked(Expr::new(
                ExprKind::And(Box::new(left), Box::new(right)),
                line,
            ))?;
        }
        Ok(left)
    }

    fn not(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Not) {
            let line = self.advance().line;
            let operand = self.nested(Self::not)?;
            return self.checked(Expr::new(
                ExprKind::Unary(UnaryOp::Not, Box::new(operand)),
                line,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            let line = self.advance().line;
            let right = self.additive()?;
            left = self.checked(binary(op, left, right, line))?;
        }
    }

    fn additive(&mut self) -> PResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            let line = self.advance().line;
            let right = self.multiplicative()?;
            left = self.checked(binary(op, left, right, line))?;
        }
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            let line = self.advance().line;
            let right = self.unary()?;
            left = self.checked(binary(op, left, right, line))?;
        }
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Minus) {
            let line = self.advance().line;
            let operand = self.nested(Self::unary)?;
            return self.checked(Expr::new(
                ExprKind::Unary(UnaryOp::Neg, Box::new(operand)),
                line,
            ));
        }
        self.primary()
    }

    fn primary(&mut self) -> PResult<Expr> {
        let line = self.line();
        let kind = match self.peek().clone() {
            TokenKind::Str(s) => {
                self.advance();
                ExprKind::Literal(Value::Str(s))
            }
            TokenKind::Int(i) => {
                self.advance();
                ExprKind::Literal(Value::Int(i))
            }
            TokenKind::Float(x) => {
                self.advance();
                ExprKind::Literal(Value::Float(x))
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(Value::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(Value::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Literal(Value::Null)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(inner);
            }
            TokenKind::Ident(name) => {
                self.advance();
                self.after_identifier(name)?
            }
            _ => return Err(self.expected("expression")),
        };
        self.checked(Expr::new(kind, line))
    }

    fn after_identifier(&mut self, name: String) -> PResult<ExprKind> {
        if name == CVARS {
            self.expect(&TokenKind::Dot, "`.` after `cvars`")?;
            return match self.advance().kind {
                TokenKind::Ident(field) => Ok(ExprKind::Cvar(field)),
                other => Err(ScriptError::new(
                    self.line(),
                    ScriptErrorKind::Expected {
                        expected: "cvar name".to_string(),
                        found: other.describe(),
                    },
                )),
            };
        }

        if !self.eat(&TokenKind::LParen) {
            return Ok(ExprKind::Global(name));
        }

        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) || self.check(&TokenKind::RParen) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "`,` or `)`")?;
        Ok(ExprKind::Call { name, args })
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, line: usize) -> Expr {
    Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(code: &str) -> Stmt {
        let mut stmts = parse(code).unwrap();
        assert_eq!(stmts.len(), 1, "expected one statement in {code:?}");
        stmts.remove(0)
    }

    #[test]
    fn cvar_assignment() {
        match single("cvars.title = \"X\"") {
            Stmt::Assign { target, value, .. } => {
                assert_eq!(target, Target::Cvar("title".into()));
                assert_eq!(value.kind, ExprKind::Literal(Value::from("X")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_assignment() {
        assert!(matches!(
            single("n = 1 + 2"),
            Stmt::Assign { target: Target::Global(ref n), .. } if n == "n"
        ));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let Stmt::Expr(expr) = single("1 + 2 * 3") else {
            panic!("expected expression statement");
        };
        let ExprKind::Binary(BinaryOp::Add, _, right) = expr.kind else {
            panic!("expected addition at the root");
        };
        assert!(matches!(right.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn call_with_trailing_comma() {
        let Stmt::Expr(expr) = single("print(1, 2,)") else {
            panic!("expected expression statement");
        };
        assert!(matches!(expr.kind, ExprKind::Call { ref args, .. } if args.len() == 2));
    }

    #[test]
    fn if_else_chain_across_lines() {
        let code = "if a {\n  print(1)\n}\nelse if b {\n  print(2)\n} else {\n  print(3)\n}";
        match single(code) {
            Stmt::If {
                branches,
                otherwise,
            } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(otherwise.map(|b| b.len()), Some(1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn statements_split_on_semicolons() {
        assert_eq!(parse("a = 1; b = 2;; print(a)").unwrap().len(), 3);
    }

    #[test]
    fn empty_code_has_no_statements() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n  # only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn assignment_to_call_is_rejected() {
        let err = parse("f() = 1").unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::Expected { .. }));
    }

    #[test]
    fn two_expressions_on_one_line_is_rejected() {
        let err = parse("a b").unwrap_err();
        assert_eq!(
            err.kind,
            ScriptErrorKind::Expected {
                expected: "end of statement".into(),
                found: "identifier `b`".into(),
            }
        );
    }

    #[test]
    fn missing_brace_reports_line() {
        let err = parse("if x {\n  print(1)\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn bare_cvars_is_rejected() {
        assert!(parse("x = cvars").is_err());
    }

    #[test]
    fn nesting_within_limit_parses() {
        let code = format!("x = {}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&code).is_ok());
    }

    #[test]
    fn deep_parentheses_are_rejected() {
        let code = format!("x = {}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert_eq!(parse(&code).unwrap_err().kind, ScriptErrorKind::TooDeep(MAX_NESTING));
    }

    #[test]
    fn deep_unary_chain_is_rejected() {
        let code = format!("x = {}1", "not ".repeat(MAX_NESTING + 1));
        assert_eq!(parse(&code).unwrap_err().kind, ScriptErrorKind::TooDeep(MAX_NESTING));
        let code = format!("x = {}1", "- ".repeat(MAX_NESTING + 1));
        assert_eq!(parse(&code).unwrap_err().kind, ScriptErrorKind::TooDeep(MAX_NESTING));
    }

    #[test]
    fn deep_if_bodies_are_rejected() {
        let code = format!("{}{}", "if true { ".repeat(MAX_NESTING + 1), "}".repeat(MAX_NESTING + 1));
        assert_eq!(parse(&code).unwrap_err().kind, ScriptErrorKind::TooDeep(MAX_NESTING));
    }

    #[test]
    fn long_operator_chain_is_bounded() {
        let ok = format!("x = {}1", "1 + ".repeat(200));
        let Stmt::Assign { value, .. } = single(&ok) else {
            panic!("expected assignment");
        };
        assert_eq!(value.height, 201);

        let too_long = format!("x = {}1", "1 + ".repeat(MAX_HEIGHT));
        assert_eq!(parse(&too_long).unwrap_err().kind, ScriptErrorKind::TooDeep(MAX_HEIGHT));
    }
}
