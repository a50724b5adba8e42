//! Tokenizer for the page script language.

use super::error::{ScriptError, ScriptErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    True,
    False,
    Null,
    If,
    Else,
    And,
    Or,
    Not,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Statement separator: a newline or `;`.
    Newline,
    Eof,
}

impl TokenKind {
    /// Short human-readable form used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{}`", name),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Int(_) | TokenKind::Float(_) => "number".to_string(),
            TokenKind::Newline => "end of statement".to_string(),
            TokenKind::Eof => "end of code".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Assign => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

/// Split `code` into tokens, ending with [`TokenKind::Eof`].
///
/// Newlines inside parentheses are dropped so call arguments can span lines.
pub fn tokenize(code: &str) -> Result<Vec<Token>, ScriptError> {
    Tokenizer::new(code).run()
}

struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    paren_depth: usize,
    tokens: Vec<Token>,
}

impl Tokenizer {
    fn new(code: &str) -> Self {
        Self {
            chars: code.chars().collect(),
            pos: 0,
            line: 1,
            paren_depth: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn error(&self, kind: ScriptErrorKind) -> ScriptError {
        ScriptError::new(self.line, kind)
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, ScriptError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    if self.paren_depth == 0 {
                        self.push(TokenKind::Newline);
                    }
                    self.line += 1;
                    self.pos += 1;
                }
                ';' => {
                    self.push(TokenKind::Newline);
                    self.pos += 1;
                }
                c if c.is_whitespace() => self.pos += 1,
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                '"' | '\'' => self.string(c)?,
                c if c.is_ascii_digit() => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.word(),
                _ => self.symbol(c)?,
            }
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    fn string(&mut self, quote: char) -> Result<(), ScriptError> {
        let start_line = self.line;
        self.pos += 1;
        let mut value = String::new();
        loop {
            let c = self
                .peek()
                .ok_or_else(|| ScriptError::new(start_line, ScriptErrorKind::UnterminatedString))?;
            self.pos += 1;
            match c {
                c if c == quote => break,
                '\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| ScriptError::new(start_line, ScriptErrorKind::UnterminatedString))?;
                    self.pos += 1;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        other => return Err(self.error(ScriptErrorKind::InvalidEscape(other))),
                    });
                }
                '\n' => {
                    self.line += 1;
                    value.push('\n');
                }
                other => value.push(other),
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::Str(value),
            line: start_line,
        });
        Ok(())
    }

    fn number(&mut self) -> Result<(), ScriptError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let is_float =
            self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = if is_float {
            text.parse().map(TokenKind::Float).ok()
        } else {
            text.parse().map(TokenKind::Int).ok()
        };
        match kind {
            Some(kind) => {
                self.push(kind);
                Ok(())
            }
            None => Err(self.error(ScriptErrorKind::InvalidNumber(text))),
        }
    }

    fn word(&mut self) {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let kind = match word.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Ident(word),
        };
        self.push(kind);
    }

    fn symbol(&mut self, c: char) -> Result<(), ScriptError> {
        let two = |next: char| self.peek_next() == Some(next);
        let (kind, len) = match c {
            '(' => (TokenKind::LParen, 1),
            ')' => (TokenKind::RParen, 1),
            '{' => (TokenKind::LBrace, 1),
            '}' => (TokenKind::RBrace, 1),
            ',' => (TokenKind::Comma, 1),
            '.' => (TokenKind::Dot, 1),
            '+' => (TokenKind::Plus, 1),
            '-' => (TokenKind::Minus, 1),
            '*' => (TokenKind::Star, 1),
            '/' => (TokenKind::Slash, 1),
            '%' => (TokenKind::Percent, 1),
            '=' if two('=') => (TokenKind::EqEq, 2),
            '=' => (TokenKind::Assign, 1),
            '!' if two('=') => (TokenKind::NotEq, 2),
            '!' => (TokenKind::Not, 1),
            '<' if two('=') => (TokenKind::Le, 2),
            '<' => (TokenKind::Lt, 1),
            '>' if two('=') => (TokenKind::Ge, 2),
            '>' => (TokenKind::Gt, 1),
            '&' if two('&') => (TokenKind::And, 2),
            '|' if two('|') => (TokenKind::Or, 2),
            other => return Err(self.error(ScriptErrorKind::UnexpectedChar(other))),
        };
        match kind {
            TokenKind::LParen => self.paren_depth += 1,
            TokenKind::RParen => self.paren_depth = self.paren_depth.saturating_sub(1),
            _ => {}
        }
        self.push(kind);
        self.pos += len;
        Ok(())
    }
}
