// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Tokenizes the text carried by an `if`/`for`/`{{ EXPR }}` tag payload into
//! the tokens consumed by [`crate::expr_parser`] (spec §4.5 "Expression parser").

use std::str::Chars;

use crate::error::{Error, ErrorKind};

/// An expression-language token.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprToken {
    /// The token's kind.
    pub kind: ExprTokenKind,
}

/// Expression-language token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprTokenKind {
    /// `[A-Za-z_][A-Za-z0-9_]*`, excluding reserved words.
    Identifier(String),
    /// A double-quoted string literal, already unescaped.
    StringLiteral(String),
    /// A decimal literal (int or float), kept as text for later `f64` parsing.
    NumberLiteral(String),
    /// `true` / `false`.
    BoolLiteral(bool),
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `=`
    Assign,
    /// `+ - * /`
    ArithOp(char),
    /// `== != < <= > >=`
    CompareOp(&'static str),
    /// `&& / and`
    And,
    /// `|| / or`
    Or,
    /// `!`
    Bang,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `require`
    Require,
}

/// Lexes an entire expression-tag payload into tokens.
pub fn lex_expression(input: &str) -> Result<Vec<ExprToken>, Error> {
    let mut lexer = Lexer {
        chars: input.chars(),
        peeked: None,
    };
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    chars: Chars<'a>,
    peeked: Option<char>,
}

impl<'a> Lexer<'a> {
    fn bump(&mut self) -> Option<char> {
        self.peeked.take().or_else(|| self.chars.next())
    }

    fn peek(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<ExprToken>, Error> {
        self.skip_whitespace();
        let Some(c) = self.bump() else {
            return Ok(None);
        };

        let kind = match c {
            '.' => ExprTokenKind::Dot,
            ',' => ExprTokenKind::Comma,
            ';' => ExprTokenKind::Semicolon,
            '(' => ExprTokenKind::LeftParen,
            ')' => ExprTokenKind::RightParen,
            '{' => ExprTokenKind::LeftBrace,
            '}' => ExprTokenKind::RightBrace,
            '+' | '-' | '*' | '/' => ExprTokenKind::ArithOp(c),
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    ExprTokenKind::CompareOp("==")
                } else {
                    ExprTokenKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    ExprTokenKind::CompareOp("!=")
                } else {
                    ExprTokenKind::Bang
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    ExprTokenKind::CompareOp("<=")
                } else {
                    ExprTokenKind::CompareOp("<")
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    ExprTokenKind::CompareOp(">=")
                } else {
                    ExprTokenKind::CompareOp(">")
                }
            }
            '&' if self.peek() == Some('&') => {
                self.bump();
                ExprTokenKind::And
            }
            '|' if self.peek() == Some('|') => {
                self.bump();
                ExprTokenKind::Or
            }
            '"' => ExprTokenKind::StringLiteral(self.read_string()?),
            c if c.is_ascii_digit() => ExprTokenKind::NumberLiteral(self.read_number(c)),
            c if is_ident_start(c) => {
                let ident = self.read_identifier(c);
                match ident.as_str() {
                    "true" => ExprTokenKind::BoolLiteral(true),
                    "false" => ExprTokenKind::BoolLiteral(false),
                    "and" => ExprTokenKind::And,
                    "or" => ExprTokenKind::Or,
                    "if" => ExprTokenKind::If,
                    "else" => ExprTokenKind::Else,
                    "while" => ExprTokenKind::While,
                    "require" => ExprTokenKind::Require,
                    _ => ExprTokenKind::Identifier(ident),
                }
            }
            other => {
                return Err(Error::syntax(format!("unexpected character '{other}'")));
            }
        };

        Ok(Some(ExprToken { kind }))
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut out = String::new();
        out.push(first);
        while let Some(c) = self.peek() {
            if is_ident_part(c) {
                out.push(self.bump().unwrap());
            } else {
                break;
            }
        }
        out
    }

    fn read_number(&mut self, first: char) -> String {
        let mut out = String::new();
        out.push(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                out.push(self.bump().unwrap());
            } else {
                break;
            }
        }
        out
    }

    fn read_string(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some(other) => out.push(other),
                    None => return Err(Error::new(ErrorKind::SyntaxError, "unterminated escape")),
                },
                Some(c) => out.push(c),
                None => {
                    return Err(Error::new(
                        ErrorKind::SyntaxError,
                        "unterminated string literal",
                    ))
                }
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}
