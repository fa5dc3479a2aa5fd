// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Recursive-descent expression parser (spec §4.5 "Expression parser").
//!
//! Accepts: parenthesized expressions; binary operators `+ - * / == != < <=
//! > >= && || and or`; unary `- !`; member access `a.b`; method calls
//! `a.b(args)`; assignment `a = expr` / `a.b = expr`; number/string/boolean/
//! identifier literals; `require "name" "version"`; function-call syntax for
//! user functions; and, per the original GNOME `tmpl` grammar this spec was
//! distilled from, C-like block/`if`/`while` expression forms (`{ a; b }`,
//! `if (cond) { .. } else { .. }`, `while (cond) { .. }`) — see DESIGN.md for
//! the grounding of this addition.

use std::rc::Rc;

use crate::ast::{ArithOp, CompareOp, Expr, LogicalOp};
use crate::error::Error;
use crate::expr_lexer::{lex_expression, ExprToken, ExprTokenKind};

const BUILTIN_NAMES: &[&str] = &["abs", "ceil", "floor", "hex", "log", "print", "repr", "sqrt"];

/// Parses a full expression-tag payload into an [`Expr`].
pub fn parse_expression(input: &str) -> Result<Expr, Error> {
    let tokens = lex_expression(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_assignment()?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::syntax(format!(
            "trailing input after expression: {input}"
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&ExprTokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn bump(&mut self) -> Option<ExprTokenKind> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok.map(|t| t.kind)
    }

    fn expect(&mut self, kind: &ExprTokenKind) -> Result<(), Error> {
        match self.bump() {
            Some(k) if &k == kind => Ok(()),
            other => Err(Error::syntax(format!("expected {kind:?}, found {other:?}"))),
        }
    }

    fn parse_assignment(&mut self) -> Result<Expr, Error> {
        let lhs = self.parse_logical_or()?;
        if matches!(self.peek(), Some(ExprTokenKind::Assign)) {
            self.bump();
            let rhs = self.parse_assignment()?;
            return build_assignment(lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_logical_and()?;
        while matches!(self.peek(), Some(ExprTokenKind::Or)) {
            self.bump();
            let rhs = self.parse_logical_and()?;
            lhs = Expr::Logical(LogicalOp::Or, Rc::new(lhs), Rc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), Some(ExprTokenKind::And)) {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::Logical(LogicalOp::And, Rc::new(lhs), Rc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(ExprTokenKind::CompareOp("==")) => CompareOp::Eq,
                Some(ExprTokenKind::CompareOp("!=")) => CompareOp::Ne,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Compare(op, Rc::new(lhs), Rc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(ExprTokenKind::CompareOp("<")) => CompareOp::Lt,
                Some(ExprTokenKind::CompareOp("<=")) => CompareOp::Le,
                Some(ExprTokenKind::CompareOp(">")) => CompareOp::Gt,
                Some(ExprTokenKind::CompareOp(">=")) => CompareOp::Ge,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::Compare(op, Rc::new(lhs), Rc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(ExprTokenKind::ArithOp('+')) => ArithOp::Add,
                Some(ExprTokenKind::ArithOp('-')) => ArithOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Arith(op, Rc::new(lhs), Rc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(ExprTokenKind::ArithOp('*')) => ArithOp::Mul,
                Some(ExprTokenKind::ArithOp('/')) => ArithOp::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Arith(op, Rc::new(lhs), Rc::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        match self.peek() {
            Some(ExprTokenKind::ArithOp('-')) => {
                self.bump();
                let operand = self.parse_unary()?;
                Ok(Expr::UnaryMinus(Rc::new(operand)))
            }
            Some(ExprTokenKind::Bang) => {
                self.bump();
                let operand = self.parse_unary()?;
                Ok(Expr::InvertBoolean(Rc::new(operand)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(ExprTokenKind::Dot) => {
                    self.bump();
                    let name = self.expect_identifier()?;
                    if matches!(self.peek(), Some(ExprTokenKind::LeftParen)) {
                        let args = self.parse_call_args()?;
                        expr = Expr::MethodCall {
                            receiver: Rc::new(expr),
                            method: Rc::from(name.as_str()),
                            args,
                        };
                    } else {
                        expr = Expr::Getattr {
                            receiver: Rc::new(expr),
                            name: Rc::from(name.as_str()),
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, Error> {
        self.expect(&ExprTokenKind::LeftParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(ExprTokenKind::RightParen)) {
            loop {
                args.push(self.parse_assignment()?);
                if matches!(self.peek(), Some(ExprTokenKind::Comma)) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(&ExprTokenKind::RightParen)?;
        Ok(args)
    }

    fn expect_identifier(&mut self) -> Result<String, Error> {
        match self.bump() {
            Some(ExprTokenKind::Identifier(name)) => Ok(name),
            other => Err(Error::syntax(format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        match self.bump() {
            Some(ExprTokenKind::NumberLiteral(text)) => {
                let n: f64 = text
                    .parse()
                    .map_err(|_| Error::syntax(format!("invalid number literal {text}")))?;
                Ok(Expr::Number(n))
            }
            Some(ExprTokenKind::StringLiteral(s)) => Ok(Expr::Str(Rc::from(s.as_str()))),
            Some(ExprTokenKind::BoolLiteral(b)) => Ok(Expr::Bool(b)),
            Some(ExprTokenKind::LeftParen) => {
                let inner = self.parse_assignment()?;
                self.expect(&ExprTokenKind::RightParen)?;
                Ok(inner)
            }
            Some(ExprTokenKind::LeftBrace) => self.parse_block(),
            Some(ExprTokenKind::If) => self.parse_if(),
            Some(ExprTokenKind::While) => self.parse_while(),
            Some(ExprTokenKind::Require) => self.parse_require(),
            Some(ExprTokenKind::Identifier(name)) => {
                if matches!(self.peek(), Some(ExprTokenKind::LeftParen)) {
                    let args = self.parse_call_args()?;
                    if BUILTIN_NAMES.contains(&name.as_str()) {
                        if args.len() != 1 {
                            return Err(Error::syntax(format!(
                                "builtin {name} expects exactly one argument, got {}",
                                args.len()
                            )));
                        }
                        let mut args = args;
                        Ok(Expr::BuiltinCall {
                            name: Rc::from(name.as_str()),
                            arg: Rc::new(args.remove(0)),
                        })
                    } else {
                        Ok(Expr::UserFnCall {
                            name: Rc::from(name.as_str()),
                            args,
                        })
                    }
                } else {
                    Ok(Expr::SymbolRef(Rc::from(name.as_str())))
                }
            }
            other => Err(Error::syntax(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_block(&mut self) -> Result<Expr, Error> {
        let mut stmts = Vec::new();
        if matches!(self.peek(), Some(ExprTokenKind::RightBrace)) {
            self.bump();
            return Ok(Expr::Bool(false));
        }
        loop {
            stmts.push(self.parse_assignment()?);
            match self.peek() {
                Some(ExprTokenKind::Semicolon) => {
                    self.bump();
                    if matches!(self.peek(), Some(ExprTokenKind::RightBrace)) {
                        break;
                    }
                }
                _ => break,
            }
        }
        self.expect(&ExprTokenKind::RightBrace)?;
        Ok(Expr::stmt_list_from(stmts))
    }

    fn parse_if(&mut self) -> Result<Expr, Error> {
        self.expect(&ExprTokenKind::LeftParen)?;
        let cond = self.parse_assignment()?;
        self.expect(&ExprTokenKind::RightParen)?;
        self.expect(&ExprTokenKind::LeftBrace)?;
        let then_branch = self.parse_block()?;
        let else_branch = if matches!(self.peek(), Some(ExprTokenKind::Else)) {
            self.bump();
            if matches!(self.peek(), Some(ExprTokenKind::If)) {
                self.bump();
                Some(self.parse_if()?)
            } else {
                self.expect(&ExprTokenKind::LeftBrace)?;
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Expr::If {
            cond: Rc::new(cond),
            then_branch: Rc::new(then_branch),
            else_branch: else_branch.map(Rc::new),
        })
    }

    fn parse_while(&mut self) -> Result<Expr, Error> {
        self.expect(&ExprTokenKind::LeftParen)?;
        let cond = self.parse_assignment()?;
        self.expect(&ExprTokenKind::RightParen)?;
        self.expect(&ExprTokenKind::LeftBrace)?;
        let body = self.parse_block()?;
        Ok(Expr::While {
            cond: Rc::new(cond),
            body: Rc::new(body),
        })
    }

    fn parse_require(&mut self) -> Result<Expr, Error> {
        let name = match self.bump() {
            Some(ExprTokenKind::StringLiteral(s)) => s,
            other => return Err(Error::syntax(format!("expected namespace string, found {other:?}"))),
        };
        let version = match self.bump() {
            Some(ExprTokenKind::StringLiteral(s)) => s,
            other => return Err(Error::syntax(format!("expected version string, found {other:?}"))),
        };
        Ok(Expr::Require {
            name: Rc::from(name.as_str()),
            version: Rc::from(version.as_str()),
        })
    }
}

fn build_assignment(lhs: Expr, rhs: Expr) -> Result<Expr, Error> {
    match lhs {
        Expr::SymbolRef(name) => Ok(Expr::SymbolAssign(name, Rc::new(rhs))),
        Expr::Getattr { receiver, name } => Ok(Expr::Setattr {
            receiver,
            name,
            value: Rc::new(rhs),
        }),
        _ => Err(Error::syntax("invalid assignment target")),
    }
}
