// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Recursive-descent parser over the lexer's token stream (spec §4.4).

use std::rc::Rc;

use crate::ast::Expr;
use crate::error::Error;
use crate::expr_parser::parse_expression;
use crate::lexer::Lexer;
use crate::node::{Condition, Node, Root};
use crate::token::TokenKind;

/// Parses an entire template body into a [`Root`].
pub fn parse_template(lexer: &mut Lexer) -> Result<Root, Error> {
    Ok(Root {
        children: parse_nodes(lexer, false)?,
    })
}

/// Parses a run of nodes. `in_block` distinguishes the Root acceptor
/// (`false`: Eof ends the run, ElseIf/Else/End are syntax errors) from the
/// Condition/Iter acceptor (`true`: ElseIf/Else/End are ungotten and end the
/// run, Eof is a syntax error) per spec §4.4.
fn parse_nodes(lexer: &mut Lexer, in_block: bool) -> Result<Vec<Node>, Error> {
    let mut nodes = Vec::new();
    loop {
        let tok = lexer.next()?;
        match tok.kind {
            TokenKind::Eof => {
                if in_block {
                    return Err(Error::syntax("unexpected end of input inside block"));
                }
                break;
            }
            TokenKind::Text => nodes.push(Node::Text(tok.text.unwrap_or_default())),
            TokenKind::Expression => {
                let ast = parse_expression(&tok.text.unwrap_or_default())?;
                nodes.push(Node::Expr(ast));
            }
            TokenKind::If => {
                let header = tok.text.unwrap_or_default();
                nodes.push(parse_branch(lexer, &header)?);
            }
            TokenKind::For => {
                let header = tok.text.unwrap_or_default();
                nodes.push(parse_iter(lexer, &header)?);
            }
            TokenKind::ElseIf | TokenKind::Else | TokenKind::End => {
                if in_block {
                    lexer.unget(tok);
                    break;
                }
                return Err(Error::syntax(format!(
                    "unexpected {:?} with no matching if/for",
                    tok.kind
                )));
            }
            TokenKind::Include => {
                return Err(Error::syntax("include token reached the parser"));
            }
        }
    }
    Ok(nodes)
}

fn parse_branch(lexer: &mut Lexer, if_header: &str) -> Result<Node, Error> {
    let if_ast = parse_expression(if_header)?;
    let if_children = parse_nodes(lexer, true)?;
    let if_branch = Condition {
        ast: if_ast,
        children: if_children,
    };

    let mut else_chain = Vec::new();
    loop {
        let tok = lexer.next()?;
        match tok.kind {
            TokenKind::End => break,
            TokenKind::ElseIf => {
                let ast = parse_expression(&tok.text.unwrap_or_default())?;
                let children = parse_nodes(lexer, true)?;
                else_chain.push(Condition { ast, children });
            }
            TokenKind::Else => {
                let children = parse_nodes(lexer, true)?;
                else_chain.push(Condition {
                    ast: Expr::Bool(true),
                    children,
                });
            }
            other => {
                return Err(Error::syntax(format!(
                    "expected else/else if/end, found {other:?}"
                )));
            }
        }
    }

    Ok(Node::Branch {
        if_branch,
        else_chain,
    })
}

fn parse_iter(lexer: &mut Lexer, header: &str) -> Result<Node, Error> {
    let (ident, expr_text) = split_iter_header(header)?;
    let ast = parse_expression(&expr_text)?;
    let children = parse_nodes(lexer, true)?;
    let tok = lexer.next()?;
    if tok.kind != TokenKind::End {
        return Err(Error::syntax(format!(
            "expected end of for loop, found {:?}",
            tok.kind
        )));
    }
    Ok(Node::Iter {
        ident: Rc::from(ident.as_str()),
        ast,
        children,
    })
}

fn split_iter_header(header: &str) -> Result<(String, String), Error> {
    let trimmed = header.trim();
    let idx = trimmed
        .find(" in ")
        .ok_or_else(|| Error::syntax(format!("malformed for header: {header}")))?;
    let ident = trimmed[..idx].trim().to_string();
    let expr = trimmed[idx + 4..].trim().to_string();
    if ident.is_empty() || expr.is_empty() {
        return Err(Error::syntax(format!("malformed for header: {header}")));
    }
    Ok((ident, expr))
}
