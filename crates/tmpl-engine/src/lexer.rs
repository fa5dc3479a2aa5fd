// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Stacks [`TokenStream`]s to resolve `include` tags, with cycle detection and
//! a one-token pushback slot (spec §4.2).

use std::collections::HashSet;

use crate::error::{Error, ErrorKind};
use crate::locator::Locator;
use crate::token::{Token, TokenKind};
use crate::tokenizer::TokenStream;

/// Parses an `include "%m[^\"]"`-style payload into the quoted path (spec §6).
fn parse_include_path(payload: &str) -> Result<String, Error> {
    let trimmed = payload.trim();
    let stripped = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| Error::syntax(format!("malformed include payload: {trimmed}")))?;
    Ok(stripped.to_string())
}

/// The lexer proper: a stack of token streams plus the active-include set
/// used to reject cyclic `include` graphs.
#[derive(Debug)]
pub struct Lexer<'a> {
    stack: Vec<TokenStream>,
    active_includes: HashSet<String>,
    pushback: Option<Token>,
    locator: &'a Locator,
}

impl<'a> Lexer<'a> {
    /// Builds a lexer whose root stream is `root`, resolving nested `include`s
    /// through `locator`.
    pub fn new(root_name: impl Into<String>, root: impl Into<Vec<u8>>, locator: &'a Locator) -> Self {
        Self {
            stack: vec![TokenStream::new(root_name, root)],
            active_includes: HashSet::new(),
            pushback: None,
            locator,
        }
    }

    /// Pushes `tok` back onto a single-slot buffer; MUST be the last token
    /// returned by [`Lexer::next`].
    pub fn unget(&mut self, tok: Token) {
        debug_assert!(self.pushback.is_none(), "pushback slot already occupied");
        self.pushback = Some(tok);
    }

    /// Returns the next logical token, transparently resolving `include`s and
    /// popping exhausted streams.
    pub fn next(&mut self) -> Result<Token, Error> {
        if let Some(tok) = self.pushback.take() {
            return Ok(tok);
        }

        loop {
            let Some(stream) = self.stack.last_mut() else {
                return Ok(Token::eof());
            };

            let tok = stream.next_token()?;

            match tok.kind {
                TokenKind::Eof => {
                    let popped = self.stack.pop().expect("stream present");
                    self.active_includes.remove(popped.name());
                    if self.stack.is_empty() {
                        return Ok(Token::eof());
                    }
                }
                TokenKind::Include => {
                    let payload = tok.text.unwrap_or_default();
                    let path = parse_include_path(&payload)?;
                    if self.active_includes.contains(&path) {
                        tracing::warn!(path, "circular include detected");
                        return Err(Error::new(
                            ErrorKind::CircularInclude,
                            format!("circular include detected: {path}"),
                        ));
                    }
                    let resolved = self.locator.locate(&path)?;
                    tracing::trace!(path, depth = self.stack.len(), "entering include");
                    self.active_includes.insert(path.clone());
                    self.stack.push(TokenStream::new(resolved.path, resolved.contents));
                }
                _ => return Ok(tok),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_an_include_into_the_token_stream() {
        let mut locator = Locator::new();
        locator.add_path_root("");
        locator.insert_file("inner.tmpl", "inner-text");
        let mut lexer = Lexer::new("root", "a{{ include \"inner.tmpl\" }}b", &locator);
        let mut texts = Vec::new();
        loop {
            let tok = lexer.next().unwrap();
            if tok.kind == TokenKind::Eof {
                break;
            }
            texts.push(tok.text.unwrap_or_default());
        }
        assert_eq!(texts, vec!["a", "inner-text", "b"]);
    }

    #[test]
    fn detects_direct_self_include_as_circular() {
        let mut locator = Locator::new();
        locator.add_path_root("");
        locator.insert_file("a.tmpl", "{{ include \"a.tmpl\" }}");
        let mut lexer = Lexer::new("a.tmpl", "{{ include \"a.tmpl\" }}", &locator);
        let err = lexer.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::CircularInclude);
    }

    #[test]
    fn unget_replays_the_same_token_once() {
        let locator = Locator::new();
        let mut lexer = Lexer::new("root", "{{ x }}", &locator);
        let tok = lexer.next().unwrap();
        lexer.unget(tok.clone());
        let replayed = lexer.next().unwrap();
        assert_eq!(tok, replayed);
    }

    #[test]
    fn missing_include_target_propagates_locator_error() {
        let locator = Locator::new();
        let mut lexer = Lexer::new("root", "{{ include \"missing.tmpl\" }}", &locator);
        let err = lexer.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TemplateNotFound);
    }
}
