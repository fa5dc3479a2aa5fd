// SPDX-License-Identifier: Apache-2.0 OR MIT
//! UTF-8-aware tokenizer over a single input byte stream (spec §4.1).
//!
//! Delimiters and escapes are all single-byte ASCII, so a byte-level cursor
//! never splits a multi-byte UTF-8 sequence: continuation bytes (0x80-0xBF)
//! can't equal any of `\`, `{`, `}`, `"`.

use crate::error::{Error, ErrorKind};
use crate::token::{Token, TokenKind};

/// Reads tokens on demand from an in-memory byte buffer.
///
/// The "single suspension point at each byte read" from spec §5 is modeled
/// here as a plain cursor step; an implementation embedding this in a truly
/// async source would await at the same point this advances `pos`.
#[derive(Debug)]
pub struct TokenStream {
    name: String,
    bytes: Vec<u8>,
    pos: usize,
    swallow_newline: bool,
    last_was_text_with_newline: bool,
}

impl TokenStream {
    /// Builds a stream over the full contents of `source`, tagged with `name`
    /// for diagnostics (typically the resolved include path).
    pub fn new(name: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: source.into(),
            pos: 0,
            swallow_newline: false,
            last_was_text_with_newline: false,
        }
    }

    /// The name this stream was built with.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn emit_text(&mut self, text: String) -> Token {
        self.last_was_text_with_newline = text.ends_with('\n');
        Token::with_text(TokenKind::Text, text)
    }

    fn emit_tag(&mut self, payload: &str) -> Token {
        self.swallow_newline = self.last_was_text_with_newline;
        classify_tag(payload)
    }

    /// Produces the next token, or [`TokenKind::Eof`] once the buffer is exhausted.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        if self.swallow_newline {
            self.swallow_newline = false;
            if self.peek() == Some(b'\n') {
                self.pos += 1;
            }
        }

        let Some(first) = self.peek() else {
            return Ok(Token::eof());
        };

        match first {
            b'\\' => {
                self.pos += 1;
                match self.bump() {
                    Some(b'{') => Ok(self.emit_text("{".to_string())),
                    Some(other) => {
                        let mut text = String::from('\\');
                        text.push(other as char);
                        Ok(self.emit_text(text))
                    }
                    None => Ok(self.emit_text("\\".to_string())),
                }
            }
            b'{' if self.peek_at(1) == Some(b'{') => {
                self.pos += 2;
                let payload = self.read_tag_body()?;
                Ok(self.emit_tag(payload.trim()))
            }
            b'{' => {
                self.pos += 1;
                match self.bump() {
                    Some(other) => {
                        let mut text = String::from('{');
                        text.push(other as char);
                        Ok(self.emit_text(text))
                    }
                    None => Ok(self.emit_text("{".to_string())),
                }
            }
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if b == b'\\' || b == b'{' {
                        break;
                    }
                    self.pos += 1;
                }
                let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                Ok(self.emit_text(text))
            }
        }
    }

    /// Reads the raw tag body up to (but not including) the first `}}` that
    /// is not inside a double-quoted string.
    fn read_tag_body(&mut self) -> Result<String, Error> {
        let start = self.pos;
        let mut in_string = false;
        loop {
            match self.peek() {
                None => {
                    return Err(Error::new(
                        ErrorKind::LexerFailure,
                        "unterminated tag: missing closing `}}`",
                    ));
                }
                Some(b'"') if !in_string => {
                    in_string = true;
                    self.pos += 1;
                }
                Some(b'"') if in_string => {
                    in_string = false;
                    self.pos += 1;
                }
                Some(b'\\') if in_string => {
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.pos += 1;
                    }
                }
                Some(b'}') if !in_string && self.peek_at(1) == Some(b'}') => {
                    let body = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                    self.pos += 2;
                    return Ok(body);
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}

fn classify_tag(payload: &str) -> Token {
    if let Some(rest) = payload.strip_prefix("if ") {
        Token::with_text(TokenKind::If, rest.trim())
    } else if let Some(rest) = payload.strip_prefix("else if ") {
        Token::with_text(TokenKind::ElseIf, rest.trim())
    } else if payload == "else" || payload.starts_with("else ") {
        Token::with_text(TokenKind::Else, payload.trim_start_matches("else").trim())
    } else if payload == "end" {
        Token::with_text(TokenKind::End, "")
    } else if let Some(rest) = payload.strip_prefix("for ") {
        Token::with_text(TokenKind::For, rest.trim())
    } else if let Some(rest) = payload.strip_prefix("include ") {
        Token::with_text(TokenKind::Include, rest.trim())
    } else {
        Token::with_text(TokenKind::Expression, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut stream = TokenStream::new("test", src.as_bytes().to_vec());
        let mut out = Vec::new();
        loop {
            let tok = stream.next_token().unwrap();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn plain_text_round_trips() {
        let toks = tokens("hello world");
        assert_eq!(toks[0].kind, TokenKind::Text);
        assert_eq!(toks[0].text.as_deref(), Some("hello world"));
    }

    #[test]
    fn escaped_brace_yields_single_char_text() {
        let toks = tokens(r"a\{b");
        assert_eq!(toks[0].text.as_deref(), Some("a"));
        assert_eq!(toks[1].text.as_deref(), Some("{"));
        assert_eq!(toks[2].text.as_deref(), Some("b"));
    }

    #[test]
    fn classifies_tag_forms() {
        let toks = tokens("{{ if x }}{{ else if y }}{{ else }}{{ end }}{{ for a in b }}{{ include \"p\" }}{{ z }}");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::If,
                TokenKind::ElseIf,
                TokenKind::Else,
                TokenKind::End,
                TokenKind::For,
                TokenKind::Include,
                TokenKind::Expression,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn closing_brace_inside_string_does_not_terminate_tag() {
        let toks = tokens(r#"{{ "a}}b" }}"#);
        assert_eq!(toks[0].kind, TokenKind::Expression);
        assert_eq!(toks[0].text.as_deref(), Some("\"a}}b\""));
    }

    #[test]
    fn newline_after_tag_following_newline_terminated_text_is_suppressed() {
        let toks = tokens("line\n{{ x }}\nrest");
        assert_eq!(toks[0].text.as_deref(), Some("line\n"));
        assert_eq!(toks[1].kind, TokenKind::Expression);
        assert_eq!(toks[2].text.as_deref(), Some("rest"));
    }

    #[test]
    fn tag_at_eof_with_no_trailing_newline_suppresses_nothing() {
        let toks = tokens("line\n{{ x }}");
        assert_eq!(toks[2].kind, TokenKind::Eof);
    }

    #[test]
    fn trailing_backslash_at_eof_is_one_char_text() {
        let toks = tokens("a\\");
        assert_eq!(toks[0].text.as_deref(), Some("a"));
        assert_eq!(toks[1].text.as_deref(), Some("\\"));
    }

    #[test]
    fn trailing_brace_at_eof_is_one_char_text() {
        let toks = tokens("a{");
        assert_eq!(toks[0].text.as_deref(), Some("a"));
        assert_eq!(toks[1].text.as_deref(), Some("{"));
    }

    #[test]
    fn unterminated_tag_is_lexer_failure() {
        let mut stream = TokenStream::new("test", "{{ if x".as_bytes().to_vec());
        let err = stream.next_token().unwrap_err();
        assert_eq!(err.kind, ErrorKind::LexerFailure);
    }
}
