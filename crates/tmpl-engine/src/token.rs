// SPDX-License-Identifier: Apache-2.0 OR MIT

/// The kinds of token the byte-stream tokenizer can emit (spec §3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Synthesized once the underlying stream (and include stack) is exhausted.
    Eof,
    /// A run of plain text, verbatim.
    Text,
    /// `{{ if EXPR }}`
    If,
    /// `{{ else if EXPR }}`
    ElseIf,
    /// `{{ else }}`
    Else,
    /// `{{ end }}`
    End,
    /// `{{ for IDENT in EXPR }}`
    For,
    /// `{{ include "PATH" }}`
    Include,
    /// Any other tag payload, evaluated as an expression.
    Expression,
}

/// A single token produced by the tokenizer (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Which kind of token this is.
    pub kind: TokenKind,
    /// The trimmed tag payload for tag kinds, or the raw run for `Text`.
    /// Absent for `Eof`.
    pub text: Option<String>,
}

impl Token {
    /// Builds a token carrying text.
    pub fn with_text(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: Some(text.into()),
        }
    }

    /// Builds the synthetic end-of-file token.
    pub fn eof() -> Self {
        Self {
            kind: TokenKind::Eof,
            text: None,
        }
    }
}
