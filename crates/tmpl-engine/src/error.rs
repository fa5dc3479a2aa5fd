// SPDX-License-Identifier: Apache-2.0 OR MIT
use thiserror::Error as ThisError;

/// Byte offsets into the original template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Builds a span from a `[start, end)` byte range.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Stable wire names for every failure mode the engine can surface (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An operation was attempted while the owning object was in the wrong state
    /// (e.g. parsing a `Template` twice).
    InvalidState,
    /// The locator could not resolve an `include` path against any search root.
    TemplateNotFound,
    /// An `include` graph contains a cycle.
    CircularInclude,
    /// A tag payload or expression failed to parse.
    SyntaxError,
    /// The byte-stream tokenizer failed to read the underlying stream.
    LexerFailure,
    /// An operator or builtin was applied to a value of the wrong type.
    TypeMismatch,
    /// An internal dispatch table lookup found no entry and no fallback applied.
    InvalidOpCode,
    /// Division by zero.
    DivideByZero,
    /// A symbol reference found no binding in the scope chain.
    MissingSymbol,
    /// A symbol was declared a second time where redefinition is disallowed.
    SymbolRedefined,
    /// Property/method access was attempted on a non-object value.
    NotAnObject,
    /// Property/method access was attempted on a null object handle.
    NullPointer,
    /// The named property does not exist on the object's type surface.
    NoSuchProperty,
    /// Loading an external namespace (`require`) failed.
    ExternalNamespaceFailure,
    /// A failure with no more specific kind.
    RuntimeError,
    /// The requested capability exists but is not implemented.
    NotImplemented,
    /// A symbol carries a function, not a value, where a value was required.
    NotAValue,
    /// A symbol carries a value, not a function, where a function was required.
    NotAFunction,
}

impl ErrorKind {
    /// The stable wire name used in error messages and, eventually, serialized payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::TemplateNotFound => "TemplateNotFound",
            ErrorKind::CircularInclude => "CircularInclude",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::LexerFailure => "LexerFailure",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::InvalidOpCode => "InvalidOpCode",
            ErrorKind::DivideByZero => "DivideByZero",
            ErrorKind::MissingSymbol => "MissingSymbol",
            ErrorKind::SymbolRedefined => "SymbolRedefined",
            ErrorKind::NotAnObject => "NotAnObject",
            ErrorKind::NullPointer => "NullPointer",
            ErrorKind::NoSuchProperty => "NoSuchProperty",
            ErrorKind::ExternalNamespaceFailure => "ExternalNamespaceFailure",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::NotImplemented => "NotImplemented",
            ErrorKind::NotAValue => "NotAValue",
            ErrorKind::NotAFunction => "NotAFunction",
        }
    }
}

/// The engine's unified error type.
#[derive(Debug, ThisError)]
#[error("{kind:?}: {message}")]
pub struct Error {
    /// Which of the stable wire kinds this error represents.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// Byte span in the originating source, when known.
    pub span: Option<Span>,
}

impl Error {
    /// Builds an error of the given kind with a plain message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    /// Builds an error of the given kind, attaching a source span.
    pub fn with_span(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span: Some(span),
        }
    }

    /// Shorthand for [`ErrorKind::SyntaxError`], carrying the offending text per spec §7.
    pub fn syntax(offending: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, offending)
    }

    /// Shorthand for a type-mismatch error naming the left (and optional right) type.
    pub fn type_mismatch(op: &str, left: &'static str, right: Option<&'static str>) -> Self {
        let message = match right {
            Some(right) => format!("operator {op} not defined for {left} and {right}"),
            None => format!("operator {op} not defined for {left}"),
        };
        Self::new(ErrorKind::TypeMismatch, message)
    }
}
