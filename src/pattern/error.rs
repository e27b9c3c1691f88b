//! Structured errors from the parse phase.
//!
//! Evaluation has no error surface of its own — predicates fall back to
//! "no match" on missing data — so everything here is produced while
//! compiling a pattern string.

use serde::Serialize;

/// What went wrong while compiling a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// A `"`-quoted string ran off the end of the input.
    UnterminatedString,
    /// An opening parenthesis without its closing partner.
    UnmatchedParen,
    /// An expression (or sub-expression) with no content.
    EmptyExpression,
    /// Input left over after a full parse was requested.
    TrailingGarbage,
    /// A `?name` that is not in the matcher table.
    UnknownMatcher,
    UnknownDepType,
    UnknownAction,
    UnknownPriority,
    /// `provides` combined with the `broken` flag in a short-form dep.
    BrokenProvides,
    /// `all-versions` / `any-version` outside a wide context.
    NotWideContext,
    /// A variable reference with no enclosing binder of that name.
    UnknownVariable,
    /// Two bound-variable prefixes on one function-style matcher.
    DuplicateBinding,
    /// The argument of a string predicate failed regex compilation.
    BadRegex,
    /// Anything else: misplaced characters, missing separators.
    BadSyntax,
}

/// A compile error: kind, human-readable message, and the byte offset in
/// the pattern source at which it was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("{message} (at offset {position})")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub position: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(kind: ErrorKind, position: usize, message: impl Into<String>) -> CompileError {
        CompileError {
            kind,
            position,
            message: message.into(),
        }
    }
}
