//! Character-level scanning for the pattern grammar.
//!
//! The grammar is not token-based: what ends a bare string depends on the
//! caller (externally supplied terminator strings, and whether whitespace
//! breaks in the current position), so the parser works directly on a
//! byte-position cursor.

use crate::pattern::error::{CompileError, ErrorKind};

#[derive(Clone)]
pub(crate) struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor { input, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// The source text between two byte positions.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    pub fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Look one character past the current one.
    pub fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Whether the remaining input starts with any of the terminators.
    pub fn at_terminator(&self, terminators: &[&str]) -> bool {
        terminators
            .iter()
            .any(|t| self.input[self.pos..].starts_with(t))
    }

    /// Skip whitespace, then require the character `c`.
    pub fn expect(&mut self, c: char) -> Result<(), CompileError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(CompileError::new(
                ErrorKind::BadSyntax,
                self.pos,
                format!("Match pattern ends unexpectedly (expected '{c}')"),
            )),
            Some(got) if got != c => Err(CompileError::new(
                ErrorKind::BadSyntax,
                self.pos,
                format!("Expected '{c}', got '{got}'"),
            )),
            Some(_) => {
                self.bump();
                Ok(())
            }
        }
    }

    /// Consume the body of a `"`-quoted string; the opening quote has
    /// already been consumed. `\n` and `\t` escape to newline and tab, any
    /// other backslashed character to itself.
    pub fn parse_literal_tail(&mut self) -> Result<String, CompileError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    self.bump();
                    return Ok(out);
                }
                '\\' => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        out.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                }
                _ => {
                    out.push(c);
                    self.bump();
                }
            }
        }
        Err(CompileError::new(
            ErrorKind::UnterminatedString,
            self.pos,
            format!("Unterminated literal string after \"{out}\""),
        ))
    }

    /// Consume a bare string: everything up to a metacharacter, a
    /// terminator, or (when `whitespace_breaks`) whitespace. A `"` starts
    /// an embedded literal string; a `~` escapes a following metacharacter
    /// into the string.
    pub fn parse_substr(
        &mut self,
        terminators: &[&str],
        whitespace_breaks: bool,
    ) -> Result<String, CompileError> {
        let mut out = String::new();
        self.skip_whitespace();

        loop {
            while let Some(c) = self.peek() {
                if matches!(c, '(' | ')' | '!' | '~' | '|' | '"')
                    || (whitespace_breaks && c.is_whitespace())
                    || self.at_terminator(terminators)
                {
                    break;
                }
                out.push(c);
                self.bump();
            }

            if self.peek() == Some('"') {
                self.bump();
                out.push_str(&self.parse_literal_tail()?);
            }

            // A tilde escapes a following metacharacter; anything else
            // ends the string (the tilde is left for the caller).
            if self.peek() == Some('~') {
                match self.peek_second() {
                    Some(next)
                        if matches!(next, '(' | ')' | '!' | '~' | '|' | '"')
                            || (whitespace_breaks && next.is_whitespace()) =>
                    {
                        self.bump();
                        self.bump();
                        out.push(next);
                    }
                    _ => return Ok(out),
                }
            } else {
                return Ok(out);
            }
        }
    }
}
