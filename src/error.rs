//! Shared error utilities used across the translation pipeline.
//!
//! Diagnostics point at the offending byte with a caret under the source line
//! that contains it, together with the 1-based line and column.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// The tokenizer met a character sequence it cannot classify.
  #[snafu(display("{source_line}\n{marker} {message} (line {line}, column {column})"))]
  Lex {
    offset: usize,
    line: usize,
    column: usize,
    source_line: String,
    marker: String,
    message: String,
  },

  /// No alternative of a mandatory grammar rule matched the current token.
  #[snafu(display(
    "{source_line}\n{marker} {rule}: expected {expected}, but got {found} (line {line}, column {column})"
  ))]
  SyntaxMismatch {
    rule: &'static str,
    expected: String,
    found: String,
    offset: usize,
    line: usize,
    column: usize,
    source_line: String,
    marker: String,
  },

  /// The program needs more generated labels than the counter can number.
  #[snafu(display(
    "{source_line}\n{marker} {rule}: no label numbers left after A{last} (line {line}, column {column})"
  ))]
  LabelsExhausted {
    rule: &'static str,
    last: u32,
    offset: usize,
    line: usize,
    column: usize,
    source_line: String,
    marker: String,
  },
}

impl CompileError {
  /// Construct a lexical error anchored at a byte offset in the source.
  pub fn lex(source: &str, offset: usize, message: impl Into<String>) -> Self {
    let Location {
      offset,
      line,
      column,
      source_line,
      marker,
    } = Location::of(source, offset);
    Self::Lex {
      offset,
      line,
      column,
      source_line,
      marker,
      message: message.into(),
    }
  }

  /// Construct a mismatch raised by `rule` while looking at the token at `offset`.
  pub fn mismatch(
    source: &str,
    offset: usize,
    rule: &'static str,
    expected: impl Into<String>,
    found: impl Into<String>,
  ) -> Self {
    let Location {
      offset,
      line,
      column,
      source_line,
      marker,
    } = Location::of(source, offset);
    Self::SyntaxMismatch {
      rule,
      expected: expected.into(),
      found: found.into(),
      offset,
      line,
      column,
      source_line,
      marker,
    }
  }

  /// Construct the error raised when `rule` needs a label past `u32::MAX`.
  pub fn labels_exhausted(source: &str, offset: usize, rule: &'static str) -> Self {
    let Location {
      offset,
      line,
      column,
      source_line,
      marker,
    } = Location::of(source, offset);
    Self::LabelsExhausted {
      rule,
      last: u32::MAX,
      offset,
      line,
      column,
      source_line,
      marker,
    }
  }

  pub fn is_syntax_mismatch(&self) -> bool {
    matches!(self, Self::SyntaxMismatch { .. })
  }

  /// Grammar rule that was expecting a match, if this is a syntax error.
  pub fn rule(&self) -> Option<&'static str> {
    match self {
      Self::SyntaxMismatch { rule, .. } | Self::LabelsExhausted { rule, .. } => Some(rule),
      Self::Lex { .. } => None,
    }
  }

  pub fn expected(&self) -> Option<&str> {
    match self {
      Self::SyntaxMismatch { expected, .. } => Some(expected),
      Self::Lex { .. } | Self::LabelsExhausted { .. } => None,
    }
  }

  pub fn found(&self) -> Option<&str> {
    match self {
      Self::SyntaxMismatch { found, .. } => Some(found),
      Self::Lex { .. } | Self::LabelsExhausted { .. } => None,
    }
  }

  /// Byte offset of the failure in the source text.
  pub fn offset(&self) -> usize {
    match self {
      Self::Lex { offset, .. }
      | Self::SyntaxMismatch { offset, .. }
      | Self::LabelsExhausted { offset, .. } => *offset,
    }
  }

  pub fn line(&self) -> usize {
    match self {
      Self::Lex { line, .. }
      | Self::SyntaxMismatch { line, .. }
      | Self::LabelsExhausted { line, .. } => *line,
    }
  }

  pub fn column(&self) -> usize {
    match self {
      Self::Lex { column, .. }
      | Self::SyntaxMismatch { column, .. }
      | Self::LabelsExhausted { column, .. } => *column,
    }
  }
}

struct Location {
  offset: usize,
  line: usize,
  column: usize,
  source_line: String,
  marker: String,
}

impl Location {
  fn of(source: &str, offset: usize) -> Self {
    let mut safe = offset.min(source.len());
    while !source.is_char_boundary(safe) {
      safe -= 1;
    }
    let line_start = source[..safe].rfind('\n').map_or(0, |nl| nl + 1);
    let line_end = source[safe..]
      .find('\n')
      .map_or(source.len(), |nl| safe + nl);
    let column = source[line_start..safe].chars().count() + 1;
    Self {
      offset: safe,
      line: source[..safe].matches('\n').count() + 1,
      column,
      source_line: source[line_start..line_end].trim_end_matches('\r').to_string(),
      marker: format!("{}^", " ".repeat(column - 1)),
    }
  }
}
