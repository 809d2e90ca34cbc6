//! Lexical analysis: turns the raw source into a flat vector of tokens.
//!
//! The tokenizer knows nothing about the grammar beyond classifying lexemes.
//! Dot-prefixed words are keywords and must come from a fixed set; the
//! two-character `.=` operator is matched before the single-character ones.

use crate::error::{CompileError, CompileResult};

/// Keywords introduced by a leading dot.
const DOT_KEYWORDS: [&str; 8] = [
  ".BEGIN", ".END", ".REAL", ".IF", ".THEN", ".ELSE", ".UNTIL", ".DO",
];

/// Bare-word keywords. Any other word is an identifier.
const WORD_KEYWORDS: [&str; 2] = ["EDIT", "PRINT"];

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Ident,
  Num,
  Str,
  Keyword,
  Punctuator,
  Eof,
}

/// Lexical information needed by the translator and its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub value: Option<f64>,
  pub loc: usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, loc: usize) -> Self {
    Self {
      kind,
      text: text.into(),
      value: None,
      loc,
    }
  }

  fn number(text: &str, value: f64, loc: usize) -> Self {
    Self {
      value: Some(value),
      ..Self::new(TokenKind::Num, text, loc)
    }
  }

  pub fn is(&self, kind: TokenKind, text: &str) -> bool {
    self.kind == kind && self.text == text
  }

  /// Human-friendly description used in diagnostics.
  pub fn describe(&self) -> String {
    match self.kind {
      TokenKind::Eof => "end of input".to_string(),
      TokenKind::Str => self.text.clone(),
      _ => format!("\"{}\"", self.text),
    }
  }
}

/// Lex the input into a vector of tokens terminated by a single `Eof` marker.
///
/// The `Eof` token sits right after the last non-blank character so that
/// diagnostics about a missing trailer point at the end of the program text.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if c.is_ascii_alphabetic() {
      let start = i;
      while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
      }
      let text = &input[start..i];
      let kind = if WORD_KEYWORDS.contains(&text) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, text, start));
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
          i += 1;
        }
      }
      let text = &input[start..i];
      let value = text
        .parse::<f64>()
        .map_err(|err| CompileError::lex(input, start, format!("invalid number: {err}")))?;
      if !value.is_finite() {
        return Err(CompileError::lex(input, start, "number out of range"));
      }
      tokens.push(Token::number(text, value, start));
      continue;
    }

    if c == b'\'' {
      let start = i;
      let Some(len) = input[start + 1..].find('\'') else {
        return Err(CompileError::lex(input, start, "unterminated string"));
      };
      i = start + len + 2;
      tokens.push(Token::new(TokenKind::Str, &input[start..i], start));
      continue;
    }

    if input[i..].starts_with(".=") {
      tokens.push(Token::new(TokenKind::Punctuator, ".=", i));
      i += 2;
      continue;
    }

    if c == b'.' {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
      }
      let text = &input[start..i];
      if !DOT_KEYWORDS.contains(&text) {
        return Err(CompileError::lex(
          input,
          start,
          format!("unknown keyword \"{text}\""),
        ));
      }
      tokens.push(Token::new(TokenKind::Keyword, text, start));
      continue;
    }

    if matches!(
      c,
      b'+' | b'-' | b'*' | b'=' | b'(' | b')' | b',' | b';'
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, &input[i..i + 1], i));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::lex(
      input,
      i,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, "", input.trim_end().len()));
  Ok(tokens)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds_and_text(input: &str) -> Vec<(TokenKind, String)> {
    tokenize(input)
      .expect("tokenize")
      .into_iter()
      .map(|t| (t.kind, t.text))
      .collect()
  }

  #[test]
  fn classifies_every_lexeme_kind() {
    use TokenKind::*;
    let got = kinds_and_text(".BEGIN x2 = 3.25 .= y ; EDIT ( 'a b' ) PRINT .END");
    let want = [
      (Keyword, ".BEGIN"),
      (Ident, "x2"),
      (Punctuator, "="),
      (Num, "3.25"),
      (Punctuator, ".="),
      (Ident, "y"),
      (Punctuator, ";"),
      (Keyword, "EDIT"),
      (Punctuator, "("),
      (Str, "'a b'"),
      (Punctuator, ")"),
      (Keyword, "PRINT"),
      (Keyword, ".END"),
      (Eof, ""),
    ];
    let want: Vec<_> = want.iter().map(|(k, t)| (*k, t.to_string())).collect();
    assert_eq!(got, want);
  }

  #[test]
  fn number_does_not_swallow_following_keyword() {
    let tokens = tokenize("5.DO").expect("tokenize");
    assert_eq!(tokens[0].value, Some(5.0));
    assert!(tokens[1].is(TokenKind::Keyword, ".DO"));
  }

  #[test]
  fn oversized_number_is_rejected() {
    let source = format!("x = {}", "9".repeat(400));
    let err = tokenize(&source).unwrap_err();
    assert!(!err.is_syntax_mismatch());
    assert_eq!(err.offset(), 4);
    assert!(err.to_string().contains("number out of range"));
  }

  #[test]
  fn long_number_keeps_its_digits() {
    let tokens = tokenize("12345678901234567891").expect("tokenize");
    assert_eq!(tokens[0].text, "12345678901234567891");
    assert!(tokens[0].value.is_some_and(f64::is_finite));
  }

  #[test]
  fn words_containing_keywords_stay_identifiers() {
    let tokens = tokenize("EDITOR PRINTX print").expect("tokenize");
    assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Ident));
  }

  #[test]
  fn operators_without_spaces() {
    let got = kinds_and_text("(a+b)*c-1.=d");
    let texts: Vec<_> = got.iter().map(|(_, t)| t.as_str()).collect();
    assert_eq!(
      texts,
      ["(", "a", "+", "b", ")", "*", "c", "-", "1", ".=", "d", ""]
    );
  }

  #[test]
  fn eof_sits_after_last_non_blank_character() {
    let tokens = tokenize(".BEGIN PRINT  \n\n").expect("tokenize");
    let eof = tokens.last().expect("eof");
    assert_eq!(eof.kind, TokenKind::Eof);
    assert_eq!(eof.loc, 12);
    assert_eq!(eof.describe(), "end of input");
  }

  #[test]
  fn unterminated_string_is_rejected() {
    let err = tokenize("EDIT(1, 'abc").unwrap_err();
    assert_eq!(err.offset(), 8);
    assert!(err.to_string().contains("unterminated string"));
  }

  #[test]
  fn unknown_dot_keyword_is_rejected() {
    let err = tokenize(".BEGIN .WHILE").unwrap_err();
    assert_eq!(err.offset(), 7);
    assert!(err.to_string().contains("unknown keyword \".WHILE\""));
  }

  #[test]
  fn invalid_character_is_rejected() {
    let err = tokenize("x = y / 2").unwrap_err();
    assert!(!err.is_syntax_mismatch());
    assert!(err.to_string().contains("invalid token: '/'"));
  }
}
