//! Recursive-descent translator: recognition and code emission in one pass.
//!
//! Every grammar rule is one method returning whether it recognised its
//! leading token. A rule that does not recognise its leading token reports
//! [`Recognition::Unrecognized`] and the caller may try another alternative;
//! once a rule has committed, any later mismatch is a hard
//! [`CompileError::SyntaxMismatch`] and the whole translation fails.
//!
//! ```text
//! PROGRAM       = BLOCK                          HLT END
//! BLOCK         = '.BEGIN' [DEC ';'] ST {';' ST} '.END'
//! DEC           = '.REAL' ID {',' ID}            B L1, (ID: BLK 1)*, L1:
//! ST            = IOST | ASSIGNST | UNTILST | CONDITIONALST | BLOCK
//! IOST          = 'EDIT' '(' EXP ',' STRING ')' | 'PRINT'
//! ASSIGNST      = EXP '=' ID
//! UNTILST       = '.UNTIL' EXP '.DO' ST
//! CONDITIONALST = '.IF' EXP '.THEN' ST '.ELSE' ST
//! EXP           = EXP1 ['.=' EXP1]
//! EXP1          = TERM {'+' TERM | '-' TERM}
//! TERM          = PRIMARY {'*' PRIMARY}
//! PRIMARY       = ID | NUMBER | '(' EXP ')'
//! ```

use std::collections::HashSet;

use crate::codegen::{Emitter, Opcode, Operand, Program};
use crate::error::{CompileError, CompileResult};
use crate::label::{Label, LabelAllocator};
use crate::tokenizer::{Token, TokenKind};

/// Outcome of trying one grammar rule against the current token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognition {
  Recognized,
  Unrecognized,
}

use Recognition::*;

type Recog = CompileResult<Recognition>;

/// Knobs for one translation run.
#[derive(Debug, Clone)]
pub struct TranslatorOptions {
  /// Counter value of the first generated label.
  pub first_label: u32,
}

impl Default for TranslatorOptions {
  fn default() -> Self {
    Self { first_label: 1 }
  }
}

/// Translate a whole program. Either the complete instruction sequence is
/// returned or nothing is.
pub fn parse(
  tokens: Vec<Token>,
  source: &str,
  options: &TranslatorOptions,
) -> CompileResult<Program> {
  let mut translator = Translator::new(tokens, source, options);
  translator.program()?;
  Ok(translator.out.finish())
}

struct Translator<'a> {
  stream: TokenStream<'a>,
  labels: LabelAllocator,
  out: Emitter,
  /// Names declared by each open block, innermost last.
  scopes: Vec<HashSet<String>>,
}

/// Everything ordered choice must rewind when an alternative does not match.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
  pos: usize,
  emitted: usize,
  next_label: u64,
}

impl<'a> Translator<'a> {
  fn new(tokens: Vec<Token>, source: &'a str, options: &TranslatorOptions) -> Self {
    Self {
      stream: TokenStream::new(tokens, source),
      labels: LabelAllocator::starting_at(options.first_label),
      out: Emitter::default(),
      scopes: Vec::new(),
    }
  }

  fn checkpoint(&self) -> Checkpoint {
    Checkpoint {
      pos: self.stream.pos,
      emitted: self.out.mark(),
      next_label: self.labels.checkpoint(),
    }
  }

  fn rewind(&mut self, checkpoint: Checkpoint) {
    self.stream.pos = checkpoint.pos;
    self.out.truncate(checkpoint.emitted);
    self.labels.restore(checkpoint.next_label);
  }

  /// Try one alternative, leaving no trace if it does not match.
  fn attempt(&mut self, rule: fn(&mut Self) -> Recog) -> Recog {
    let checkpoint = self.checkpoint();
    let recognition = rule(self)?;
    if recognition == Unrecognized {
      self.rewind(checkpoint);
    }
    Ok(recognition)
  }

  fn fresh_label(&mut self, rule: &'static str) -> CompileResult<Label> {
    self.labels.allocate().ok_or_else(|| {
      CompileError::labels_exhausted(self.stream.source, self.stream.loc(), rule)
    })
  }

  /// Storage label for a variable use. Names shaped like generated labels
  /// would resolve to code addresses, so they are refused here too.
  fn variable(&self, loc: usize, rule: &'static str, name: String) -> CompileResult<Label> {
    if is_generated_label_name(&name) {
      return Err(self.stream.mismatch_at(loc, rule, RESERVED));
    }
    Ok(Label::Variable(name))
  }

  /// Run a rule in a position where it is mandatory.
  fn require(
    &mut self,
    rule: &'static str,
    expected: &str,
    sub: fn(&mut Self) -> Recog,
  ) -> CompileResult<()> {
    match sub(self)? {
      Recognized => Ok(()),
      Unrecognized => Err(self.stream.mismatch(rule, expected)),
    }
  }

  fn program(&mut self) -> CompileResult<()> {
    self.require("PROGRAM", "\".BEGIN\"", Self::block)?;
    self.out.emit_bare(Opcode::Hlt);
    self.out.emit_bare(Opcode::End);
    if !self.stream.is_eof() {
      return Err(self.stream.mismatch("PROGRAM", "end of input"));
    }
    Ok(())
  }

  fn block(&mut self) -> Recog {
    if !self.stream.equal(".BEGIN") {
      return Ok(Unrecognized);
    }
    log::debug!("BLOCK at offset {}", self.stream.loc());
    self.scopes.push(HashSet::new());
    if self.dec()? == Recognized {
      self.stream.skip("DEC", ";")?;
    }
    self.require("BLOCK", "a statement", Self::st)?;
    while self.stream.equal(";") {
      self.require("BLOCK", "a statement", Self::st)?;
    }
    self.stream.skip("BLOCK", ".END")?;
    self.scopes.pop();
    Ok(Recognized)
  }

  /// Storage is reserved inline, so control branches around it.
  ///
  /// A name may be declared once per block. Declaring it again in another
  /// block defines its storage label twice, which `check_labels` reports.
  fn dec(&mut self) -> Recog {
    if !self.stream.equal(".REAL") {
      return Ok(Unrecognized);
    }
    let skip = self.fresh_label("DEC")?;
    self.out.branch(Opcode::B, &skip);
    loop {
      let loc = self.stream.loc();
      let name = self.stream.get_ident("DEC")?;
      let label = self.variable(loc, "DEC", name.clone())?;
      if let Some(scope) = self.scopes.last_mut()
        && !scope.insert(name.clone())
      {
        let expected = "an identifier not already declared in this block";
        return Err(self.stream.mismatch_at(loc, "DEC", expected));
      }
      log::debug!("declared {name}");
      self.out.define(label);
      self.out.emit(Opcode::Blk, Operand::Size(1));
      if !self.stream.equal(",") {
        break;
      }
    }
    self.out.define(skip);
    Ok(Recognized)
  }

  fn st(&mut self) -> Recog {
    let alternatives: [fn(&mut Self) -> Recog; 5] = [
      Self::iost,
      Self::assignst,
      Self::untilst,
      Self::conditionalst,
      Self::block,
    ];
    for alternative in alternatives {
      if self.attempt(alternative)? == Recognized {
        return Ok(Recognized);
      }
    }
    Ok(Unrecognized)
  }

  fn iost(&mut self) -> Recog {
    if self.stream.equal("EDIT") {
      self.stream.skip("IOST", "(")?;
      self.require("IOST", "an expression", Self::exp)?;
      self.stream.skip("IOST", ",")?;
      let format = self.stream.get_string("IOST")?;
      self.out.emit(Opcode::Edt, Operand::Text(format));
      self.stream.skip("IOST", ")")?;
      return Ok(Recognized);
    }
    if self.stream.equal("PRINT") {
      self.out.emit_bare(Opcode::Pnt);
      return Ok(Recognized);
    }
    Ok(Unrecognized)
  }

  fn assignst(&mut self) -> Recog {
    if self.exp()? == Unrecognized {
      return Ok(Unrecognized);
    }
    self.stream.skip("ASSIGNST", "=")?;
    let loc = self.stream.loc();
    let name = self.stream.get_ident("ASSIGNST")?;
    let target = self.variable(loc, "ASSIGNST", name)?;
    self.out.emit(Opcode::St, Operand::Label(target));
    Ok(Recognized)
  }

  /// Pre-test loop: the body runs while the condition is false.
  fn untilst(&mut self) -> Recog {
    if !self.stream.equal(".UNTIL") {
      return Ok(Unrecognized);
    }
    log::debug!("UNTILST at offset {}", self.stream.loc());
    let top = self.fresh_label("UNTILST")?;
    self.out.define(top.clone());
    self.require("UNTILST", "an expression", Self::exp)?;
    self.stream.skip("UNTILST", ".DO")?;
    let exit = self.fresh_label("UNTILST")?;
    self.out.branch(Opcode::Btp, &exit);
    self.require("UNTILST", "a statement", Self::st)?;
    self.out.branch(Opcode::B, &top);
    self.out.define(exit);
    Ok(Recognized)
  }

  fn conditionalst(&mut self) -> Recog {
    if !self.stream.equal(".IF") {
      return Ok(Unrecognized);
    }
    log::debug!("CONDITIONALST at offset {}", self.stream.loc());
    self.require("CONDITIONALST", "an expression", Self::exp)?;
    self.stream.skip("CONDITIONALST", ".THEN")?;
    let otherwise = self.fresh_label("CONDITIONALST")?;
    self.out.branch(Opcode::Bfp, &otherwise);
    self.require("CONDITIONALST", "a statement", Self::st)?;
    let join = self.fresh_label("CONDITIONALST")?;
    self.out.branch(Opcode::B, &join);
    self.out.define(otherwise);
    self.stream.skip("CONDITIONALST", ".ELSE")?;
    self.require("CONDITIONALST", "a statement", Self::st)?;
    self.out.define(join);
    Ok(Recognized)
  }

  /// At most one equality test per expression.
  fn exp(&mut self) -> Recog {
    if self.exp1()? == Unrecognized {
      return Ok(Unrecognized);
    }
    if self.stream.equal(".=") {
      self.require("EXP", "an operand", Self::exp1)?;
      self.out.emit_bare(Opcode::Equ);
    }
    Ok(Recognized)
  }

  fn exp1(&mut self) -> Recog {
    if self.term()? == Unrecognized {
      return Ok(Unrecognized);
    }
    loop {
      let opcode = if self.stream.equal("+") {
        Opcode::Add
      } else if self.stream.equal("-") {
        Opcode::Sub
      } else {
        break;
      };
      self.require("EXP1", "an operand", Self::term)?;
      self.out.emit_bare(opcode);
    }
    Ok(Recognized)
  }

  fn term(&mut self) -> Recog {
    if self.primary()? == Unrecognized {
      return Ok(Unrecognized);
    }
    while self.stream.equal("*") {
      self.require("TERM", "an operand", Self::primary)?;
      self.out.emit_bare(Opcode::Mlt);
    }
    Ok(Recognized)
  }

  fn primary(&mut self) -> Recog {
    let loc = self.stream.loc();
    if let Some(name) = self.stream.ident() {
      let source = self.variable(loc, "PRIMARY", name)?;
      self.out.emit(Opcode::Ld, Operand::Label(source));
      return Ok(Recognized);
    }
    if let Some((text, value)) = self.stream.number() {
      self.out.emit(Opcode::Ldl, Operand::Literal { text, value });
      return Ok(Recognized);
    }
    if self.stream.equal("(") {
      self.require("PRIMARY", "an expression", Self::exp)?;
      self.stream.skip("PRIMARY", ")")?;
      return Ok(Recognized);
    }
    Ok(Unrecognized)
  }
}

const RESERVED: &str = "an identifier not reserved for labels";

/// Names of the form `A` followed by three or more digits belong to the
/// label allocator.
fn is_generated_label_name(name: &str) -> bool {
  name
    .strip_prefix('A')
    .is_some_and(|digits| digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Byte offset of the current token; end of source once the stream is spent.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  /// Consume the current token if it is the given keyword or punctuator.
  fn equal(&mut self, text: &str) -> bool {
    if let Some(token) = self.peek()
      && (token.is(TokenKind::Keyword, text) || token.is(TokenKind::Punctuator, text))
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, rule: &'static str, text: &str) -> CompileResult<()> {
    if self.equal(text) {
      Ok(())
    } else {
      Err(self.mismatch(rule, &format!("\"{text}\"")))
    }
  }

  fn take(&mut self, kind: TokenKind) -> Option<Token> {
    let token = self.peek().filter(|token| token.kind == kind)?.clone();
    self.pos += 1;
    Some(token)
  }

  fn ident(&mut self) -> Option<String> {
    self.take(TokenKind::Ident).map(|token| token.text)
  }

  /// Source text and value of a numeric literal.
  fn number(&mut self) -> Option<(String, f64)> {
    let token = self.take(TokenKind::Num)?;
    Some((token.text, token.value?))
  }

  fn get_ident(&mut self, rule: &'static str) -> CompileResult<String> {
    self
      .ident()
      .ok_or_else(|| self.mismatch(rule, "an identifier"))
  }

  fn get_string(&mut self, rule: &'static str) -> CompileResult<String> {
    self
      .take(TokenKind::Str)
      .map(|token| token.text)
      .ok_or_else(|| self.mismatch(rule, "a string"))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof) | None)
  }

  fn mismatch(&self, rule: &'static str, expected: &str) -> CompileError {
    self.mismatch_at(self.loc(), rule, expected)
  }

  fn mismatch_at(&self, loc: usize, rule: &'static str, expected: &str) -> CompileError {
    let found = self
      .tokens
      .iter()
      .find(|token| token.loc >= loc)
      .map_or_else(|| "end of input".to_string(), Token::describe);
    CompileError::mismatch(self.source, loc, rule, expected, found)
  }
}
