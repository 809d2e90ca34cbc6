//! Code emission for the accumulator/stack machine.
//!
//! The emitter is append-only: branch targets are resolved by emitting the
//! label itself as a later pseudo-instruction, never by patching an earlier
//! one. The finished [`Program`] renders as an assembly listing where label
//! definitions sit flush left and instructions are indented eight columns.

use std::collections::HashMap;
use std::fmt;

use crate::label::Label;

const INDENT: &str = "        ";

/// Mnemonics understood by the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
  Ld,
  Ldl,
  St,
  Add,
  Sub,
  Mlt,
  Equ,
  B,
  Btp,
  Bfp,
  Edt,
  Pnt,
  Blk,
  Hlt,
  End,
}

impl Opcode {
  pub fn mnemonic(self) -> &'static str {
    match self {
      Opcode::Ld => "LD",
      Opcode::Ldl => "LDL",
      Opcode::St => "ST",
      Opcode::Add => "ADD",
      Opcode::Sub => "SUB",
      Opcode::Mlt => "MLT",
      Opcode::Equ => "EQU",
      Opcode::B => "B",
      Opcode::Btp => "BTP",
      Opcode::Bfp => "BFP",
      Opcode::Edt => "EDT",
      Opcode::Pnt => "PNT",
      Opcode::Blk => "BLK",
      Opcode::Hlt => "HLT",
      Opcode::End => "END",
    }
  }

  pub fn is_branch(self) -> bool {
    matches!(self, Opcode::B | Opcode::Btp | Opcode::Bfp)
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.mnemonic())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
  None,
  Label(Label),
  /// Numeric literal, rendered as written in the source.
  Literal { text: String, value: f64 },
  /// Quoted string literal, kept with its quotes.
  Text(String),
  Size(u32),
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Operand::None => Ok(()),
      Operand::Label(label) => write!(f, "{label}"),
      Operand::Literal { text, .. } => f.write_str(text),
      Operand::Text(text) => f.write_str(text),
      Operand::Size(size) => write!(f, "{size}"),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
  Op { opcode: Opcode, operand: Operand },
  /// Definition point: the address of the next word equals this symbol.
  Define(Label),
}

impl Instruction {
  pub fn op(opcode: Opcode, operand: Operand) -> Self {
    Self::Op { opcode, operand }
  }

  pub fn opcode(&self) -> Option<Opcode> {
    match self {
      Instruction::Op { opcode, .. } => Some(*opcode),
      Instruction::Define(_) => None,
    }
  }

  /// Label referenced as an operand, if any.
  pub fn target(&self) -> Option<&Label> {
    match self {
      Instruction::Op {
        operand: Operand::Label(label),
        ..
      } => Some(label),
      _ => None,
    }
  }

  pub fn defined_label(&self) -> Option<&Label> {
    match self {
      Instruction::Define(label) => Some(label),
      Instruction::Op { .. } => None,
    }
  }
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Instruction::Define(label) => write!(f, "{label}"),
      Instruction::Op {
        opcode,
        operand: Operand::None,
      } => write!(f, "{INDENT}{opcode}"),
      Instruction::Op { opcode, operand } => write!(f, "{INDENT}{opcode} {operand}"),
    }
  }
}

/// Append-only instruction sink driven by the translator.
#[derive(Debug, Default)]
pub struct Emitter {
  instructions: Vec<Instruction>,
}

impl Emitter {
  pub fn emit(&mut self, opcode: Opcode, operand: Operand) {
    log::trace!("emit {opcode} {operand}");
    self.instructions.push(Instruction::op(opcode, operand));
  }

  pub fn emit_bare(&mut self, opcode: Opcode) {
    self.emit(opcode, Operand::None);
  }

  pub fn branch(&mut self, opcode: Opcode, target: &Label) {
    debug_assert!(opcode.is_branch());
    self.emit(opcode, Operand::Label(target.clone()));
  }

  pub fn define(&mut self, label: Label) {
    log::trace!("define {label}");
    self.instructions.push(Instruction::Define(label));
  }

  pub fn mark(&self) -> usize {
    self.instructions.len()
  }

  /// Drop everything emitted since `mark`. Only ordered-choice backtracking
  /// uses this, to discard the output of an alternative that did not match.
  pub fn truncate(&mut self, mark: usize) {
    self.instructions.truncate(mark);
  }

  pub fn finish(self) -> Program {
    Program {
      instructions: self.instructions,
    }
  }
}

/// Label invariant violations found by [`Program::check_labels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelProblem {
  Undefined(Label),
  Redefined(Label),
}

impl fmt::Display for LabelProblem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LabelProblem::Undefined(label) => write!(f, "label {label} is used but never defined"),
      LabelProblem::Redefined(label) => write!(f, "label {label} is defined more than once"),
    }
  }
}

/// A complete, immutable instruction sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
  instructions: Vec<Instruction>,
}

impl Program {
  pub fn instructions(&self) -> &[Instruction] {
    &self.instructions
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
    self.instructions.iter()
  }

  /// Number of label definition points in the sequence.
  pub fn label_count(&self) -> usize {
    self.iter().filter(|i| i.defined_label().is_some()).count()
  }

  /// Position of the definition point of `label`.
  pub fn position_of(&self, label: &Label) -> Option<usize> {
    self
      .iter()
      .position(|i| i.defined_label() == Some(label))
  }

  /// Verify that every referenced label is defined and none is defined twice.
  ///
  /// Labels are compared by the symbol the assembler sees, so a variable
  /// named like a generated label is the same symbol as that label.
  pub fn check_labels(&self) -> Result<(), Vec<LabelProblem>> {
    let mut definitions: HashMap<String, (&Label, usize)> = HashMap::new();
    for label in self.iter().filter_map(Instruction::defined_label) {
      definitions.entry(label.to_string()).or_insert((label, 0)).1 += 1;
    }

    let mut problems: Vec<LabelProblem> = definitions
      .values()
      .filter(|(_, count)| *count > 1)
      .map(|(label, _)| LabelProblem::Redefined((*label).clone()))
      .collect();
    for target in self.iter().filter_map(Instruction::target) {
      let problem = LabelProblem::Undefined(target.clone());
      if !definitions.contains_key(&target.to_string()) && !problems.contains(&problem) {
        problems.push(problem);
      }
    }

    if problems.is_empty() {
      Ok(())
    } else {
      Err(problems)
    }
  }
}

impl<'a> IntoIterator for &'a Program {
  type Item = &'a Instruction;
  type IntoIter = std::slice::Iter<'a, Instruction>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

impl fmt::Display for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for instruction in &self.instructions {
      writeln!(f, "{instruction}")?;
    }
    Ok(())
  }
}
