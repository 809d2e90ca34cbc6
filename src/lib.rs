//! Crate root: wires together the translation pipeline.
//!
//! - `tokenizer` classifies the source into a flat token stream.
//! - `parser` recognises the grammar and emits code as a side effect.
//! - `label` issues the symbols used as branch targets.
//! - `codegen` holds the instruction set, the emitter and the listing format.
//! - `error` centralises diagnostics shared by the other modules.

pub mod codegen;
pub mod error;
pub mod label;
pub mod parser;
pub mod tokenizer;

pub use codegen::{Instruction, Opcode, Operand, Program};
pub use error::{CompileError, CompileResult};
pub use label::Label;
pub use parser::TranslatorOptions;

/// Translate source text into a program with default options.
pub fn translate(source: &str) -> CompileResult<Program> {
  translate_with(source, &TranslatorOptions::default())
}

pub fn translate_with(source: &str, options: &TranslatorOptions) -> CompileResult<Program> {
  let tokens = tokenizer::tokenize(source)?;
  log::debug!("{} tokens", tokens.len());
  let program = parser::parse(tokens, source, options)?;

  // Declarations are only checked within one block and uses not at all, so
  // undeclared or twice-declared variables show up here.
  if let Err(problems) = program.check_labels() {
    for problem in problems {
      log::warn!("{problem}");
    }
  }
  log::info!(
    "translated {} instructions, {} label definitions",
    program.len(),
    program.label_count()
  );
  Ok(program)
}

/// Translate source text and render the assembly listing.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  Ok(translate(source)?.to_string())
}
