use std::collections::HashSet;

use valgolc::codegen::LabelProblem;
use valgolc::{
  Instruction, Label, Opcode, Operand, Program, TranslatorOptions, generate_assembly, translate,
  translate_with,
};

const COUNTER: &str = r#"
.BEGIN
  .REAL i, sum;
  0 = i;
  0 = sum;
  .UNTIL i .= 10 .DO
    .BEGIN
      i + 1 = i;
      sum + i * i = sum
    .END;
  .IF sum .= 385 .THEN
    EDIT(0, 'OK')
  .ELSE
    EDIT(0, 'WRONG');
  PRINT
.END
"#;

fn ok(source: &str) -> Program {
  translate(source).unwrap_or_else(|err| panic!("translation failed:\n{err}"))
}

fn opcodes(program: &Program) -> Vec<Option<Opcode>> {
  program.iter().map(Instruction::opcode).collect()
}

fn branch_target(instruction: &Instruction, opcode: Opcode) -> Label {
  match instruction {
    Instruction::Op {
      opcode: op,
      operand: Operand::Label(label),
    } if *op == opcode => label.clone(),
    other => panic!("expected {opcode} with a label, got {other:?}"),
  }
}

#[test]
fn full_program_listing() {
  let expected = "        B A001
i
        BLK 1
sum
        BLK 1
A001
        LDL 0
        ST i
        LDL 0
        ST sum
A002
        LD i
        LDL 10
        EQU
        BTP A003
        LD i
        LDL 1
        ADD
        ST i
        LD sum
        LD i
        LD i
        MLT
        ADD
        ST sum
        B A002
A003
        LD sum
        LDL 385
        EQU
        BFP A004
        LDL 0
        EDT 'OK'
        B A005
A004
        LDL 0
        EDT 'WRONG'
A005
        PNT
        HLT
        END
";
  assert_eq!(generate_assembly(COUNTER).expect("translation"), expected);
}

#[test]
fn program_always_ends_with_halt_then_end() {
  for source in [COUNTER, ".BEGIN PRINT .END", ".BEGIN .BEGIN 1 = a .END .END"] {
    let program = ok(source);
    let ops = opcodes(&program);
    assert_eq!(&ops[ops.len() - 2..], [Some(Opcode::Hlt), Some(Opcode::End)]);
    assert_eq!(ops.iter().filter(|op| **op == Some(Opcode::Hlt)).count(), 1);
    assert_eq!(ops.iter().filter(|op| **op == Some(Opcode::End)).count(), 1);
  }
}

#[test]
fn until_body_sits_between_top_label_and_back_branch() {
  let program = ok(".BEGIN .UNTIL a .DO EDIT(a, 'x') .END");
  let instructions = program.instructions();
  assert_eq!(program.label_count(), 2);

  let top = instructions[0].defined_label().expect("loop top").clone();
  let exit = branch_target(&instructions[2], Opcode::Btp);
  let back = instructions
    .iter()
    .position(|i| i.opcode() == Some(Opcode::B))
    .expect("back branch");
  assert_eq!(branch_target(&instructions[back], Opcode::B), top);

  let body = &instructions[3..back];
  assert_eq!(
    body.iter().map(Instruction::opcode).collect::<Vec<_>>(),
    [Some(Opcode::Ld), Some(Opcode::Edt)]
  );
  assert_eq!(program.position_of(&exit), Some(back + 1));
}

#[test]
fn conditional_targets_else_label_and_joins_after_else_branch() {
  let program = ok(".BEGIN .IF a .THEN 1 = b .ELSE 2 = b .END");
  let instructions = program.instructions();
  assert_eq!(program.label_count(), 2);

  let otherwise = branch_target(&instructions[1], Opcode::Bfp);
  let join = branch_target(&instructions[4], Opcode::B);
  assert_ne!(otherwise, join);

  let else_at = program.position_of(&otherwise).expect("else label");
  let join_at = program.position_of(&join).expect("join label");
  assert_eq!(else_at, 5);
  assert_eq!(
    instructions[join_at - 1],
    Instruction::op(Opcode::St, Operand::Label(Label::Variable("b".into())))
  );
  assert_eq!(instructions[join_at - 2].opcode(), Some(Opcode::Ldl));
}

#[test]
fn declaration_reserves_storage_behind_a_skip_branch() {
  let program = ok(".BEGIN .REAL a, b, c; PRINT .END");
  let instructions = program.instructions();

  let skip = branch_target(&instructions[0], Opcode::B);
  let reserved: Vec<_> = instructions
    .iter()
    .enumerate()
    .filter(|(_, i)| i.opcode() == Some(Opcode::Blk))
    .collect();
  assert_eq!(reserved.len(), 3);

  let mut bound = HashSet::new();
  for (at, instruction) in &reserved {
    assert_eq!(
      **instruction,
      Instruction::op(Opcode::Blk, Operand::Size(1))
    );
    bound.insert(instructions[at - 1].defined_label().expect("storage label").clone());
  }
  assert_eq!(bound.len(), 3);

  let last_reservation = reserved.last().expect("reservation").0;
  assert_eq!(program.position_of(&skip), Some(last_reservation + 1));
}

#[test]
fn translation_is_repeatable() {
  assert_eq!(ok(COUNTER), ok(COUNTER));

  let options = TranslatorOptions { first_label: 500 };
  let first = translate_with(COUNTER, &options).expect("translation");
  let second = translate_with(COUNTER, &options).expect("translation");
  assert_eq!(first.to_string(), second.to_string());
  assert!(first.to_string().contains("BTP A502"));
}

#[test]
fn assignment_declaration_and_output() {
  let listing = generate_assembly(".BEGIN .REAL x; 5 = x; EDIT(x, 'x'); PRINT .END")
    .expect("translation");
  let lines: Vec<_> = listing.lines().map(str::trim).collect();
  assert_eq!(
    lines,
    [
      "B A001", "x", "BLK 1", "A001", "LDL 5", "ST x", "LD x", "EDT 'x'", "PNT", "HLT", "END"
    ]
  );
}

#[test]
fn missing_end_fails_at_end_of_input() {
  let source = ".BEGIN .REAL x; 5 = x; PRINT\n";
  let err = translate(source).unwrap_err();
  assert!(err.is_syntax_mismatch());
  assert_eq!(err.rule(), Some("BLOCK"));
  assert_eq!(err.expected(), Some("\".END\""));
  assert_eq!(err.found(), Some("end of input"));
  assert_eq!(err.offset(), source.trim_end().len());
  assert!(err.to_string().contains("expected \".END\", but got end of input"));
}

#[test]
fn trailing_input_is_rejected() {
  let err = translate(".BEGIN PRINT .END PRINT").unwrap_err();
  assert_eq!(err.rule(), Some("PROGRAM"));
  assert_eq!(err.expected(), Some("end of input"));
  assert_eq!(err.found(), Some("\"PRINT\""));
}

#[test]
fn program_must_start_with_a_block() {
  let err = translate("PRINT").unwrap_err();
  assert_eq!(err.rule(), Some("PROGRAM"));
  assert_eq!(err.offset(), 0);

  let err = translate("   ").unwrap_err();
  assert_eq!(err.found(), Some("end of input"));
}

#[test]
fn lexical_errors_surface_unchanged() {
  let err = translate(".BEGIN 1 / 2 = x .END").unwrap_err();
  assert!(!err.is_syntax_mismatch());
  assert_eq!(err.offset(), 9);
}

#[test]
fn errors_report_line_and_column() {
  let err = translate(".BEGIN\n  PRINT;\n  .IF a .THEN PRINT\n.END").unwrap_err();
  assert_eq!(err.line(), 4);
  assert_eq!(err.column(), 1);
  assert_eq!(err.rule(), Some("CONDITIONALST"));
}

#[test]
fn undeclared_variables_are_left_for_the_assembler() {
  let program = ok(".BEGIN 1 = y .END");
  assert_eq!(
    program.check_labels(),
    Err(vec![LabelProblem::Undefined(Label::Variable("y".into()))])
  );
  assert_eq!(ok(COUNTER).check_labels(), Ok(()));
}

#[test]
fn last_label_number_is_reachable_but_not_passed() {
  let options = TranslatorOptions {
    first_label: u32::MAX,
  };
  let program = translate_with(".BEGIN .REAL a; PRINT .END", &options).expect("translation");
  assert!(program.to_string().starts_with("        B A4294967295\n"));

  let err = translate_with(".BEGIN .IF a .THEN PRINT .ELSE PRINT .END", &options).unwrap_err();
  assert!(!err.is_syntax_mismatch());
  assert_eq!(err.rule(), Some("CONDITIONALST"));
  assert!(err.to_string().contains("no label numbers left after A4294967295"));
}

#[test]
fn oversized_literal_is_a_lexical_error() {
  let source = format!(".BEGIN {} = x .END", "9".repeat(400));
  let err = translate(&source).unwrap_err();
  assert!(!err.is_syntax_mismatch());
  assert_eq!(err.offset(), 7);
}

#[test]
fn sibling_blocks_each_declare_their_own_variable() {
  let source = ".BEGIN .BEGIN .REAL a; PRINT .END; .BEGIN .REAL a; PRINT .END .END";
  let program = ok(source);
  assert_eq!(
    program.check_labels(),
    Err(vec![LabelProblem::Redefined(Label::Variable("a".into()))])
  );
}
