//! The literal scenarios from spec §8 (S1–S6), driven through the public
//! `compile` entry point the way an external caller would use it.

use cubeil::common::BlockRef;
use cubeil::front::{Operand, Procedure, Terminator};
use cubeil::middle::{cfg, ssa};
use cubeil::{compile, Config};

fn compile_one(source: &str) -> Procedure {
    let mut result = None;
    let mut on_procedure = |proc: &mut Procedure| {
        result = Some(proc.clone());
        Ok(())
    };
    compile(Config { source, filename: "t.il", on_procedure: &mut on_procedure }).expect("compiles");
    result.expect("at least one procedure")
}

fn compile_through_ssa(source: &str) -> Procedure {
    let mut result = None;
    let mut on_procedure = |proc: &mut Procedure| {
        cfg::build(proc);
        ssa::build(proc)?;
        result = Some(proc.clone());
        Ok(())
    };
    compile(Config { source, filename: "t.il", on_procedure: &mut on_procedure }).expect("compiles");
    result.expect("at least one procedure")
}

#[test]
fn s1_single_block_immediate_return() {
    let source = "func question() u64 {\n  answer:\n    reti 42\n}\n";
    let proc = compile_one(source);

    assert_eq!(proc.name, "question");
    assert_eq!(proc.return_type.to_string(), "u64");
    assert_eq!(proc.blocks.len(), 1);
    assert_eq!(proc.blocks[0].name, "answer");
    assert_eq!(proc.blocks[0].instructions.len(), 0);

    match proc.blocks[0].terminator {
        Terminator::Ret(Operand::Constant(idx)) => {
            assert_eq!(idx.0, 0);
            assert_eq!(proc.constants[idx.0], 42);
        }
        other => panic!("expected RETI 42, got {other:?}"),
    }
}

#[test]
fn s2_arithmetic_with_constant() {
    let source = "func plusone(a u64) u64 {\n  var b u64\n  entry:\n    addi b, a, 1\n    ret b\n}\n";

    let parsed = compile_one(source);
    assert_eq!(parsed.parameters().len(), 1);
    assert_eq!(parsed.parameters()[0].name, "a");
    assert_eq!(parsed.locals.len(), 2);
    assert_eq!(parsed.locals[1].name, "b");
    assert_eq!(parsed.constants, vec![1]);
    assert_eq!(parsed.blocks.len(), 1);
    assert_eq!(parsed.blocks[0].name, "entry");
    assert_eq!(parsed.blocks[0].instructions.len(), 1);
    assert!(matches!(parsed.blocks[0].terminator, Terminator::Ret(Operand::Local(_))));

    let ssa = compile_through_ssa(source);
    let block = &ssa.blocks[0];
    assert_eq!(ssa.ssa_reg_name(block.ssa_params[0]), "a0");
    assert_eq!(ssa.ssa_reg_name(block.ssa_params[1]), "b0");

    let instr = &block.instructions[0];
    match instr.operands[0] {
        Operand::Register(r) => assert_eq!(ssa.ssa_reg_name(r), "b1"),
        other => panic!("expected a fresh register destination, got {other:?}"),
    }
    match instr.operands[1] {
        Operand::Register(r) => assert_eq!(ssa.ssa_reg_name(r), "a0"),
        other => panic!("expected a0 as the first source, got {other:?}"),
    }
    assert!(matches!(instr.operands[2], Operand::Constant(_)));

    match block.terminator {
        Terminator::Ret(Operand::Register(r)) => assert_eq!(ssa.ssa_reg_name(r), "b1"),
        other => panic!("expected ret b1, got {other:?}"),
    }
}

#[test]
fn s3_forward_label() {
    let source = "func f(a u64) u64 {\n  entry:   jmp done\n  done:    ret a\n}\n";
    let proc = compile_one(source);

    let entry = proc.blocks.iter().position(|b| b.name == "entry").unwrap();
    let done = proc.blocks.iter().position(|b| b.name == "done").unwrap();

    assert_eq!(proc.blocks[entry].successors[0], Some(BlockRef(done)));
    assert_eq!(proc.blocks[done].successors, [None, None]);

    let ordered = compile_through_ssa(source);
    let entry_ref = BlockRef(ordered.blocks.iter().position(|b| b.name == "entry").unwrap());
    let done_block = ordered.blocks.iter().find(|b| b.name == "done").unwrap();
    assert_eq!(done_block.predecessors, vec![entry_ref]);
}

#[test]
fn s4_unresolved_label() {
    let source = "func bad() u64 {\n  entry: jmp ghost\n}\n";
    let mut on_procedure = |_: &mut Procedure| Ok(());
    let err = compile(Config { source, filename: "t.il", on_procedure: &mut on_procedure }).unwrap_err();
    assert!(err.to_string().contains("unresolved reference to label ghost"), "got: {err}");
}

#[test]
fn s5_loop_and_scc_tagging() {
    let source = "func cfg(z u64) u64 {\n  \
        x: jnz z, b, c\n  \
        b: jmp d\n  \
        d: jmp g\n  \
        g: jmp d\n  \
        c: jmp e\n  \
        e: jmp m\n  \
        m: jmp c\n\
        }\n";
    let proc = compile_through_ssa(source);

    assert_eq!(proc.blocks.len(), 7);
    assert_eq!(proc.blocks[0].name, "x");

    let scc_of = |name: &str| proc.blocks.iter().find(|b| b.name == name).unwrap().scc_component;
    assert_eq!(scc_of("d"), scc_of("g"));
    assert_eq!(scc_of("c"), scc_of("e"));
    assert_eq!(scc_of("e"), scc_of("m"));
    assert_ne!(scc_of("d"), scc_of("c"));
    assert_ne!(scc_of("x"), scc_of("b"));
    assert_ne!(scc_of("x"), scc_of("d"));
}

#[test]
fn s6_collapsed_jnz() {
    let source = "func one(a u64) u64 {\n  entry: jnz a, L, L\n  L:     ret a\n}\n";
    let proc = compile_one(source);

    let entry = &proc.blocks[0];
    assert!(matches!(entry.terminator, Terminator::Jmp));
    assert_eq!(entry.successors[1], None);
    assert!(entry.successors[0].is_some());
}
