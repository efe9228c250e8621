//! Renders a `Procedure` back to the textual form used by the CLI's
//! `--emit ir`/`--emit ssa` output and by the scenario tests (spec §4.6).
//! Grounded in `print.go`'s `printproc`.

use std::fmt::Write as _;

use crate::common::SsaRegIdx;
use crate::front::ir::{BasicBlock, Operand, Procedure, Terminator};

/// Prints the full textual form of `proc`: signature, `var` declarations,
/// then each block with its SSA parameter list, instructions, and
/// terminator.
pub fn print(proc: &Procedure) -> String {
    let mut out = String::new();

    write!(out, "func {}(", proc.name).unwrap();
    for (i, param) in proc.parameters().iter().enumerate() {
        if i > 0 {
            write!(out, ", ").unwrap();
        }
        write!(out, "{} {}", param.name, param.ty).unwrap();
    }
    writeln!(out, ") {} {{", proc.return_type).unwrap();

    for local in &proc.locals[proc.parameter_count..] {
        writeln!(out, "  var {} {}", local.name, local.ty).unwrap();
    }

    for block in &proc.blocks {
        print_block(&mut out, proc, block);
    }

    writeln!(out, "}}").unwrap();
    out
}

fn print_block(out: &mut String, proc: &Procedure, block: &BasicBlock) {
    write!(out, "  {}(", block.name).unwrap();
    write_regs(out, proc, &block.ssa_params);
    writeln!(out, "):").unwrap();

    for instr in &block.instructions {
        write!(out, "    {}", instr.opcode).unwrap();
        let operands: Vec<String> =
            instr.operands.iter().filter(|op| !op.is_nil()).map(|op| operand_str(proc, *op)).collect();
        if !operands.is_empty() {
            write!(out, " {}", operands.join(", ")).unwrap();
        }
        writeln!(out).unwrap();
    }

    match block.terminator {
        Terminator::Ret(value) => {
            writeln!(out, "    ret {}", operand_str(proc, value)).unwrap();
        }
        Terminator::Jmp => {
            let target = block.successors[0].expect("a JMP terminator always has successors[0]");
            write!(out, "    jmp {}(", proc.block(target).name).unwrap();
            write_regs(out, proc, &block.jmp_args[0]);
            writeln!(out, ")").unwrap();
        }
        Terminator::Jnz(cond) => {
            let t0 = block.successors[0].expect("an unsimplified JNZ always has successors[0]");
            let t1 = block.successors[1].expect("an unsimplified JNZ always has successors[1]");
            write!(out, "    jnz {}, {}(", operand_str(proc, cond), proc.block(t0).name).unwrap();
            write_regs(out, proc, &block.jmp_args[0]);
            write!(out, "), {}(", proc.block(t1).name).unwrap();
            write_regs(out, proc, &block.jmp_args[1]);
            writeln!(out, ")").unwrap();
        }
    }
}

fn write_regs(out: &mut String, proc: &Procedure, regs: &[SsaRegIdx]) {
    for (i, reg) in regs.iter().enumerate() {
        if i > 0 {
            write!(out, ", ").unwrap();
        }
        write!(out, "{}", proc.ssa_reg_name(*reg)).unwrap();
    }
}

fn operand_str(proc: &Procedure, op: Operand) -> String {
    match op {
        Operand::Nil => String::new(),
        Operand::Local(idx) => proc.local(idx).name.clone(),
        Operand::Register(idx) => proc.ssa_reg_name(idx),
        Operand::Constant(idx) => format!("0x{:x}", proc.constants[idx.0]),
        Operand::Block(idx) => proc.block(idx).name.clone(),
    }
}
