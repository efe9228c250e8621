//! The crude, block-argument SSA pass (spec §4.5). Grounded directly in
//! `genssa.go`'s `reallycrudessa`: every block takes one parameter per
//! local regardless of liveness (spec §9 Open Questions — not optimized
//! here, by design), and operands are rewritten right-to-left across slots
//! 2, 1, 0 so that `x = x + y` reads the old generation of `x` before
//! defining a new one.

use std::fmt;

use derive_more::Display;

use crate::common::LocalIdx;
use crate::front::ir::{Operand, Procedure, SsaReg, Terminator};

#[derive(Display)]
#[display("{_0}")]
pub struct SsaError(String);

impl fmt::Debug for SsaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for SsaError {}

/// Allocates a fresh SSA register for `local`'s current generation, bumps
/// the generation counter, and records it as the local's latest definition.
fn define(proc: &mut Procedure, local: LocalIdx) -> crate::common::SsaRegIdx {
    let generation = proc.locals[local.0].generations;
    let reg = crate::common::SsaRegIdx(proc.ssa_regs.len());
    proc.ssa_regs.push(SsaReg { local, generation });
    proc.locals[local.0].generations += 1;
    proc.locals[local.0].last_ssa_reg = Some(reg);
    reg
}

/// The SSA register currently standing in for `local` — always defined,
/// since every block defines a parameter for every local before any of its
/// instructions run (spec §4.5 step 1).
fn use_reg(proc: &Procedure, local: LocalIdx) -> crate::common::SsaRegIdx {
    proc.locals[local.0]
        .last_ssa_reg
        .expect("every local has a block-entry parameter before any use")
}

/// Walks `proc.blocks` in their current (CFG-ordered) sequence, renaming
/// every `Local` operand to a `Register` (spec §4.5).
pub fn build(proc: &mut Procedure) -> Result<(), SsaError> {
    let num_locals = proc.locals.len();

    for block_idx in 0..proc.blocks.len() {
        let mut params = Vec::with_capacity(num_locals);
        for local_idx in 0..num_locals {
            params.push(define(proc, LocalIdx(local_idx)));
        }
        proc.blocks[block_idx].ssa_params = params;

        for instr_idx in 0..proc.blocks[block_idx].instructions.len() {
            for slot in [2usize, 1usize] {
                if let Operand::Local(l) = proc.blocks[block_idx].instructions[instr_idx].operands[slot] {
                    let reg = use_reg(proc, l);
                    proc.blocks[block_idx].instructions[instr_idx].operands[slot] = Operand::Register(reg);
                }
            }

            match proc.blocks[block_idx].instructions[instr_idx].operands[0] {
                Operand::Local(l) => {
                    let reg = define(proc, l);
                    proc.blocks[block_idx].instructions[instr_idx].operands[0] = Operand::Register(reg);
                }
                Operand::Nil => {}
                _ => return Err(SsaError(format!("{}: invalid destination type", proc.name))),
            }
        }

        for local_idx in 0..num_locals {
            let reg = use_reg(proc, LocalIdx(local_idx));
            let successors = proc.blocks[block_idx].successors;
            for (slot, succ) in successors.iter().enumerate() {
                if succ.is_some() {
                    proc.blocks[block_idx].jmp_args[slot].push(reg);
                }
            }
        }

        proc.blocks[block_idx].terminator = match proc.blocks[block_idx].terminator {
            Terminator::Ret(Operand::Local(l)) => Terminator::Ret(Operand::Register(use_reg(proc, l))),
            Terminator::Jnz(Operand::Local(l)) => Terminator::Jnz(Operand::Register(use_reg(proc, l))),
            other => other,
        };

        log::trace!("{}: block {} got {} ssa params", proc.name, proc.blocks[block_idx].name, num_locals);
    }

    log::debug!("{}: ssa built, {} registers defined", proc.name, proc.ssa_regs.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BlockRef, ConstIdx};
    use crate::front::ir::{type_u64, BasicBlock, Instruction, Local, Opcode};
    use crate::front::parse;
    use crate::middle::cfg;

    fn build_procedure(source: &str) -> Procedure {
        let mut result = None;
        parse("t", source, &mut |p| {
            result = Some(p.clone());
            Ok(())
        })
        .expect("parses");
        let mut proc = result.expect("one procedure");
        cfg::build(&mut proc);
        build(&mut proc).expect("ssa builds");
        proc
    }

    #[test]
    fn s2_arithmetic_with_constant() {
        let proc = build_procedure("func plusone(a u64) u64 {\n  var b u64\n  entry:\n    addi b, a, 1\n    ret b\n}\n");
        let block = &proc.blocks[0];
        assert_eq!(block.ssa_params.len(), 2);
        assert_eq!(proc.ssa_reg_name(block.ssa_params[0]), "a0");
        assert_eq!(proc.ssa_reg_name(block.ssa_params[1]), "b0");

        let instr = &block.instructions[0];
        assert_eq!(instr.opcode, Opcode::Addi);
        assert_eq!(proc.ssa_reg_name(match instr.operands[0] {
            Operand::Register(r) => r,
            _ => panic!("expected register"),
        }), "b1");
        assert!(matches!(instr.operands[2], Operand::Constant(_)));

        match block.terminator {
            Terminator::Ret(Operand::Register(r)) => assert_eq!(proc.ssa_reg_name(r), "b1"),
            _ => panic!("expected register return"),
        }
    }

    #[test]
    fn every_operand_after_ssa_is_register_constant_or_nil() {
        let proc = build_procedure("func f(a u64) u64 {\n  var b u64\n  entry: addi b, a, 1\n  ret b\n}\n");
        for block in &proc.blocks {
            for instr in &block.instructions {
                assert!(matches!(instr.operands[0], Operand::Register(_) | Operand::Nil));
                for slot in [1, 2] {
                    assert!(matches!(instr.operands[slot], Operand::Register(_) | Operand::Constant(_) | Operand::Nil));
                }
            }
        }
    }

    #[test]
    fn block_params_and_jmp_args_cover_every_local() {
        let proc = build_procedure("func f(a u64) u64 {\n  entry: jmp done\n  done: ret a\n}\n");
        for block in &proc.blocks {
            assert_eq!(block.ssa_params.len(), proc.locals.len());
            for slot in 0..2 {
                if block.successors[slot].is_some() {
                    assert_eq!(block.jmp_args[slot].len(), proc.locals.len());
                }
            }
        }
    }

    #[test]
    fn invalid_destination_is_an_error() {
        let mut proc = Procedure::new("f".to_string(), type_u64());
        proc.locals.push(Local::new("a".to_string(), type_u64(), false));
        let mut block = BasicBlock::new("entry".to_string());
        block.instructions.push(Instruction {
            opcode: Opcode::Set,
            operands: [Operand::Constant(ConstIdx(0)), Operand::Nil, Operand::Nil],
        });
        block.terminator = Terminator::Ret(Operand::Local(LocalIdx(0)));
        proc.blocks.push(block);
        proc.entry_point = BlockRef(0);

        let err = build(&mut proc).unwrap_err();
        assert!(err.to_string().contains("invalid destination type"));
    }
}
