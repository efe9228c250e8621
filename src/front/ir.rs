//! The data model the parser builds and the later passes mutate in place
//! (spec §3). Every cross-reference is a plain index into one of the
//! `Procedure`'s owned vectors — arena-and-indices, not shared pointers
//! (spec §9 "Arena + indices vs. shared pointers").

use std::fmt;

use derive_more::Display;

use crate::common::{BlockRef, ConstIdx, LocalIdx, Map, SsaRegIdx};

/// A named primitive type. Only `u64` exists today; `i32`/`i64` are
/// anticipated (spec §3) and would be added as further `TypeKind` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    U64,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::U64 => write!(f, "u64"),
        }
    }
}

/// Two `Type`s are equal iff they are the same interned reference (spec §3).
/// `internment::Intern` gives us this for free, the same mechanism used to
/// intern identifiers (`common::Id`).
pub type Type = internment::Intern<TypeKind>;

/// The sole recognized type today.
pub fn type_u64() -> Type {
    Type::new(TypeKind::U64)
}

/// The operand-shape descriptor an `OpcodeType` carries for each of its
/// three operand slots (spec §3, drawn from this fixed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    Nil,
    Label,
    Local,
    Immediate,
}

/// One of the ten opcodes the IL recognizes (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Add,
    Addi,
    Sub,
    Mul,
    Set,
    Ret,
    Reti,
    Jmp,
    Jnz,
}

impl Opcode {
    /// The name used both in the IL's concrete syntax and in the
    /// pretty-printer's output.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Add => "add",
            Opcode::Addi => "addi",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Set => "set",
            Opcode::Ret => "ret",
            Opcode::Reti => "reti",
            Opcode::Jmp => "jmp",
            Opcode::Jnz => "jnz",
        }
    }

    /// The three-element operand-shape descriptor for this opcode (spec §3).
    pub fn shape(self) -> [OperandShape; 3] {
        use OperandShape::*;
        match self {
            Opcode::Nop => [Nil, Nil, Nil],
            Opcode::Add => [Local, Local, Local],
            Opcode::Addi => [Local, Local, Immediate],
            Opcode::Sub => [Local, Local, Local],
            Opcode::Mul => [Local, Local, Local],
            // `SET`'s source is `atom := local | immediate` (spec §4.2); the
            // shape table only distinguishes `Local`/`Immediate` for the
            // strict operand slots, so this records the more general of the
            // two and the parser (`atom_operand`) handles the alternative.
            Opcode::Set => [Local, Local, Nil],
            Opcode::Ret => [Local, Nil, Nil],
            Opcode::Reti => [Immediate, Nil, Nil],
            Opcode::Jmp => [Label, Nil, Nil],
            Opcode::Jnz => [Local, Label, Label],
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A tagged operand value (spec §3). The parser only ever emits `Nil`,
/// `Local`, `Constant` and `Block`; the SSA pass rewrites every `Local` into
/// a `Register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Nil,
    Local(LocalIdx),
    Register(SsaRegIdx),
    Constant(ConstIdx),
    Block(BlockRef),
}

impl Operand {
    pub fn is_nil(self) -> bool {
        matches!(self, Operand::Nil)
    }
}

/// A named storage slot within a procedure (spec §3). `generations` and
/// `last_ssa_reg` start at their zero values and are only meaningful once
/// the SSA pass has run.
#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub ty: Type,
    pub is_parameter: bool,
    /// Bumped by the SSA pass every time a new definition of this local is
    /// created. After SSA, equals `1 + number of SSA defs of this local`.
    pub generations: usize,
    /// The most recently defined SSA register owning this local, if any
    /// definition has happened yet.
    pub last_ssa_reg: Option<SsaRegIdx>,
}

impl Local {
    pub fn new(name: String, ty: Type, is_parameter: bool) -> Self {
        Local {
            name,
            ty,
            is_parameter,
            generations: 0,
            last_ssa_reg: None,
        }
    }
}

/// `{local_ref, generation}` (spec §3). Printed as `<local.name><generation>`
/// — see `back::print`, which has access to the owning `Procedure` and can
/// therefore resolve the local's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsaReg {
    pub local: LocalIdx,
    pub generation: usize,
}

/// `{opcode, operands}` (spec §3). Terminators are never stored here — they
/// live on the owning `BasicBlock` (spec §9 Open Questions: the
/// terminator-only design, not the source's redundant duplicate-`ret`
/// design).
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: [Operand; 3],
}

/// The control-transfer at the end of a block (spec §3). `Jnz`'s condition
/// operand and `Ret`'s return-value operand are carried inline; `Jmp` carries
/// none (its target lives in `BasicBlock::successors[0]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Terminator {
    #[display("ret")]
    Ret(Operand),
    #[display("jmp")]
    Jmp,
    #[display("jnz")]
    Jnz(Operand),
}

/// A maximal straight-line run of non-terminator instructions, ending in
/// exactly one terminator (spec §3, GLOSSARY).
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub name: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
    /// Index 0 is the fall-through / `jnz` true target / `jmp` target; index
    /// 1 is the `jnz` false target. `Jmp` populates only slot 0.
    pub successors: [Option<BlockRef>; 2],
    /// Rebuilt from scratch by the CFG pass; empty until then.
    pub predecessors: Vec<BlockRef>,
    /// Assigned by Tarjan's algorithm during the CFG pass.
    pub scc_component: usize,
    /// One SSA register per procedure local, in local-index order. Empty
    /// until the SSA pass runs.
    pub ssa_params: Vec<SsaRegIdx>,
    /// Argument lists passed to `successors[0]` and `successors[1]`.
    pub jmp_args: [Vec<SsaRegIdx>; 2],
}

impl BasicBlock {
    pub fn new(name: String) -> Self {
        BasicBlock {
            name,
            instructions: Vec::new(),
            terminator: Terminator::Jmp,
            successors: [None, None],
            predecessors: Vec::new(),
            scc_component: 0,
            ssa_params: Vec::new(),
            jmp_args: [Vec::new(), Vec::new()],
        }
    }

    /// The `RET`/`JNZ` operand carried by the terminator, or `Nil` for `JMP`
    /// — the `jmp_retval` the inspection surface of spec §6 names.
    pub fn jmp_retval(&self) -> Operand {
        match self.terminator {
            Terminator::Ret(op) | Terminator::Jnz(op) => op,
            Terminator::Jmp => Operand::Nil,
        }
    }

    /// The terminator's opcode name — the `jmp_code` the inspection surface
    /// of spec §6 names.
    pub fn jmp_code(&self) -> &'static str {
        match self.terminator {
            Terminator::Ret(_) => "ret",
            Terminator::Jmp => "jmp",
            Terminator::Jnz(_) => "jnz",
        }
    }
}

/// `{name, return_type, parameters (as a prefix of locals), locals,
/// constants, blocks, entry_point, ssa_regs}` (spec §3). Owns everything
/// reachable from it; block/local/SSA-register references are stable
/// indices, never borrows, so the vectors can grow freely while parsing.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub return_type: Type,
    /// Number of leading entries of `locals` that are parameters.
    pub parameter_count: usize,
    pub locals: Vec<Local>,
    /// Deduplicated ordered pool of 64-bit immediate values (spec §3).
    pub constants: Vec<u64>,
    pub blocks: Vec<BasicBlock>,
    pub entry_point: BlockRef,
    pub ssa_regs: Vec<SsaReg>,
}

impl Procedure {
    pub fn new(name: String, return_type: Type) -> Self {
        Procedure {
            name,
            return_type,
            parameter_count: 0,
            locals: Vec::new(),
            constants: Vec::new(),
            blocks: Vec::new(),
            entry_point: BlockRef(0),
            ssa_regs: Vec::new(),
        }
    }

    pub fn parameters(&self) -> &[Local] {
        &self.locals[..self.parameter_count]
    }

    pub fn block(&self, r: BlockRef) -> &BasicBlock {
        &self.blocks[r.0]
    }

    pub fn block_mut(&mut self, r: BlockRef) -> &mut BasicBlock {
        &mut self.blocks[r.0]
    }

    pub fn local(&self, idx: LocalIdx) -> &Local {
        &self.locals[idx.0]
    }

    /// Interns `value` into the constant pool, returning the (possibly
    /// pre-existing) index. Linear search — the pool is small and the
    /// dedup invariant (`constants[i] == constants[j] => i == j`) only needs
    /// equality, not a hash index (spec §4.2 "Constants").
    pub fn intern_constant(&mut self, value: u64) -> ConstIdx {
        if let Some(i) = self.constants.iter().position(|&c| c == value) {
            ConstIdx(i)
        } else {
            self.constants.push(value);
            ConstIdx(self.constants.len() - 1)
        }
    }

    /// `<local.name><generation>` (spec §3's printed form for an `SsaReg`).
    pub fn ssa_reg_name(&self, idx: SsaRegIdx) -> String {
        let reg = &self.ssa_regs[idx.0];
        let local = self.local(reg.local);
        format!("{}{}", local.name, reg.generation)
    }
}

/// A name-to-block-reference mapping patched in place as forward label
/// references get resolved (spec §4.2, §9 "Forward references with
/// back-patching").
pub type BlockDefs = Map<String, BlockRef>;
