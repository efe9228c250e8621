//! The recursive-descent parser (spec §4.2). Single-token lookahead; the
//! semantic duties of §4.3 (name resolution, redefinition checks, label
//! back-patching) are folded directly into the grammar methods rather than
//! kept as a second tree-walking pass, per the canonical design chosen in
//! `SPEC_FULL.md` §1.1.

use std::fmt;

use derive_more::Display;

use crate::common::{BlockRef, Error, LocalIdx, Map, Set};
use crate::front::ir::{type_u64, Local, Operand, Opcode, Procedure, Terminator, Type};
use crate::front::lex::{Lexer, Token, TokenKind};

#[derive(Display)]
#[display("{_0}")]
pub struct ParseError(String);

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for ParseError {}

/// A patch site recorded for a not-yet-defined label: the block whose
/// terminator refers to it, and which successor slot (0 or 1) to fill in
/// once the label's block is parsed (spec §4.2 "Labels with forward
/// references", spec §9 "Forward references with back-patching").
type PatchSite = (BlockRef, usize);

struct Parser<'input, 'cb> {
    lexer: Lexer<'input>,
    peek: Token<'input>,
    funcdefs: Set<String>,
    localdefs: Map<String, LocalIdx>,
    blockdefs: Map<String, BlockRef>,
    unresolved: Map<String, Vec<PatchSite>>,
    active: Procedure,
    on_procedure: &'cb mut dyn FnMut(&mut Procedure) -> Result<(), Error>,
}

/// Parses `source` (with `filename` used only for error messages) as a
/// sequence of procedure definitions, invoking `on_procedure` once each
/// procedure closes (spec §2, §6).
pub fn parse(
    filename: &str,
    source: &str,
    on_procedure: &mut dyn FnMut(&mut Procedure) -> Result<(), Error>,
) -> Result<(), Error> {
    let lexer = Lexer::new(filename, source);
    let mut parser = Parser {
        lexer,
        peek: Token { kind: TokenKind::Eof, line: 1, lexeme: "" },
        funcdefs: Set::new(),
        localdefs: Map::new(),
        blockdefs: Map::new(),
        unresolved: Map::new(),
        active: Procedure::new(String::new(), type_u64()),
        on_procedure,
    };
    parser.advance().map_err(Error::from)?;
    parser.unit()
}

impl<'input, 'cb> Parser<'input, 'cb> {
    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError(format!("{}:{}: {}", self.lexer.filename(), self.peek.line, message.into()))
    }

    fn unexpected(&self) -> ParseError {
        if self.peek.kind == TokenKind::Eof {
            self.error("unexpected end of file")
        } else {
            self.error(format!("unexpected symbol '{}'", self.peek.lexeme))
        }
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.peek = self.lexer.scan();
        if self.peek.kind == TokenKind::Illegal {
            return Err(self.error(format!("illegal character '{}'", self.peek.lexeme)));
        }
        Ok(())
    }

    fn accept(&mut self, kind: TokenKind) -> Result<bool, ParseError> {
        if self.peek.kind == kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'input>, ParseError> {
        let tok = self.peek;
        if tok.kind == kind {
            self.advance()?;
            Ok(tok)
        } else {
            Err(self.unexpected())
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        Ok(self.expect(TokenKind::Ident)?.lexeme.to_string())
    }

    fn typename(&mut self) -> Result<Type, ParseError> {
        if self.accept(TokenKind::U64)? {
            Ok(type_u64())
        } else {
            Err(self.unexpected())
        }
    }

    /// Parses a bare decimal/hex/binary/negative integer lexeme into its
    /// two's-complement `u64` bit pattern (spec §4.1 "Numbers").
    fn parse_integer_lexeme(lexeme: &str) -> Result<u64, std::num::ParseIntError> {
        let (negative, rest) = match lexeme.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, lexeme),
        };
        let (radix, digits) = if let Some(d) = rest.strip_prefix("0b") {
            (2, d)
        } else if let Some(d) = rest.strip_prefix("0x") {
            (16, d)
        } else {
            (10, rest)
        };
        let magnitude = i64::from_str_radix(digits, radix)?;
        let value = if negative { -magnitude } else { magnitude };
        Ok(value as u64)
    }

    fn register_local(&mut self, name: String, ty: Type, is_parameter: bool) -> Result<(), ParseError> {
        if self.localdefs.contains_key(&name) {
            return Err(self.error(format!("local {} is redefined here", name)));
        }
        let idx = LocalIdx(self.active.locals.len());
        self.active.locals.push(Local::new(name.clone(), ty, is_parameter));
        self.localdefs.insert(name, idx);
        Ok(())
    }

    fn lookup_local(&mut self, name: &str) -> Result<LocalIdx, ParseError> {
        self.localdefs
            .get(name)
            .copied()
            .ok_or_else(|| self.error(format!("undefined local '{}' referenced here", name)))
    }

    fn local_operand(&mut self) -> Result<Operand, ParseError> {
        let name = self.ident()?;
        Ok(Operand::Local(self.lookup_local(&name)?))
    }

    fn immediate_operand(&mut self) -> Result<Operand, ParseError> {
        let tok = self.expect(TokenKind::Integer)?;
        let value = Self::parse_integer_lexeme(tok.lexeme).map_err(|e| self.error(e.to_string()))?;
        Ok(Operand::Constant(self.active.intern_constant(value)))
    }

    /// `atom := local | immediate` (spec §4.2) — `SET`'s source operand.
    fn atom_operand(&mut self) -> Result<Operand, ParseError> {
        match self.peek.kind {
            TokenKind::Ident => self.local_operand(),
            TokenKind::Integer => self.immediate_operand(),
            _ => Err(self.unexpected()),
        }
    }

    fn comma(&mut self) -> Result<(), ParseError> {
        self.expect(TokenKind::Comma)?;
        Ok(())
    }

    /// Sets `successors[slot]` on `block` and re-checks the JNZ-collapsing
    /// rule (spec §4.2 "JNZ collapsing"), since the second of a `JNZ`'s two
    /// labels may resolve later than the first via back-patching.
    fn set_successor(&mut self, block: BlockRef, slot: usize, target: BlockRef) {
        self.active.blocks[block.0].successors[slot] = Some(target);
        self.maybe_collapse_jnz(block);
    }

    fn maybe_collapse_jnz(&mut self, block: BlockRef) {
        let b = &mut self.active.blocks[block.0];
        if matches!(b.terminator, Terminator::Jnz(_)) {
            if let (Some(t0), Some(t1)) = (b.successors[0], b.successors[1]) {
                if t0 == t1 {
                    b.terminator = Terminator::Jmp;
                    b.successors[1] = None;
                }
            }
        }
    }

    /// Resolves `name` against a successor slot of `block`: immediately if
    /// the label is already defined, or by recording a patch site for when
    /// it is (spec §4.2 "Labels with forward references").
    fn resolve_label(&mut self, name: String, block: BlockRef, slot: usize) {
        if let Some(&target) = self.blockdefs.get(&name) {
            self.set_successor(block, slot, target);
        } else {
            self.unresolved.entry(name).or_default().push((block, slot));
        }
    }

    fn patch_pending(&mut self, name: &str, target: BlockRef) {
        if let Some(sites) = self.unresolved.remove(name) {
            for (block, slot) in sites {
                self.set_successor(block, slot, target);
            }
        }
    }

    fn unresolved_labels_error(&self) -> ParseError {
        let names: Vec<&str> = self.unresolved.keys().map(String::as_str).collect();
        if names.len() == 1 {
            self.error(format!("unresolved reference to label {}", names[0]))
        } else {
            self.error(format!("unresolved references to labels {}", names.join(", ")))
        }
    }

    fn unit(&mut self) -> Result<(), Error> {
        while self.peek.kind != TokenKind::Eof {
            self.definition()?;
        }
        Ok(())
    }

    fn definition(&mut self) -> Result<(), Error> {
        self.expect(TokenKind::Func)?;
        self.function()
    }

    fn function(&mut self) -> Result<(), Error> {
        let name = self.ident()?;
        if self.funcdefs.contains(&name) {
            return Err(self.error(format!("function {} redefined here", name)).into());
        }
        self.expect(TokenKind::ParenL)?;

        self.active = Procedure::new(name.clone(), type_u64());
        self.localdefs.clear();
        self.blockdefs.clear();
        self.unresolved.clear();

        self.parameters()?;
        self.active.parameter_count = self.active.locals.len();

        let return_type = self.typename()?;
        self.active.return_type = return_type;

        self.expect(TokenKind::CurlyL)?;
        self.vars()?;
        self.blocks()?;
        self.expect(TokenKind::CurlyR)?;

        if !self.unresolved.is_empty() {
            return Err(self.unresolved_labels_error().into());
        }

        self.active.entry_point = BlockRef(0);
        self.funcdefs.insert(name);

        let mut procedure = std::mem::replace(&mut self.active, Procedure::new(String::new(), type_u64()));
        (self.on_procedure)(&mut procedure)
    }

    fn parameters(&mut self) -> Result<(), ParseError> {
        if self.accept(TokenKind::ParenR)? {
            return Ok(());
        }
        loop {
            let name = self.ident()?;
            let ty = self.typename()?;
            self.register_local(name, ty, true)?;
            if self.accept(TokenKind::Comma)? {
                continue;
            }
            self.expect(TokenKind::ParenR)?;
            return Ok(());
        }
    }

    fn vars(&mut self) -> Result<(), ParseError> {
        while self.accept(TokenKind::Var)? {
            let name = self.ident()?;
            let ty = self.typename()?;
            self.register_local(name, ty, false)?;
        }
        Ok(())
    }

    /// `block+` (spec §4.2) — at least one block, so the first call is
    /// unconditional and a `}` in its place surfaces the natural
    /// "unexpected symbol '}'" error (spec §8 "a procedure with zero
    /// blocks is rejected").
    fn blocks(&mut self) -> Result<(), ParseError> {
        self.block()?;
        while self.peek.kind != TokenKind::CurlyR {
            self.block()?;
        }
        Ok(())
    }

    fn block(&mut self) -> Result<(), ParseError> {
        let name = self.ident()?;
        self.expect(TokenKind::Colon)?;
        if self.blockdefs.contains_key(&name) {
            return Err(self.error(format!("block {} redefined here", name)));
        }
        let block_ref = BlockRef(self.active.blocks.len());
        self.active.blocks.push(crate::front::ir::BasicBlock::new(name.clone()));
        self.blockdefs.insert(name.clone(), block_ref);
        self.patch_pending(&name, block_ref);
        self.instructions(block_ref)
    }

    /// Consumes instructions until the block's terminator, per spec §4.2
    /// ("After a terminator, parsing for that block stops").
    fn instructions(&mut self, block: BlockRef) -> Result<(), ParseError> {
        loop {
            match self.peek.kind {
                TokenKind::Add => {
                    self.advance()?;
                    self.rrr(block, Opcode::Add)?;
                }
                TokenKind::Sub => {
                    self.advance()?;
                    self.rrr(block, Opcode::Sub)?;
                }
                TokenKind::Mul => {
                    self.advance()?;
                    self.rrr(block, Opcode::Mul)?;
                }
                TokenKind::Addi => {
                    self.advance()?;
                    self.rri(block, Opcode::Addi)?;
                }
                TokenKind::Set => {
                    self.advance()?;
                    self.set_instruction(block)?;
                }
                TokenKind::Ret => {
                    self.advance()?;
                    let value = self.local_operand()?;
                    self.active.blocks[block.0].terminator = Terminator::Ret(value);
                    return Ok(());
                }
                TokenKind::Reti => {
                    self.advance()?;
                    let value = self.immediate_operand()?;
                    self.active.blocks[block.0].terminator = Terminator::Ret(value);
                    return Ok(());
                }
                TokenKind::Jmp => {
                    self.advance()?;
                    let target = self.ident()?;
                    self.active.blocks[block.0].terminator = Terminator::Jmp;
                    self.resolve_label(target, block, 0);
                    return Ok(());
                }
                TokenKind::Jnz => {
                    self.advance()?;
                    let cond = self.local_operand()?;
                    self.comma()?;
                    let label_a = self.ident()?;
                    self.comma()?;
                    let label_b = self.ident()?;
                    self.active.blocks[block.0].terminator = Terminator::Jnz(cond);
                    self.resolve_label(label_a, block, 0);
                    self.resolve_label(label_b, block, 1);
                    return Ok(());
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn rrr(&mut self, block: BlockRef, opcode: Opcode) -> Result<(), ParseError> {
        let dst = self.local_operand()?;
        self.comma()?;
        let src1 = self.local_operand()?;
        self.comma()?;
        let src2 = self.local_operand()?;
        self.push_instruction(block, opcode, [dst, src1, src2]);
        Ok(())
    }

    fn rri(&mut self, block: BlockRef, opcode: Opcode) -> Result<(), ParseError> {
        let dst = self.local_operand()?;
        self.comma()?;
        let src = self.local_operand()?;
        self.comma()?;
        let imm = self.immediate_operand()?;
        self.push_instruction(block, opcode, [dst, src, imm]);
        Ok(())
    }

    fn set_instruction(&mut self, block: BlockRef) -> Result<(), ParseError> {
        let dst = self.local_operand()?;
        self.comma()?;
        let src = self.atom_operand()?;
        self.push_instruction(block, Opcode::Set, [dst, src, Operand::Nil]);
        Ok(())
    }

    fn push_instruction(&mut self, block: BlockRef, opcode: Opcode, operands: [Operand; 3]) {
        self.active.blocks[block.0].instructions.push(crate::front::ir::Instruction { opcode, operands });
    }
}
