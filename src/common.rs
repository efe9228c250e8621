//! Common definitions that are shared between different parts of the compiler.

use derive_more::{Display, From};

// Use sorted sets and maps for consistent output (block/local iteration order
// matters for reverse-postorder dumps and for the "labels a, b, c" error
// message below).
pub use std::collections::{BTreeMap as Map, BTreeSet as Set};

/// Interned identifiers. `Type`s (see [`crate::front::ir::Type`]) are interned
/// with the same mechanism rather than names, since names do not need
/// reference equality.
pub type Id = internment::Intern<String>;

/// Index of a block within a [`crate::front::ir::Procedure`]'s block vector.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRef(pub usize);

/// Index of a local within a `Procedure`'s local vector.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalIdx(pub usize);

/// Index of an entry in a `Procedure`'s constant pool.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstIdx(pub usize);

/// Index of an SSA register within a `Procedure`'s SSA register vector.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SsaRegIdx(pub usize);

/// The crate-wide error type. Every pipeline stage funnels its own error type
/// into this one; the first error aborts the rest of `Compile` (spec §7).
///
/// The lexer itself never fails (spec §4.1: `ILLEGAL` is a valid token, not
/// an error) — lexical errors surface as `Error::Parse` once the parser
/// rejects an `ILLEGAL` token it advanced onto. The per-procedure callback
/// (spec §6) returns this same type directly, so a callback that runs the
/// CFG and SSA passes can propagate an `SsaError` with a plain `?`.
#[derive(Debug, Display, From)]
pub enum Error {
    #[display("{_0}")]
    Parse(crate::front::parse::ParseError),
    #[display("{_0}")]
    Ssa(crate::middle::ssa::SsaError),
}

impl std::error::Error for Error {}
