//! The top-level driver (spec §2, §6): builds a lexer, drives the parser,
//! and invokes the caller's per-procedure callback once each procedure has
//! been parsed. The callback typically runs the CFG pass and then the SSA
//! pass before returning.

use crate::common::Error;
use crate::front::{parse, Procedure};

/// What to compile, and what the caller wants done with each procedure once
/// it finishes parsing (spec §6's conceptual `Compile` signature).
pub struct Config<'a> {
    pub source: &'a str,
    pub filename: &'a str,
    pub on_procedure: &'a mut dyn FnMut(&mut Procedure) -> Result<(), Error>,
}

/// Parses `config.source` as a sequence of procedure definitions, calling
/// `config.on_procedure` once each procedure closes. The first error —
/// whether from parsing or from the callback — aborts the rest of the unit
/// (spec §7): no further procedures are parsed once one fails.
pub fn compile(config: Config) -> Result<(), Error> {
    parse(config.filename, config.source, config.on_procedure)
}
