//! The mid-level passes that turn a freshly parsed `Procedure` into its
//! CFG-ordered, SSA form (spec §4.4, §4.5). Run in order by the caller's
//! per-procedure callback: `cfg::build` then `ssa::build`.

pub mod cfg;
pub mod ssa;
