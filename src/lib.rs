//! This is the compiler frontend as a library. See `src/bin` for the
//! executable using this library.

// Because this is a library, allow dead code to make the inspection surface
// (fields only some callers read) easier to keep around.
#![allow(dead_code)]

pub mod back;
pub mod common;
pub mod front;
pub mod middle;

mod compile;

pub use common::Error;
pub use compile::{compile, Config};
