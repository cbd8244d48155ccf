//! Reference interpreters for both bytecode forms (`spec.md` §4.8).
//!
//! These are not meant to be fast; they exist so a pass or the lifter can
//! be checked against "does the program still compute the same thing",
//! which is exactly how the property tests in `spec.md` §8 use them.

pub mod globals;
pub mod ir_emulator;
pub mod ssa_emulator;

pub use globals::{GlobalSlot, Globals};
pub use ir_emulator::run as run_ir;
pub use ssa_emulator::run as run_ssa;
