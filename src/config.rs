//! Crate-wide configuration knobs.
//!
//! `spec.md` fixes most of the interesting behavior, but a few numbers are
//! left to the embedder (emulator resource limits) or are convenience
//! toggles over the optimizer pipeline. This mirrors the teacher's practice
//! of keeping such knobs in one small `Config`-like struct with a `Default`
//! rather than scattering magic numbers through the passes.

/// Default size, in bytes, of the IR emulator's value stack (§4.8).
pub const DEFAULT_STACK_BYTES: usize = 16 * 1024 * 1024;

/// Default number of 8-byte argument registers (§4.8).
pub const DEFAULT_ARG_REGISTERS: usize = 64;

/// Tunable limits and pass toggles shared by the emulators and the
/// convenience [`crate::opt::optimize`] pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Size of the emulator's byte stack.
    pub stack_bytes: usize,
    /// Number of argument registers in the emulator's register file.
    pub arg_registers: usize,
    /// Whether [`crate::opt::optimize`] runs dead-code elimination after
    /// constant propagation.
    pub run_dce: bool,
    /// Whether [`crate::opt::optimize`] attempts call-site inlining.
    pub run_inline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_bytes: DEFAULT_STACK_BYTES,
            arg_registers: DEFAULT_ARG_REGISTERS,
            run_dce: true,
            run_inline: true,
        }
    }
}
