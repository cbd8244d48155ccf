//! Error types for every fallible boundary in the crate.
//!
//! Each stage (decode, lift, optimize, emulate) gets its own error enum so
//! callers can match on exactly the failure modes that stage can produce,
//! per the error-kinds table in the design document. None of these are
//! meant to be routed through `anyhow`-style erasure inside the crate;
//! an embedder that wants a single error type is free to wrap them.

use crate::ssa::value::VarId;
use thiserror::Error;

/// Failures decoding an IR or SSA instruction stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The opcode byte(s) at `offset` do not name a known instruction.
    #[error("unknown opcode 0x{opcode:04x} at byte offset {offset}")]
    UnknownOpcode { offset: u32, opcode: u16 },
    /// An instruction's immediate operand ran past the end of the stream.
    #[error("truncated immediate for opcode 0x{opcode:04x} at byte offset {offset}")]
    TruncatedImmediate { offset: u32, opcode: u16 },
    /// A `Custom`/`Bytes` type immediate referenced a type id the registry
    /// does not know about.
    #[error("unregistered custom type id {0}")]
    UnknownCustomType(u32),
}

/// Failures lifting an IR function body into SSA.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiftError {
    /// `popRaw` was asked for more bytes than the frame tracker holds.
    #[error("stack underflow: requested {requested} bytes, only {available} available")]
    StackUnderflow { requested: u32, available: u32 },
    /// The operand stack was non-empty (or the wrong shape) at `Ret`.
    #[error("function's operand stack was not balanced at return")]
    UnbalancedStackAtReturn,
    /// The underlying IR stream failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// An indirect call's local type does not carry a parseable mangled
    /// argument signature.
    #[error("local {0} is not a valid indirect-call target (bad mangled signature)")]
    BadIndirectCallTarget(u16),
}

/// Failures in an optimization pass (constant propagation, DCE, inlining).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    /// A use referenced a variable id not yet defined in this function.
    #[error("use of variable {0} before its definition")]
    UseBeforeDef(VarId),
    /// The underlying SSA stream failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The writer's backing buffer could not grow.
    #[error("allocation failure while emitting optimized stream")]
    OutOfMemory,
}

/// Failures while interpreting IR or SSA bytecode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmulateError {
    /// The value stack underflowed or overflowed its configured capacity.
    #[error("interpreter stack {0}")]
    StackFault(&'static str),
    /// A `Call`/`CallExt`/`CallInd`/`CallIndExt` referenced a module or
    /// function index that does not exist.
    #[error("call target (module {module}, function {function}) does not exist")]
    UnknownCallTarget { module: u16, function: u32 },
    /// Division or remainder by zero.
    #[error("division by zero")]
    DivideByZero,
    /// The underlying stream failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Lifting a callee to SSA on demand (`Loader::run_ssa`) failed.
    #[error(transparent)]
    Lift(#[from] LiftError),
}

/// Failures parsing a mangled indirect-call signature (`spec.md` Glossary).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MangleError {
    /// The string did not start with the fixed `A0:` prefix.
    #[error("mangled signature {0:?} is missing the A0: prefix")]
    MissingPrefix(String),
    /// A segment was neither `A<decimal>` nor `S<decimal>`.
    #[error("mangled signature {0:?} has a malformed argument segment")]
    MalformedSegment(String),
}

/// Failures resolving cross-function/cross-module references while
/// driving a whole module through the lifter or an emulator (`spec.md`
/// §6's hand-off contract).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No module at this index has been registered with the loader.
    #[error("unknown module index {0}")]
    UnknownModule(u16),
    /// The named module has no function at this index.
    #[error("module {module} has no function at index {function}")]
    UnknownFunction { module: u16, function: u32 },
    /// An imported name could not be resolved to a concrete function.
    #[error("unresolved import {0:?}")]
    UnresolvedImport(String),
    /// The underlying IR stream failed to decode while lifting.
    #[error(transparent)]
    Lift(#[from] LiftError),
}
