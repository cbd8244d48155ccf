//! The SSA instruction opcode set (`spec.md` §4.3).
//!
//! Unlike the IR opcodes, the SSA wire format is internal: it only needs to
//! be stable across passes within one process, never across versions of
//! this crate or against another implementation. The numeric values below
//! are therefore ours to assign; they follow the source's grouping (binary
//! ops, compares, casts, memory, control) without reproducing its literal
//! table, and the three-way compare split (`CompVtoV`/`CompVtoI`/`CompItoV`)
//! the spec calls for is represented as three distinct variants rather than
//! folded into one binary-op variant the way the source does it.

use crate::error::DecodeError;
use crate::ir::opcode::CompareCondition;

/// An arithmetic or comparison operator carried by a binary SSA instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::Mul,
            3 => Self::Div,
            _ => return None,
        })
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Add => 0,
            Self::Sub => 1,
            Self::Mul => 2,
            Self::Div => 3,
        }
    }
}

macro_rules! ssa_opcodes {
    ($($(#[$meta:meta])* $name:ident = $val:expr,)*) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum SsaOpcode {
            $($(#[$meta])* $name = $val,)*
        }

        impl SsaOpcode {
            pub fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $($val => Some(Self::$name),)*
                    _ => None,
                }
            }
        }
    };
}

ssa_opcodes! {
    Nop = 0x00,
    /// Binds a variable id to the value of another (`spec.md`'s constant
    /// propagation "Variable" linkage flows through this instruction).
    AssignVariable = 0x01,
    /// Binds a variable id to an immediate literal.
    AssignLiteral = 0x02,
    /// Reads through a pointer-typed variable into a fresh value.
    Load = 0x10,
    LoadGlobal = 0x11,
    LoadGlobalExt = 0x12,
    /// Writes a value through a pointer-typed variable. Side-effecting.
    Store = 0x13,
    StoreGlobal = 0x14,
    StoreGlobalExt = 0x15,
    ExpandSX = 0x20,
    ExpandZX = 0x21,
    Trunc = 0x22,
    BinOpVtoV = 0x30,
    BinOpVtoI = 0x31,
    BinOpItoV = 0x32,
    CompVtoV = 0x40,
    CompVtoI = 0x41,
    CompItoV = 0x42,
    ComputePtr = 0x50,
    /// Merges several frame-stack fragments into one value of the
    /// requested type (`spec.md` §4.4's lifter `popRaw`).
    Join = 0x60,
    /// Splits one frame-stack fragment that overshoots the requested type
    /// into the requested value plus a remainder.
    Split = 0x61,
    Call = 0x70,
    CallExt = 0x71,
    CallInd = 0x72,
    CallIndExt = 0x73,
    Ret = 0x7E,
    Jump = 0x7F,
    JumpTrue = 0x80,
    JumpFalse = 0x81,
}

impl SsaOpcode {
    pub fn decode(bytes: &[u8], offset: usize) -> Result<(Self, usize), DecodeError> {
        let b0 = *bytes
            .get(offset)
            .ok_or(DecodeError::TruncatedImmediate { offset: offset as u32, opcode: 0 })?;
        Self::from_u8(b0)
            .map(|op| (op, 1))
            .ok_or(DecodeError::UnknownOpcode { offset: offset as u32, opcode: b0 as u16 })
    }
}

/// The three shapes a comparison instruction can take, depending on whether
/// each operand is a variable or a literal (`spec.md` §4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareShape {
    VariableToVariable,
    VariableToLiteral,
    LiteralToVariable,
}

impl CompareShape {
    pub fn opcode(self) -> SsaOpcode {
        match self {
            Self::VariableToVariable => SsaOpcode::CompVtoV,
            Self::VariableToLiteral => SsaOpcode::CompVtoI,
            Self::LiteralToVariable => SsaOpcode::CompItoV,
        }
    }
}

pub use CompareCondition as SsaCompareCondition;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binop_round_trips() {
        for op in [BinOp::Add, BinOp::Sub, BinOp::Mul, BinOp::Div] {
            assert_eq!(BinOp::from_u8(op.to_u8()), Some(op));
        }
    }

    #[test]
    fn decode_unknown_byte_fails() {
        let err = SsaOpcode::decode(&[0xFF], 0).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownOpcode { .. }));
    }

    #[test]
    fn compare_shapes_map_to_distinct_opcodes() {
        assert_eq!(CompareShape::VariableToVariable.opcode(), SsaOpcode::CompVtoV);
        assert_eq!(CompareShape::VariableToLiteral.opcode(), SsaOpcode::CompVtoI);
        assert_eq!(CompareShape::LiteralToVariable.opcode(), SsaOpcode::CompItoV);
    }
}
