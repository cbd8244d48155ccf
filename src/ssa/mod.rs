//! The SSA companion form: a function's stack-bytecode body re-expressed as
//! a flat stream of SSA instructions (`spec.md` §4.3–§4.4).

pub mod opcode;
pub mod types;
pub mod value;
pub mod visitor;
pub mod writer;

pub use opcode::{BinOp, CompareShape, SsaOpcode};
pub use value::{VarId, VarIdAllocator};
pub use writer::{SsaBuffer, SsaWriter};
