//! The stack-bytecode IR: the opcode table, a writer, a decoding visitor,
//! and the `Function`/`Module` containers that hold a bytecode body
//! (`spec.md` §4.1–§4.2).

pub mod function;
pub mod module;
pub mod opcode;
pub mod visitor;
pub mod writer;

pub use function::{FunctionFlags, IrFunction, ModuleId};
pub use module::{ImportDescriptor, IrModule, ModuleList};
pub use opcode::{CompareCondition, Opcode};
pub use writer::IrWriter;
