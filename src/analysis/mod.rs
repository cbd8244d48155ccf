//! Derived-fact visitors that attach analysis results to a function without
//! touching its bytecode (`spec.md` §4.6, §9's attachment-list design).

pub mod layout;
pub mod returntype;
pub mod usedef;

pub use layout::VariableLayout;
pub use returntype::ReturnTypeInfo;
pub use usedef::UseDefMap;
