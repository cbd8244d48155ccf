//! The attachment list: a small ordered table of derived, optional facts
//! hung off an [`crate::ir::function::IrFunction`] (`spec.md` §9,
//! "Attachment list").
//!
//! The source keys these by a runtime type tag in an intrusive list; an
//! enum with one variant per attachment kind gives the same "at most one
//! of each kind, looked up by kind" behavior with no unsafe downcasting.

use crate::analysis::{ReturnTypeInfo, UseDefMap, VariableLayout};
use crate::ssa::writer::SsaBuffer;

/// One attachment a function can carry. `attach` replaces any existing
/// entry of the same kind rather than accumulating duplicates.
#[derive(Debug, Clone)]
pub enum Attachment {
    /// The function's lifted SSA form, produced by [`crate::lifter`].
    SsaBytecode(SsaBuffer),
    /// The writer's id counter at the point the SSA form was finalized,
    /// kept so a later pass can keep allocating fresh ids without
    /// colliding with ones already in use.
    SsaNextId(u32),
    ReturnType(ReturnTypeInfo),
    VariableLayout(VariableLayout),
    UseDef(UseDefMap),
}

impl Attachment {
    fn discriminant(&self) -> u8 {
        match self {
            Attachment::SsaBytecode(_) => 0,
            Attachment::SsaNextId(_) => 1,
            Attachment::ReturnType(_) => 2,
            Attachment::VariableLayout(_) => 3,
            Attachment::UseDef(_) => 4,
        }
    }
}

/// An ordered, small table of a function's attachments.
#[derive(Debug, Clone, Default)]
pub struct AttachmentList {
    entries: Vec<Attachment>,
}

impl AttachmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `attachment`, replacing any existing entry of the same kind.
    pub fn attach(&mut self, attachment: Attachment) {
        let d = attachment.discriminant();
        self.entries.retain(|a| a.discriminant() != d);
        self.entries.push(attachment);
    }

    pub fn ssa_bytecode(&self) -> Option<&SsaBuffer> {
        self.entries.iter().find_map(|a| match a {
            Attachment::SsaBytecode(b) => Some(b),
            _ => None,
        })
    }

    pub fn ssa_next_id(&self) -> Option<u32> {
        self.entries.iter().find_map(|a| match a {
            Attachment::SsaNextId(n) => Some(*n),
            _ => None,
        })
    }

    pub fn return_type(&self) -> Option<&ReturnTypeInfo> {
        self.entries.iter().find_map(|a| match a {
            Attachment::ReturnType(r) => Some(r),
            _ => None,
        })
    }

    pub fn variable_layout(&self) -> Option<&VariableLayout> {
        self.entries.iter().find_map(|a| match a {
            Attachment::VariableLayout(l) => Some(l),
            _ => None,
        })
    }

    pub fn use_def(&self) -> Option<&UseDefMap> {
        self.entries.iter().find_map(|a| match a {
            Attachment::UseDef(u) => Some(u),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaching_the_same_kind_twice_replaces_it() {
        let mut list = AttachmentList::new();
        list.attach(Attachment::SsaNextId(1));
        list.attach(Attachment::SsaNextId(2));
        assert_eq!(list.len(), 1);
        assert_eq!(list.ssa_next_id(), Some(2));
    }

    #[test]
    fn distinct_kinds_coexist() {
        let mut list = AttachmentList::new();
        list.attach(Attachment::SsaNextId(1));
        list.attach(Attachment::ReturnType(ReturnTypeInfo::Void));
        assert_eq!(list.len(), 2);
    }
}
