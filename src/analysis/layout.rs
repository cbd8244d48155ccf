//! Per-variable layout: assigns each SSA value a byte offset in a packed
//! value frame, in definition order (`spec.md` §4.6).
//!
//! This is what lets an emulator or a future native backend lay out a
//! function's SSA values as a flat buffer instead of a `HashMap`, the same
//! way the IR side already packs locals into a byte frame.

use hashbrown::HashMap;

use crate::error::DecodeError;
use crate::ssa::value::VarId;
use crate::types::{TypeInfo, TypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub ty: TypeInfo,
    pub offset: u32,
    pub size: u32,
}

/// Maps every local [`VarId`] an SSA stream defines to a [`Slot`].
/// Argument pseudo-variables are not part of this layout; they live in the
/// emulator's separate argument register file.
#[derive(Debug, Clone, Default)]
pub struct VariableLayout {
    slots: HashMap<VarId, Slot>,
    total_size: u32,
}

impl VariableLayout {
    /// Builds a layout by packing `types` (in the iteration order given,
    /// which callers should make definition order) back to back.
    pub fn build(
        types: impl IntoIterator<Item = (VarId, TypeInfo)>,
        registry: &TypeRegistry,
    ) -> Result<Self, DecodeError> {
        let mut slots = HashMap::new();
        let mut offset = 0u32;
        for (id, ty) in types {
            let size = ty.size_of(registry)?;
            slots.insert(id, Slot { ty, offset, size });
            offset += size;
        }
        Ok(Self { slots, total_size: offset })
    }

    pub fn slot(&self, id: VarId) -> Option<Slot> {
        self.slots.get(&id).copied()
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::value::VarIdAllocator;

    #[test]
    fn slots_pack_back_to_back_in_given_order() {
        let registry = TypeRegistry::new();
        let mut alloc = VarIdAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        let layout = VariableLayout::build([(a, TypeInfo::I32), (b, TypeInfo::I64)], &registry).unwrap();
        assert_eq!(layout.slot(a).unwrap().offset, 0);
        assert_eq!(layout.slot(b).unwrap().offset, 4);
        assert_eq!(layout.total_size(), 12);
    }
}
