//! Module-level global storage backing `PushGlobal*`/`PopGlobal*` (IR) and
//! `LoadGlobal*`/`StoreGlobal*` (SSA).
//!
//! `spec.md` leaves global variables as a named gap (§9): the opcode table
//! reserves the instructions but the reference semantics aren't spelled
//! out. We give each global a fixed-size byte cell, sized and typed at
//! module-build time, addressed by a dense index — the same shape the
//! local-variable slots already use, just module-scoped instead of
//! function-scoped.

use crate::error::EmulateError;
use crate::types::TypeInfo;

/// One module-level global: its declared type and its current value,
/// stored as raw little-endian bytes sized to the type.
#[derive(Debug, Clone)]
pub struct GlobalSlot {
    pub ty: TypeInfo,
    bytes: Vec<u8>,
}

impl GlobalSlot {
    pub fn zeroed(ty: TypeInfo, size: u32) -> Self {
        Self {
            ty,
            bytes: vec![0u8; size as usize],
        }
    }

    pub fn ty(&self) -> TypeInfo {
        self.ty
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), EmulateError> {
        if data.len() != self.bytes.len() {
            return Err(EmulateError::StackFault("global write size mismatch"));
        }
        self.bytes.copy_from_slice(data);
        Ok(())
    }
}

/// A module's global table, indexed by the `u32` global index carried by
/// `PushGlobal*`/`PopGlobal*`/`LoadGlobal*`/`StoreGlobal*`.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    slots: Vec<GlobalSlot>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, slot: GlobalSlot) -> u32 {
        let idx = self.slots.len() as u32;
        self.slots.push(slot);
        idx
    }

    pub fn get(&self, index: u32) -> Option<&GlobalSlot> {
        self.slots.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut GlobalSlot> {
        self.slots.get_mut(index as usize)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_round_trips_through_write() {
        let mut g = GlobalSlot::zeroed(TypeInfo::I32, 4);
        g.write(&42i32.to_le_bytes()).unwrap();
        assert_eq!(i32::from_le_bytes(g.bytes().try_into().unwrap()), 42);
    }

    #[test]
    fn mismatched_write_size_errors() {
        let mut g = GlobalSlot::zeroed(TypeInfo::I32, 4);
        assert!(g.write(&[0u8; 2]).is_err());
    }

    #[test]
    fn globals_indices_are_dense_and_stable() {
        let mut globals = Globals::new();
        let a = globals.push(GlobalSlot::zeroed(TypeInfo::I32, 4));
        let b = globals.push(GlobalSlot::zeroed(TypeInfo::I64, 8));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(globals.get(b).unwrap().ty(), TypeInfo::I64);
    }
}
