//! SSA variable identifiers (`spec.md` §4.3, §5).
//!
//! The writer hands out a fresh id from a monotonic per-function counter
//! starting at 1 for every instruction that produces a value. Function
//! arguments are not allocated from that counter; they are referred to by a
//! pseudo-variable id with the high bit set, `index | 0x8000_0000`, so a
//! decoder can tell "the 3rd argument" from "the value numbered 3" without
//! a side table.

use std::fmt;

const ARGUMENT_BIT: u32 = 0x8000_0000;

/// A reference to an SSA value: either a numbered local (`spec.md` §5's
/// writer counter) or a function argument pseudo-variable.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    /// A local SSA value numbered `id` by the writer's counter.
    ///
    /// `id` must not have its high bit set; that range is reserved for
    /// argument pseudo-variables.
    pub fn local(id: u32) -> Self {
        assert!(id & ARGUMENT_BIT == 0, "local id {id:#x} collides with the argument bit");
        Self(id)
    }

    /// The pseudo-variable for the `index`-th function argument.
    pub fn argument(index: u32) -> Self {
        assert!(index & ARGUMENT_BIT == 0, "argument index {index:#x} is out of range");
        Self(index | ARGUMENT_BIT)
    }

    /// Constructs a `VarId` from its raw wire encoding, high bit and all.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw wire encoding: `index | 0x8000_0000` for an argument, the
    /// plain id otherwise.
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    pub const fn is_argument(self) -> bool {
        self.0 & ARGUMENT_BIT != 0
    }

    /// `Some(index)` if this is an argument pseudo-variable.
    pub const fn argument_index(self) -> Option<u32> {
        if self.is_argument() {
            Some(self.0 & !ARGUMENT_BIT)
        } else {
            None
        }
    }

    /// `Some(id)` if this is a local value, i.e. not an argument.
    pub const fn local_id(self) -> Option<u32> {
        if self.is_argument() {
            None
        } else {
            Some(self.0)
        }
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument_index() {
            Some(i) => write!(f, "arg{i}"),
            None => write!(f, "v{}", self.0),
        }
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Hands out fresh local [`VarId`]s from a monotonic counter starting at 1,
/// matching the writer's numbering rule (`spec.md` §5). Id 0 is never
/// issued so it stays free for sentinel use by callers that want one.
#[derive(Debug, Clone, Default)]
pub struct VarIdAllocator {
    next: u32,
}

impl VarIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn alloc(&mut self) -> VarId {
        let id = VarId::local(self.next);
        self.next += 1;
        id
    }

    /// The id that would be returned by the next [`VarIdAllocator::alloc`]
    /// call, without consuming it.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_and_local_ids_never_collide() {
        let a = VarId::argument(3);
        let l = VarId::local(3);
        assert_ne!(a, l);
        assert!(a.is_argument());
        assert!(!l.is_argument());
        assert_eq!(a.argument_index(), Some(3));
        assert_eq!(l.local_id(), Some(3));
    }

    #[test]
    fn raw_round_trips() {
        let a = VarId::argument(5);
        assert_eq!(VarId::from_raw(a.to_raw()), a);
    }

    #[test]
    fn allocator_starts_at_one_and_is_monotonic() {
        let mut alloc = VarIdAllocator::new();
        let first = alloc.alloc();
        let second = alloc.alloc();
        assert_eq!(first.local_id(), Some(1));
        assert_eq!(second.local_id(), Some(2));
    }
}
