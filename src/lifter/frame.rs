//! Tracks the IR's raw byte stack as a sequence of `(value, byteSize)`
//! frames while the lifter walks a function body, plus the local and
//! argument slot tables the stack-indexed opcodes address (`spec.md`
//! §4.4).
//!
//! The IR stack is untyped bytes; the SSA form is typed values. Reading a
//! value of the requested type back out of the byte stack is
//! [`FrameTracker::pop_raw`] — the one place frame sizes and the
//! requested type can disagree, which is resolved with a `Join` (too few
//! bytes on top) or a `Split` (too many).

use smallvec::SmallVec;

use crate::error::LiftError;
use crate::ssa::value::VarId;
use crate::ssa::writer::SsaWriter;
use crate::types::{TypeInfo, TypeRegistry};

#[derive(Debug, Clone, Copy)]
struct Frame {
    value: VarId,
    size: u32,
}

/// Frame-stack and local/argument slot state for one function body being
/// lifted.
#[derive(Debug)]
pub struct FrameTracker {
    stack: Vec<Frame>,
    locals: Vec<Option<VarId>>,
    local_types: Vec<TypeInfo>,
    arguments: Vec<VarId>,
}

impl FrameTracker {
    pub fn new(local_types: Vec<TypeInfo>, argument_count: usize) -> Self {
        Self {
            stack: Vec::new(),
            locals: vec![None; local_types.len()],
            local_types,
            arguments: (0..argument_count as u32).map(VarId::argument).collect(),
        }
    }

    pub fn argument(&self, index: u16) -> Result<VarId, LiftError> {
        self.arguments
            .get(index as usize)
            .copied()
            .ok_or(LiftError::BadIndirectCallTarget(index))
    }

    /// Writes `value` back into argument slot `index` — arguments are a
    /// mutable slot array, not read-only (`PopArg`, and a call's result
    /// landing in argument register 0).
    pub fn set_argument(&mut self, index: u16, value: VarId) {
        self.arguments[index as usize] = value;
    }

    pub fn local_type(&self, index: u16) -> TypeInfo {
        self.local_types[index as usize]
    }

    pub fn local(&self, index: u16) -> Option<VarId> {
        self.locals[index as usize]
    }

    pub fn set_local(&mut self, index: u16, value: VarId) {
        self.locals[index as usize] = Some(value);
    }

    /// Pushes a freshly-produced value of `size` bytes onto the frame
    /// stack (the IR's `Push*` family, post-translation).
    pub fn push_raw(&mut self, value: VarId, size: u32) {
        self.stack.push(Frame { value, size });
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Reconstructs a value of `requested` type from the raw frame stack,
    /// emitting a `Join` if the top frames together fall short and a
    /// `Split` if the frame that finally reaches the requested size
    /// overshoots it (`spec.md` §4.4).
    pub fn pop_raw(
        &mut self,
        writer: &mut SsaWriter,
        requested: TypeInfo,
        registry: &TypeRegistry,
    ) -> Result<VarId, LiftError> {
        let requested_size = requested.size_of(registry)?;
        let mut collected: SmallVec<[Frame; 4]> = SmallVec::new();
        let mut total = 0u32;
        while total < requested_size {
            let frame = self.stack.pop().ok_or(LiftError::StackUnderflow {
                requested: requested_size,
                available: total,
            })?;
            total += frame.size;
            collected.push(frame);
        }

        if total == requested_size {
            return Ok(if collected.len() == 1 {
                collected[0].value
            } else {
                let parts: Vec<VarId> = collected.iter().rev().map(|f| f.value).collect();
                writer.write_join(requested, &parts)
            });
        }

        // Overshoot: the last frame popped (the one that pushed us past
        // the requested size) must be split into the bytes we still need
        // and a remainder that goes back on the stack for later pops.
        let last = collected.pop().expect("loop runs at least once");
        let overshoot = total - requested_size;
        let remainder_ty = TypeInfo::bytes(overshoot);
        let value_ty = if collected.is_empty() {
            requested
        } else {
            TypeInfo::bytes(last.size - overshoot)
        };
        let (value_part, remainder_part) = writer.write_split(value_ty, remainder_ty, last.value);
        self.stack.push(Frame { value: remainder_part, size: overshoot });

        if collected.is_empty() {
            Ok(value_part)
        } else {
            let mut parts: Vec<VarId> = collected.iter().rev().map(|f| f.value).collect();
            parts.push(value_part);
            Ok(writer.write_join(requested, &parts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::writer::SsaWriter;

    #[test]
    fn exact_size_pop_is_a_plain_read() {
        let mut tracker = FrameTracker::new(vec![], 0);
        let mut writer = SsaWriter::new();
        let registry = TypeRegistry::new();
        let v = writer.write_assign_literal(TypeInfo::I32, 7);
        tracker.push_raw(v, 4);
        let popped = tracker.pop_raw(&mut writer, TypeInfo::I32, &registry).unwrap();
        assert_eq!(popped, v);
    }

    #[test]
    fn undershoot_joins_multiple_frames() {
        let mut tracker = FrameTracker::new(vec![], 0);
        let mut writer = SsaWriter::new();
        let registry = TypeRegistry::new();
        let lo = writer.write_assign_literal(TypeInfo::I8, 1);
        let hi = writer.write_assign_literal(TypeInfo::I8, 2);
        tracker.push_raw(lo, 1);
        tracker.push_raw(hi, 1);
        let joined = tracker.pop_raw(&mut writer, TypeInfo::I16, &registry).unwrap();
        assert_eq!(writer.type_of(joined), Some(TypeInfo::I16));
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    fn overshoot_splits_and_leaves_a_remainder() {
        let mut tracker = FrameTracker::new(vec![], 0);
        let mut writer = SsaWriter::new();
        let registry = TypeRegistry::new();
        let wide = writer.write_assign_literal(TypeInfo::I32, 0x0102_0304);
        tracker.push_raw(wide, 4);
        let popped = tracker.pop_raw(&mut writer, TypeInfo::I16, &registry).unwrap();
        assert_ne!(popped, wide);
        assert_eq!(tracker.depth(), 1);
    }

    #[test]
    fn underflow_reports_requested_and_available() {
        let mut tracker = FrameTracker::new(vec![], 0);
        let mut writer = SsaWriter::new();
        let registry = TypeRegistry::new();
        let err = tracker.pop_raw(&mut writer, TypeInfo::I64, &registry).unwrap_err();
        assert_eq!(err, LiftError::StackUnderflow { requested: 8, available: 0 });
    }
}
