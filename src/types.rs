//! The primitive type tag, the compound `TypeInfo` value, and the registry
//! of custom (aggregate) types (`spec.md` §4.1).
//!
//! The source models "is this a pointer" as a stolen bit on a pointer value;
//! we follow the teacher's rewrite note (`spec.md` §9, "Pointer tagging on
//! `TypeInfo`") and carry it as an explicit `bool` alongside the tag instead.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use hashbrown::HashMap;

use crate::entity::entity_id;
use crate::error::DecodeError;

entity_id! {
    /// A dense id for a registered [`CustomTypeDescriptor`].
    ///
    /// Assigned from a process-wide monotonic counter (`spec.md` §5), not
    /// from any one [`TypeRegistry`]'s own insertion order — two registries
    /// in the same process never hand out the same id.
    pub struct TypeId("type");
}

/// The primitive type tag (`spec.md` §3).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveTag {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
    Char,
    /// A raw byte blob of `aux` bytes. Only meaningful in a [`TypeInfo`]
    /// whose `aux` field carries the length.
    Bytes,
    /// A registered aggregate type. `aux` carries the [`TypeId`].
    Custom,
}

impl fmt::Display for PrimitiveTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::Bytes => "bytes",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// A fully-formed type: a tag, an auxiliary payload meaningful only for
/// `Bytes`/`Custom`, and an independent pointer bit (`spec.md` §4.1).
///
/// Pointer-variants of the same base are not equal to the base; they are a
/// distinct compound value, but pointer-ness is tracked as one bit rather
/// than doubling the tag set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    tag: PrimitiveTag,
    aux: u32,
    is_pointer: bool,
}

impl TypeInfo {
    pub const VOID: Self = Self::new(PrimitiveTag::Void);
    pub const BOOL: Self = Self::new(PrimitiveTag::Bool);
    pub const I8: Self = Self::new(PrimitiveTag::I8);
    pub const I16: Self = Self::new(PrimitiveTag::I16);
    pub const I32: Self = Self::new(PrimitiveTag::I32);
    pub const I64: Self = Self::new(PrimitiveTag::I64);
    pub const U8: Self = Self::new(PrimitiveTag::U8);
    pub const U16: Self = Self::new(PrimitiveTag::U16);
    pub const U32: Self = Self::new(PrimitiveTag::U32);
    pub const U64: Self = Self::new(PrimitiveTag::U64);
    pub const F16: Self = Self::new(PrimitiveTag::F16);
    pub const F32: Self = Self::new(PrimitiveTag::F32);
    pub const F64: Self = Self::new(PrimitiveTag::F64);
    pub const CHAR: Self = Self::new(PrimitiveTag::Char);

    const fn new(tag: PrimitiveTag) -> Self {
        Self {
            tag,
            aux: 0,
            is_pointer: false,
        }
    }

    /// A raw `n`-byte blob type.
    pub const fn bytes(n: u32) -> Self {
        Self {
            tag: PrimitiveTag::Bytes,
            aux: n,
            is_pointer: false,
        }
    }

    /// A reference to a registered custom type.
    pub const fn custom(id: TypeId) -> Self {
        Self {
            tag: PrimitiveTag::Custom,
            aux: id.as_u32(),
            is_pointer: false,
        }
    }

    pub const fn tag(&self) -> PrimitiveTag {
        self.tag
    }

    pub const fn is_pointer(&self) -> bool {
        self.is_pointer
    }

    /// Returns the pointer-qualified (or dequalified) variant of `self`.
    pub const fn with_pointer(self, is_pointer: bool) -> Self {
        Self { is_pointer, ..self }
    }

    /// The custom type id carried by a `Custom` type. `None` for anything
    /// else, including `Bytes`.
    pub fn custom_type_id(&self) -> Option<TypeId> {
        matches!(self.tag, PrimitiveTag::Custom).then(|| TypeId::from_u32(self.aux))
    }

    /// The byte length carried by a `Bytes` type.
    pub fn bytes_len(&self) -> Option<u32> {
        matches!(self.tag, PrimitiveTag::Bytes).then_some(self.aux)
    }

    /// The value size in bytes, per the fixed-size table in `spec.md` §3.
    /// `Custom` requires a registry lookup; use [`TypeInfo::size_of`].
    pub fn fixed_size(&self) -> Option<u32> {
        use PrimitiveTag::*;
        let base = match self.tag {
            Void => 0,
            Bool | I8 | U8 | Char => 1,
            I16 | U16 | F16 => 2,
            I32 | U32 | F32 => 4,
            I64 | U64 | F64 => 8,
            Bytes => self.aux,
            Custom => return None,
        };
        Some(if self.is_pointer { 8 } else { base })
    }

    /// The value size in bytes, resolving `Custom` against `registry`.
    pub fn size_of(&self, registry: &TypeRegistry) -> Result<u32, DecodeError> {
        if self.is_pointer {
            return Ok(8);
        }
        match self.fixed_size() {
            Some(n) => Ok(n),
            None => {
                let id = self.custom_type_id().expect("Custom type must carry an id");
                Ok(registry.lookup(id).ok_or(DecodeError::UnknownCustomType(id.as_u32()))?.size_bytes)
            }
        }
    }
}

/// One named field of a registered aggregate type.
///
/// The source models this as a singly-linked, order-preserving chain; a
/// `Vec` gives the same append-order iteration with none of the manual
/// pointer-chasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDebugInfo {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

/// Optional debug metadata for a custom type: a name plus its field layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeDebugInfo {
    pub name: Option<String>,
    pub fields: Vec<FieldDebugInfo>,
}

impl TypeDebugInfo {
    /// Appends a field, computing its offset as the running sum of the
    /// sizes of the fields already appended.
    pub fn push_field(&mut self, name: impl Into<String>, size: u32) {
        let offset = self.fields.iter().map(|f| f.size).sum();
        self.fields.push(FieldDebugInfo {
            name: name.into(),
            offset,
            size,
        });
    }
}

/// A registered custom (aggregate) type's full descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTypeDescriptor {
    pub id: TypeId,
    pub size_bytes: u32,
    pub debug: Option<TypeDebugInfo>,
}

static NEXT_TYPE_ID: AtomicU32 = AtomicU32::new(0);

/// Maps [`TypeId`] to its [`CustomTypeDescriptor`]. Immutable after module
/// load by contract with the lifter (`spec.md` §3); nothing here enforces
/// that beyond not exposing a way to mutate an already-registered entry.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<TypeId, CustomTypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new custom type of `size_bytes`, returning its fresh id.
    ///
    /// The id comes from a process-wide atomic counter, so ids assigned by
    /// distinct `TypeRegistry` instances in the same process never collide.
    pub fn register(&mut self, size_bytes: u32) -> TypeId {
        self.register_with_debug(size_bytes, None)
    }

    /// As [`TypeRegistry::register`], additionally attaching debug info.
    pub fn register_with_debug(&mut self, size_bytes: u32, debug: Option<TypeDebugInfo>) -> TypeId {
        let id = TypeId::from_u32(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed));
        self.types.insert(
            id,
            CustomTypeDescriptor {
                id,
                size_bytes,
                debug,
            },
        );
        id
    }

    pub fn lookup(&self, id: TypeId) -> Option<&CustomTypeDescriptor> {
        self.types.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_bit_is_independent_of_tag() {
        let i32_ty = TypeInfo::I32;
        let i32_ptr = i32_ty.with_pointer(true);
        assert_ne!(i32_ty, i32_ptr);
        assert_eq!(i32_ptr.fixed_size(), Some(8));
        assert_eq!(i32_ty.fixed_size(), Some(4));
        assert!(!i32_ty.is_pointer());
        assert!(i32_ptr.is_pointer());
    }

    #[test]
    fn fixed_sizes_match_spec_table() {
        assert_eq!(TypeInfo::VOID.fixed_size(), Some(0));
        assert_eq!(TypeInfo::BOOL.fixed_size(), Some(1));
        assert_eq!(TypeInfo::I8.fixed_size(), Some(1));
        assert_eq!(TypeInfo::CHAR.fixed_size(), Some(1));
        assert_eq!(TypeInfo::I16.fixed_size(), Some(2));
        assert_eq!(TypeInfo::F16.fixed_size(), Some(2));
        assert_eq!(TypeInfo::I32.fixed_size(), Some(4));
        assert_eq!(TypeInfo::F32.fixed_size(), Some(4));
        assert_eq!(TypeInfo::I64.fixed_size(), Some(8));
        assert_eq!(TypeInfo::F64.fixed_size(), Some(8));
        assert_eq!(TypeInfo::bytes(13).fixed_size(), Some(13));
    }

    #[test]
    fn registry_assigns_dense_monotonic_ids() {
        let mut reg = TypeRegistry::new();
        let a = reg.register(4);
        let b = reg.register(8);
        assert!(a.as_u32() < b.as_u32());
        assert_eq!(reg.lookup(b).unwrap().size_bytes, 8);
    }

    #[test]
    fn custom_type_size_resolves_through_registry() {
        let mut reg = TypeRegistry::new();
        let id = reg.register(24);
        let ty = TypeInfo::custom(id);
        assert_eq!(ty.size_of(&reg).unwrap(), 24);
    }

    #[test]
    fn debug_field_offsets_are_running_sums() {
        let mut debug = TypeDebugInfo::default();
        debug.push_field("x", 4);
        debug.push_field("y", 8);
        debug.push_field("z", 1);
        assert_eq!(debug.fields[0].offset, 0);
        assert_eq!(debug.fields[1].offset, 4);
        assert_eq!(debug.fields[2].offset, 12);
    }
}
