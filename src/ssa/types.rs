//! Wire encoding of [`crate::types::TypeInfo`] within the SSA stream
//! (`spec.md` §4.3): one tag byte, whose bit 7 is the pointer flag and
//! whose low bits select a [`crate::types::PrimitiveTag`], optionally
//! followed by a 4-byte little-endian `aux` word for `Bytes`/`Custom`.

use crate::error::DecodeError;
use crate::types::{PrimitiveTag, TypeId, TypeInfo};

const POINTER_BIT: u8 = 0x80;

fn tag_byte(tag: PrimitiveTag) -> u8 {
    use PrimitiveTag::*;
    match tag {
        Void => 0,
        Bool => 1,
        I8 => 2,
        I16 => 3,
        I32 => 4,
        I64 => 5,
        U8 => 6,
        U16 => 7,
        U32 => 8,
        U64 => 9,
        F16 => 10,
        F32 => 11,
        F64 => 12,
        Char => 13,
        Bytes => 14,
        Custom => 15,
    }
}

fn tag_from_byte(b: u8) -> Option<PrimitiveTag> {
    use PrimitiveTag::*;
    Some(match b {
        0 => Void,
        1 => Bool,
        2 => I8,
        3 => I16,
        4 => I32,
        5 => I64,
        6 => U8,
        7 => U16,
        8 => U32,
        9 => U64,
        10 => F16,
        11 => F32,
        12 => F64,
        13 => Char,
        14 => Bytes,
        15 => Custom,
        _ => return None,
    })
}

fn has_aux(tag: PrimitiveTag) -> bool {
    matches!(tag, PrimitiveTag::Bytes | PrimitiveTag::Custom)
}

/// Appends the wire encoding of `ty` to `out`.
pub fn encode(ty: TypeInfo, out: &mut Vec<u8>) {
    let mut b = tag_byte(ty.tag());
    if ty.is_pointer() {
        b |= POINTER_BIT;
    }
    out.push(b);
    if has_aux(ty.tag()) {
        let aux = ty.bytes_len().or_else(|| ty.custom_type_id().map(TypeId::as_u32)).unwrap_or(0);
        out.extend_from_slice(&aux.to_le_bytes());
    }
}

/// Decodes a [`TypeInfo`] starting at `offset`, returning it and the number
/// of bytes consumed.
pub fn decode(bytes: &[u8], offset: usize) -> Result<(TypeInfo, usize), DecodeError> {
    let b = *bytes
        .get(offset)
        .ok_or(DecodeError::TruncatedImmediate { offset: offset as u32, opcode: 0 })?;
    let is_pointer = b & POINTER_BIT != 0;
    let tag = tag_from_byte(b & !POINTER_BIT)
        .ok_or(DecodeError::UnknownCustomType(b as u32))?;
    let (base, len) = if has_aux(tag) {
        let aux_bytes: [u8; 4] = bytes
            .get(offset + 1..offset + 5)
            .ok_or(DecodeError::TruncatedImmediate { offset: offset as u32, opcode: b as u16 })?
            .try_into()
            .expect("slice of length 4");
        let aux = u32::from_le_bytes(aux_bytes);
        let ty = match tag {
            PrimitiveTag::Bytes => TypeInfo::bytes(aux),
            PrimitiveTag::Custom => TypeInfo::custom(TypeId::from_u32(aux)),
            _ => unreachable!(),
        };
        (ty, 5)
    } else {
        let ty = match tag {
            PrimitiveTag::Void => TypeInfo::VOID,
            PrimitiveTag::Bool => TypeInfo::BOOL,
            PrimitiveTag::I8 => TypeInfo::I8,
            PrimitiveTag::I16 => TypeInfo::I16,
            PrimitiveTag::I32 => TypeInfo::I32,
            PrimitiveTag::I64 => TypeInfo::I64,
            PrimitiveTag::U8 => TypeInfo::U8,
            PrimitiveTag::U16 => TypeInfo::U16,
            PrimitiveTag::U32 => TypeInfo::U32,
            PrimitiveTag::U64 => TypeInfo::U64,
            PrimitiveTag::F16 => TypeInfo::F16,
            PrimitiveTag::F32 => TypeInfo::F32,
            PrimitiveTag::F64 => TypeInfo::F64,
            PrimitiveTag::Char => TypeInfo::CHAR,
            PrimitiveTag::Bytes | PrimitiveTag::Custom => unreachable!(),
        };
        (ty, 1)
    };
    Ok((base.with_pointer(is_pointer), len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fixed_size_types() {
        for ty in [TypeInfo::I32, TypeInfo::F64, TypeInfo::BOOL, TypeInfo::VOID] {
            let mut buf = vec![];
            encode(ty, &mut buf);
            let (decoded, len) = decode(&buf, 0).unwrap();
            assert_eq!(decoded, ty);
            assert_eq!(len, buf.len());
        }
    }

    #[test]
    fn round_trips_pointer_bit() {
        let ty = TypeInfo::I64.with_pointer(true);
        let mut buf = vec![];
        encode(ty, &mut buf);
        let (decoded, _) = decode(&buf, 0).unwrap();
        assert!(decoded.is_pointer());
        assert_eq!(decoded.fixed_size(), Some(8));
    }

    #[test]
    fn round_trips_bytes_and_custom_aux() {
        let bytes_ty = TypeInfo::bytes(37);
        let mut buf = vec![];
        encode(bytes_ty, &mut buf);
        assert_eq!(buf.len(), 5);
        let (decoded, _) = decode(&buf, 0).unwrap();
        assert_eq!(decoded.bytes_len(), Some(37));

        let custom_ty = TypeInfo::custom(TypeId::from_u32(9));
        buf.clear();
        encode(custom_ty, &mut buf);
        let (decoded, _) = decode(&buf, 0).unwrap();
        assert_eq!(decoded.custom_type_id(), Some(TypeId::from_u32(9)));
    }
}
