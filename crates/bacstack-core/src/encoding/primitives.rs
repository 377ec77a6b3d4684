//! Raw primitive packers and the context-tagged helpers used by the
//! service codecs. Application-tagged values are handled by
//! [`TaggedValue`](crate::types::TaggedValue).

use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    tag::{ApplicationTag, Tag},
};
use crate::{DecodeError, EncodeError};

/// Minimal-length big-endian unsigned, 1 to 4 bytes.
pub fn unsigned_len(value: u32) -> u32 {
    match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

pub fn encode_unsigned_raw(buf: &mut EncodeBuffer<'_>, value: u32) -> Result<u32, EncodeError> {
    let len = unsigned_len(value);
    buf.push_slice(&value.to_be_bytes()[(4 - len as usize)..])?;
    Ok(len)
}

pub fn decode_unsigned_raw(cur: &mut DecodeCursor<'_>, len: usize) -> Result<u32, DecodeError> {
    if len == 0 || len > 4 {
        return Err(DecodeError::InvalidLength);
    }
    let mut value = 0u32;
    for &b in cur.take(len)? {
        value = (value << 8) | u32::from(b);
    }
    Ok(value)
}

/// Minimal-length two's-complement signed, 1 to 4 bytes.
pub fn signed_len(value: i32) -> u32 {
    if (-0x80..=0x7F).contains(&value) {
        1
    } else if (-0x8000..=0x7FFF).contains(&value) {
        2
    } else if (-0x80_0000..=0x7F_FFFF).contains(&value) {
        3
    } else {
        4
    }
}

pub fn encode_signed_raw(buf: &mut EncodeBuffer<'_>, value: i32) -> Result<u32, EncodeError> {
    let len = signed_len(value);
    buf.push_slice(&value.to_be_bytes()[(4 - len as usize)..])?;
    Ok(len)
}

pub fn decode_signed_raw(cur: &mut DecodeCursor<'_>, len: usize) -> Result<i32, DecodeError> {
    if len == 0 || len > 4 {
        return Err(DecodeError::InvalidLength);
    }
    let bytes = cur.take(len)?;
    let fill = if (bytes[0] & 0x80) != 0 { 0xFF } else { 0x00 };
    let mut out = [fill; 4];
    out[4 - len..].copy_from_slice(bytes);
    Ok(i32::from_be_bytes(out))
}

pub fn encode_ctx_unsigned(
    buf: &mut EncodeBuffer<'_>,
    number: u8,
    value: u32,
) -> Result<(), EncodeError> {
    Tag::Context {
        number,
        len: unsigned_len(value),
    }
    .encode(buf)?;
    encode_unsigned_raw(buf, value)?;
    Ok(())
}

pub fn encode_ctx_signed(
    buf: &mut EncodeBuffer<'_>,
    number: u8,
    value: i32,
) -> Result<(), EncodeError> {
    Tag::Context {
        number,
        len: signed_len(value),
    }
    .encode(buf)?;
    encode_signed_raw(buf, value)?;
    Ok(())
}

pub fn encode_ctx_object_id(
    buf: &mut EncodeBuffer<'_>,
    number: u8,
    raw: u32,
) -> Result<(), EncodeError> {
    Tag::Context { number, len: 4 }.encode(buf)?;
    buf.push_be_u32(raw)
}

pub fn encode_ctx_enumerated(
    buf: &mut EncodeBuffer<'_>,
    number: u8,
    value: u32,
) -> Result<(), EncodeError> {
    encode_ctx_unsigned(buf, number, value)
}

pub fn encode_ctx_boolean(
    buf: &mut EncodeBuffer<'_>,
    number: u8,
    value: bool,
) -> Result<(), EncodeError> {
    // Context-class booleans carry one content byte, unlike the
    // application form which folds the value into the length field.
    Tag::Context { number, len: 1 }.encode(buf)?;
    buf.push_u8(u8::from(value))
}

/// Character strings carry a one-byte character-set prefix; only set 0
/// (UTF-8 compatible) is produced or accepted.
pub fn encode_ctx_character_string(
    buf: &mut EncodeBuffer<'_>,
    number: u8,
    value: &str,
) -> Result<(), EncodeError> {
    let bytes = value.as_bytes();
    let len =
        u32::try_from(bytes.len() + 1).map_err(|_| EncodeError::ValueOutOfRange)?;
    Tag::Context { number, len }.encode(buf)?;
    buf.push_u8(0)?;
    buf.push_slice(bytes)
}

pub fn decode_character_string<'a>(
    cur: &mut DecodeCursor<'a>,
    len: usize,
) -> Result<&'a str, DecodeError> {
    if len == 0 {
        return Err(DecodeError::InvalidLength);
    }
    let raw = cur.take(len)?;
    if raw[0] != 0 {
        return Err(DecodeError::Unsupported);
    }
    core::str::from_utf8(&raw[1..]).map_err(|_| DecodeError::InvalidValue)
}

pub fn decode_ctx_unsigned(cur: &mut DecodeCursor<'_>, number: u8) -> Result<u32, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Context { number: n, len } if n == number => decode_unsigned_raw(cur, len as usize),
        _ => Err(DecodeError::MissingRequired),
    }
}

pub fn decode_ctx_object_id(cur: &mut DecodeCursor<'_>, number: u8) -> Result<u32, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Context { number: n, len: 4 } if n == number => cur.take_be_u32(),
        Tag::Context { number: n, .. } if n == number => Err(DecodeError::InvalidLength),
        _ => Err(DecodeError::MissingRequired),
    }
}

pub fn decode_ctx_character_string<'a>(
    cur: &mut DecodeCursor<'a>,
    number: u8,
) -> Result<&'a str, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Context { number: n, len } if n == number => {
            decode_character_string(cur, len as usize)
        }
        _ => Err(DecodeError::MissingRequired),
    }
}

/// Decodes an optional context unsigned, advancing only on a match.
pub fn decode_opt_ctx_unsigned(
    cur: &mut DecodeCursor<'_>,
    number: u8,
) -> Result<Option<u32>, DecodeError> {
    if !cur.peek_context_tag(number) {
        return Ok(None);
    }
    decode_ctx_unsigned(cur, number).map(Some)
}

pub fn encode_app_unsigned(buf: &mut EncodeBuffer<'_>, value: u32) -> Result<(), EncodeError> {
    Tag::Application {
        kind: ApplicationTag::UnsignedInt,
        len: unsigned_len(value),
    }
    .encode(buf)?;
    encode_unsigned_raw(buf, value)?;
    Ok(())
}

pub fn encode_app_enumerated(buf: &mut EncodeBuffer<'_>, value: u32) -> Result<(), EncodeError> {
    Tag::Application {
        kind: ApplicationTag::Enumerated,
        len: unsigned_len(value),
    }
    .encode(buf)?;
    encode_unsigned_raw(buf, value)?;
    Ok(())
}

pub fn decode_app_unsigned(cur: &mut DecodeCursor<'_>) -> Result<u32, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::UnsignedInt,
            len,
        } => decode_unsigned_raw(cur, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

pub fn decode_app_enumerated(cur: &mut DecodeCursor<'_>) -> Result<u32, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::Enumerated,
            len,
        } => decode_unsigned_raw(cur, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn unsigned_roundtrip(v in any::<u32>()) {
            let mut raw = [0u8; 8];
            let mut buf = EncodeBuffer::new(&mut raw);
            let len = encode_unsigned_raw(&mut buf, v).unwrap();
            let mut cur = DecodeCursor::new(buf.payload());
            prop_assert_eq!(decode_unsigned_raw(&mut cur, len as usize).unwrap(), v);
        }

        #[test]
        fn signed_roundtrip(v in any::<i32>()) {
            let mut raw = [0u8; 8];
            let mut buf = EncodeBuffer::new(&mut raw);
            let len = encode_signed_raw(&mut buf, v).unwrap();
            let mut cur = DecodeCursor::new(buf.payload());
            prop_assert_eq!(decode_signed_raw(&mut cur, len as usize).unwrap(), v);
        }

        #[test]
        fn ctx_unsigned_roundtrip(v in any::<u32>(), n in 0u8..14) {
            let mut raw = [0u8; 16];
            let mut buf = EncodeBuffer::new(&mut raw);
            encode_ctx_unsigned(&mut buf, n, v).unwrap();
            let mut cur = DecodeCursor::new(buf.payload());
            prop_assert_eq!(decode_ctx_unsigned(&mut cur, n).unwrap(), v);
        }
    }

    #[test]
    fn signed_sign_extension() {
        let mut raw = [0u8; 8];
        let mut buf = EncodeBuffer::new(&mut raw);
        encode_signed_raw(&mut buf, -2).unwrap();
        assert_eq!(buf.payload(), &[0xFE]);
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(decode_signed_raw(&mut cur, 1).unwrap(), -2);
    }

    #[test]
    fn character_string_charset_prefix() {
        let mut raw = [0u8; 32];
        let mut buf = EncodeBuffer::new(&mut raw);
        encode_ctx_character_string(&mut buf, 3, "AHU-1").unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(decode_ctx_character_string(&mut cur, 3).unwrap(), "AHU-1");
    }

    #[test]
    fn optional_probe_leaves_cursor_alone() {
        let mut raw = [0u8; 8];
        let mut buf = EncodeBuffer::new(&mut raw);
        encode_ctx_unsigned(&mut buf, 1, 7).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(decode_opt_ctx_unsigned(&mut cur, 0).unwrap(), None);
        assert_eq!(decode_opt_ctx_unsigned(&mut cur, 1).unwrap(), Some(7));
    }
}
