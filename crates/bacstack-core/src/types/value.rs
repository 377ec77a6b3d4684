use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_signed_raw, decode_unsigned_raw, encode_signed_raw, encode_unsigned_raw, signed_len,
        unsigned_len,
    },
    tag::{ApplicationTag, Tag},
};
use crate::types::{BitString, Date, ErrorClass, ErrorCode, ObjectId, Time};
use crate::{DecodeError, EncodeError};

/// An application-layer value, owned.
///
/// Covers every application tag plus two shapes that appear alongside
/// plain values: `Constructed` for context-tagged blocks (object lists,
/// priority arrays on the wire) and `Error` for the per-property failure a
/// ReadPropertyMultiple answer can carry in place of a value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaggedValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Signed(i32),
    Real(f32),
    Double(f64),
    OctetString(Vec<u8>),
    CharacterString(String),
    BitString(BitString),
    Enumerated(u32),
    Date(Date),
    Time(Time),
    ObjectId(ObjectId),
    Constructed {
        tag_num: u8,
        values: Vec<TaggedValue>,
    },
    Error {
        class: ErrorClass,
        code: ErrorCode,
    },
}

impl TaggedValue {
    /// The application tag of this value, if it has one. `Constructed` and
    /// `Error` have none.
    pub const fn app_tag(&self) -> Option<ApplicationTag> {
        match self {
            Self::Null => Some(ApplicationTag::Null),
            Self::Boolean(_) => Some(ApplicationTag::Boolean),
            Self::Unsigned(_) => Some(ApplicationTag::UnsignedInt),
            Self::Signed(_) => Some(ApplicationTag::SignedInt),
            Self::Real(_) => Some(ApplicationTag::Real),
            Self::Double(_) => Some(ApplicationTag::Double),
            Self::OctetString(_) => Some(ApplicationTag::OctetString),
            Self::CharacterString(_) => Some(ApplicationTag::CharacterString),
            Self::BitString(_) => Some(ApplicationTag::BitString),
            Self::Enumerated(_) => Some(ApplicationTag::Enumerated),
            Self::Date(_) => Some(ApplicationTag::Date),
            Self::Time(_) => Some(ApplicationTag::Time),
            Self::ObjectId(_) => Some(ApplicationTag::ObjectId),
            Self::Constructed { .. } | Self::Error { .. } => None,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::Null => Tag::Application {
                kind: ApplicationTag::Null,
                len: 0,
            }
            .encode(buf),
            Self::Boolean(v) => Tag::Application {
                kind: ApplicationTag::Boolean,
                len: u32::from(*v),
            }
            .encode(buf),
            Self::Unsigned(v) => {
                Tag::Application {
                    kind: ApplicationTag::UnsignedInt,
                    len: unsigned_len(*v),
                }
                .encode(buf)?;
                encode_unsigned_raw(buf, *v).map(|_| ())
            }
            Self::Signed(v) => {
                Tag::Application {
                    kind: ApplicationTag::SignedInt,
                    len: signed_len(*v),
                }
                .encode(buf)?;
                encode_signed_raw(buf, *v).map(|_| ())
            }
            Self::Real(v) => {
                Tag::Application {
                    kind: ApplicationTag::Real,
                    len: 4,
                }
                .encode(buf)?;
                buf.push_slice(&v.to_bits().to_be_bytes())
            }
            Self::Double(v) => {
                Tag::Application {
                    kind: ApplicationTag::Double,
                    len: 8,
                }
                .encode(buf)?;
                buf.push_slice(&v.to_bits().to_be_bytes())
            }
            Self::OctetString(v) => {
                Tag::Application {
                    kind: ApplicationTag::OctetString,
                    len: slice_len(v.len())?,
                }
                .encode(buf)?;
                buf.push_slice(v)
            }
            Self::CharacterString(v) => {
                let bytes = v.as_bytes();
                Tag::Application {
                    kind: ApplicationTag::CharacterString,
                    len: slice_len(bytes.len() + 1)?,
                }
                .encode(buf)?;
                // Character set 0 = UTF-8 compatible.
                buf.push_u8(0)?;
                buf.push_slice(bytes)
            }
            Self::BitString(v) => {
                if v.unused_bits > 7 {
                    return Err(EncodeError::ValueOutOfRange);
                }
                Tag::Application {
                    kind: ApplicationTag::BitString,
                    len: slice_len(v.data.len() + 1)?,
                }
                .encode(buf)?;
                buf.push_u8(v.unused_bits)?;
                buf.push_slice(&v.data)
            }
            Self::Enumerated(v) => {
                Tag::Application {
                    kind: ApplicationTag::Enumerated,
                    len: unsigned_len(*v),
                }
                .encode(buf)?;
                encode_unsigned_raw(buf, *v).map(|_| ())
            }
            Self::Date(v) => {
                Tag::Application {
                    kind: ApplicationTag::Date,
                    len: 4,
                }
                .encode(buf)?;
                buf.push_slice(&v.octets())
            }
            Self::Time(v) => {
                Tag::Application {
                    kind: ApplicationTag::Time,
                    len: 4,
                }
                .encode(buf)?;
                buf.push_slice(&v.octets())
            }
            Self::ObjectId(v) => {
                Tag::Application {
                    kind: ApplicationTag::ObjectId,
                    len: 4,
                }
                .encode(buf)?;
                buf.push_be_u32(v.raw())
            }
            Self::Constructed { tag_num, values } => {
                Tag::Open { number: *tag_num }.encode(buf)?;
                for child in values {
                    child.encode(buf)?;
                }
                Tag::Close { number: *tag_num }.encode(buf)
            }
            // Error values only exist inside service-specific error blocks;
            // the service codec encodes those itself.
            Self::Error { .. } => Err(EncodeError::Message(
                "error values are not application data",
            )),
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let tag = Tag::decode(cur)?;
        Self::decode_from_tag(cur, tag)
    }

    pub fn decode_from_tag(cur: &mut DecodeCursor<'_>, tag: Tag) -> Result<Self, DecodeError> {
        match tag {
            Tag::Application {
                kind: ApplicationTag::Null,
                ..
            } => Ok(Self::Null),
            Tag::Application {
                kind: ApplicationTag::Boolean,
                len,
            } => Ok(Self::Boolean(len != 0)),
            Tag::Application {
                kind: ApplicationTag::UnsignedInt,
                len,
            } => Ok(Self::Unsigned(decode_unsigned_raw(cur, len as usize)?)),
            Tag::Application {
                kind: ApplicationTag::SignedInt,
                len,
            } => Ok(Self::Signed(decode_signed_raw(cur, len as usize)?)),
            Tag::Application {
                kind: ApplicationTag::Real,
                len: 4,
            } => Ok(Self::Real(f32::from_bits(cur.take_be_u32()?))),
            Tag::Application {
                kind: ApplicationTag::Double,
                len: 8,
            } => {
                let bytes = cur.take(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok(Self::Double(f64::from_bits(u64::from_be_bytes(raw))))
            }
            Tag::Application {
                kind: ApplicationTag::OctetString,
                len,
            } => Ok(Self::OctetString(cur.take(len as usize)?.to_vec())),
            Tag::Application {
                kind: ApplicationTag::CharacterString,
                len,
            } => {
                let s = crate::encoding::primitives::decode_character_string(cur, len as usize)?;
                Ok(Self::CharacterString(s.to_owned()))
            }
            Tag::Application {
                kind: ApplicationTag::BitString,
                len,
            } => {
                if len == 0 {
                    return Err(DecodeError::InvalidLength);
                }
                let raw = cur.take(len as usize)?;
                if raw[0] > 7 {
                    return Err(DecodeError::InvalidValue);
                }
                Ok(Self::BitString(BitString::new(raw[0], raw[1..].to_vec())))
            }
            Tag::Application {
                kind: ApplicationTag::Enumerated,
                len,
            } => Ok(Self::Enumerated(decode_unsigned_raw(cur, len as usize)?)),
            Tag::Application {
                kind: ApplicationTag::Date,
                len: 4,
            } => {
                let b = cur.take(4)?;
                Ok(Self::Date(Date::from_octets([b[0], b[1], b[2], b[3]])))
            }
            Tag::Application {
                kind: ApplicationTag::Time,
                len: 4,
            } => {
                let b = cur.take(4)?;
                Ok(Self::Time(Time::from_octets([b[0], b[1], b[2], b[3]])))
            }
            Tag::Application {
                kind: ApplicationTag::ObjectId,
                len: 4,
            } => Ok(Self::ObjectId(ObjectId::from_raw(cur.take_be_u32()?))),
            Tag::Open { number } => {
                let mut values = Vec::new();
                loop {
                    let child = Tag::decode(cur)?;
                    if child == (Tag::Close { number }) {
                        break;
                    }
                    values.push(Self::decode_from_tag(cur, child)?);
                }
                Ok(Self::Constructed {
                    tag_num: number,
                    values,
                })
            }
            _ => Err(DecodeError::InvalidTag),
        }
    }

    /// Decodes values until the cursor is exhausted.
    pub fn decode_list(cur: &mut DecodeCursor<'_>) -> Result<Vec<Self>, DecodeError> {
        let mut out = Vec::new();
        while !cur.is_empty() {
            out.push(Self::decode(cur)?);
        }
        Ok(out)
    }

    /// Decodes values until the closing tag `number`, consuming it.
    pub fn decode_until_close(
        cur: &mut DecodeCursor<'_>,
        number: u8,
    ) -> Result<Vec<Self>, DecodeError> {
        let mut out = Vec::new();
        loop {
            let tag = Tag::decode(cur)?;
            if tag == (Tag::Close { number }) {
                return Ok(out);
            }
            out.push(Self::decode_from_tag(cur, tag)?);
        }
    }
}

fn slice_len(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::ValueOutOfRange)
}
