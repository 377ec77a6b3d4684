use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
use crate::{DecodeError, EncodeError};

/// BACnet application tag numbers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationTag {
    Null = 0,
    Boolean = 1,
    UnsignedInt = 2,
    SignedInt = 3,
    Real = 4,
    Double = 5,
    OctetString = 6,
    CharacterString = 7,
    BitString = 8,
    Enumerated = 9,
    Date = 10,
    Time = 11,
    ObjectId = 12,
}

impl ApplicationTag {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Null),
            1 => Some(Self::Boolean),
            2 => Some(Self::UnsignedInt),
            3 => Some(Self::SignedInt),
            4 => Some(Self::Real),
            5 => Some(Self::Double),
            6 => Some(Self::OctetString),
            7 => Some(Self::CharacterString),
            8 => Some(Self::BitString),
            9 => Some(Self::Enumerated),
            10 => Some(Self::Date),
            11 => Some(Self::Time),
            12 => Some(Self::ObjectId),
            _ => None,
        }
    }

    /// Enum name used by the storage file format.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::UnsignedInt => "UnsignedInt",
            Self::SignedInt => "SignedInt",
            Self::Real => "Real",
            Self::Double => "Double",
            Self::OctetString => "OctetString",
            Self::CharacterString => "CharacterString",
            Self::BitString => "BitString",
            Self::Enumerated => "Enumerated",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::ObjectId => "ObjectId",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Null" => Some(Self::Null),
            "Boolean" => Some(Self::Boolean),
            "UnsignedInt" => Some(Self::UnsignedInt),
            "SignedInt" => Some(Self::SignedInt),
            "Real" => Some(Self::Real),
            "Double" => Some(Self::Double),
            "OctetString" => Some(Self::OctetString),
            "CharacterString" => Some(Self::CharacterString),
            "BitString" => Some(Self::BitString),
            "Enumerated" => Some(Self::Enumerated),
            "Date" => Some(Self::Date),
            "Time" => Some(Self::Time),
            "ObjectId" => Some(Self::ObjectId),
            _ => None,
        }
    }
}

/// A decoded tag byte: `NNNNCLLL` with extended-number and extended-length
/// forms, plus the open/close markers for constructed context values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Application { kind: ApplicationTag, len: u32 },
    Context { number: u8, len: u32 },
    Open { number: u8 },
    Close { number: u8 },
}

const CLASS_CONTEXT: u8 = 0b0000_1000;
const LEN_EXTENDED: u8 = 5;
const LEN_OPEN: u8 = 6;
const LEN_CLOSE: u8 = 7;

impl Tag {
    pub fn encode(self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        match self {
            Tag::Application { kind, len } => encode_tag(buf, kind as u8, false, len),
            Tag::Context { number, len } => encode_tag(buf, number, true, len),
            Tag::Open { number } => encode_marker(buf, number, LEN_OPEN),
            Tag::Close { number } => encode_marker(buf, number, LEN_CLOSE),
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let first = cur.take_u8()?;
        let context = (first & CLASS_CONTEXT) != 0;

        let mut number = first >> 4;
        if number == 0x0F {
            number = cur.take_u8()?;
        }

        let len_code = first & 0x07;
        if context {
            match len_code {
                LEN_OPEN => return Ok(Tag::Open { number }),
                LEN_CLOSE => return Ok(Tag::Close { number }),
                _ => {}
            }
        }

        let len = match len_code {
            0..=4 => u32::from(len_code),
            LEN_EXTENDED => match cur.take_u8()? {
                v @ 0..=253 => u32::from(v),
                254 => u32::from(cur.take_be_u16()?),
                255 => cur.take_be_u32()?,
            },
            _ => return Err(DecodeError::InvalidLength),
        };

        if context {
            Ok(Tag::Context { number, len })
        } else {
            Ok(Tag::Application {
                kind: ApplicationTag::from_u8(number).ok_or(DecodeError::InvalidTag)?,
                len,
            })
        }
    }

    /// Requires the next tag to close the constructed block `number`.
    pub fn expect_close(cur: &mut DecodeCursor<'_>, number: u8) -> Result<(), DecodeError> {
        match Tag::decode(cur)? {
            Tag::Close { number: n } if n == number => Ok(()),
            _ => Err(DecodeError::InvalidTag),
        }
    }

    /// Requires the next tag to open the constructed block `number`.
    pub fn expect_open(cur: &mut DecodeCursor<'_>, number: u8) -> Result<(), DecodeError> {
        match Tag::decode(cur)? {
            Tag::Open { number: n } if n == number => Ok(()),
            _ => Err(DecodeError::InvalidTag),
        }
    }
}

fn first_byte(number: u8, context: bool, len_code: u8) -> u8 {
    let mut byte = if number <= 14 { number << 4 } else { 0xF0 };
    if context {
        byte |= CLASS_CONTEXT;
    }
    byte | len_code
}

fn encode_tag(
    buf: &mut EncodeBuffer<'_>,
    number: u8,
    context: bool,
    len: u32,
) -> Result<(), EncodeError> {
    let len_code = if len <= 4 { len as u8 } else { LEN_EXTENDED };
    buf.push_u8(first_byte(number, context, len_code))?;
    if number > 14 {
        buf.push_u8(number)?;
    }
    if len_code == LEN_EXTENDED {
        if len <= 253 {
            buf.push_u8(len as u8)?;
        } else if len <= u32::from(u16::MAX) {
            buf.push_u8(254)?;
            buf.push_be_u16(len as u16)?;
        } else {
            buf.push_u8(255)?;
            buf.push_be_u32(len)?;
        }
    }
    Ok(())
}

fn encode_marker(buf: &mut EncodeBuffer<'_>, number: u8, len_code: u8) -> Result<(), EncodeError> {
    buf.push_u8(first_byte(number, true, len_code))?;
    if number > 14 {
        buf.push_u8(number)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ApplicationTag, Tag};
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};

    fn roundtrip(tag: Tag) -> Tag {
        let mut raw = [0u8; 16];
        let mut buf = EncodeBuffer::new(&mut raw);
        tag.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        Tag::decode(&mut cur).unwrap()
    }

    #[test]
    fn application_tag_roundtrip() {
        let tag = Tag::Application {
            kind: ApplicationTag::UnsignedInt,
            len: 3,
        };
        assert_eq!(roundtrip(tag), tag);
    }

    #[test]
    fn extended_number_and_length() {
        let tag = Tag::Context {
            number: 33,
            len: 1000,
        };
        assert_eq!(roundtrip(tag), tag);
    }

    #[test]
    fn open_close_markers() {
        assert_eq!(roundtrip(Tag::Open { number: 3 }), Tag::Open { number: 3 });
        assert_eq!(
            roundtrip(Tag::Close { number: 19 }),
            Tag::Close { number: 19 }
        );
    }

    #[test]
    fn known_wire_bytes() {
        // Enumerated 0x02 with one content byte: 0x91.
        let mut raw = [0u8; 4];
        let mut buf = EncodeBuffer::new(&mut raw);
        Tag::Application {
            kind: ApplicationTag::Enumerated,
            len: 1,
        }
        .encode(&mut buf)
        .unwrap();
        assert_eq!(buf.payload(), &[0x91]);
    }
}
