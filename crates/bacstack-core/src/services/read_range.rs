use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_object_id, decode_ctx_unsigned, decode_opt_ctx_unsigned, decode_signed_raw,
        decode_unsigned_raw, encode_ctx_object_id, encode_ctx_unsigned, signed_len,
    },
    tag::{ApplicationTag, Tag},
};
use crate::types::{BitString, Date, ObjectId, PropertyId, PropertyRef, TaggedValue, Time};
use crate::{DecodeError, EncodeError};

/// Range selector for a ReadRange request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeSelector {
    /// Everything the property holds.
    All,
    ByPosition { reference_index: u32, count: i16 },
    BySequence { reference_sequence: u32, count: i16 },
    ByTime { date: Date, time: Time, count: i16 },
}

/// ReadRange request payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadRange {
    pub object_id: ObjectId,
    pub reference: PropertyRef,
    pub selector: RangeSelector,
}

impl ReadRange {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(buf, 0, self.object_id.raw())?;
        encode_ctx_unsigned(buf, 1, self.reference.property_id.to_u32())?;
        if let Some(index) = self.reference.wire_index() {
            encode_ctx_unsigned(buf, 2, index)?;
        }
        match self.selector {
            RangeSelector::All => Ok(()),
            RangeSelector::ByPosition {
                reference_index,
                count,
            } => {
                Tag::Open { number: 3 }.encode(buf)?;
                encode_app_unsigned_inline(buf, reference_index)?;
                encode_app_signed_inline(buf, i32::from(count))?;
                Tag::Close { number: 3 }.encode(buf)
            }
            RangeSelector::BySequence {
                reference_sequence,
                count,
            } => {
                Tag::Open { number: 6 }.encode(buf)?;
                encode_app_unsigned_inline(buf, reference_sequence)?;
                encode_app_signed_inline(buf, i32::from(count))?;
                Tag::Close { number: 6 }.encode(buf)
            }
            RangeSelector::ByTime { date, time, count } => {
                Tag::Open { number: 7 }.encode(buf)?;
                Tag::Application {
                    kind: ApplicationTag::Date,
                    len: 4,
                }
                .encode(buf)?;
                buf.push_slice(&date.octets())?;
                Tag::Application {
                    kind: ApplicationTag::Time,
                    len: 4,
                }
                .encode(buf)?;
                buf.push_slice(&time.octets())?;
                encode_app_signed_inline(buf, i32::from(count))?;
                Tag::Close { number: 7 }.encode(buf)
            }
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(cur, 1)?);
        let array_index = decode_opt_ctx_unsigned(cur, 2)?;
        let reference = PropertyRef::from_wire_index(property_id, array_index);

        if cur.is_empty() {
            return Ok(Self {
                object_id,
                reference,
                selector: RangeSelector::All,
            });
        }

        let selector = match Tag::decode(cur)? {
            Tag::Open { number: 3 } => {
                let reference_index = decode_app_unsigned_inline(cur)?;
                let count = decode_app_signed_inline(cur)?;
                Tag::expect_close(cur, 3)?;
                RangeSelector::ByPosition {
                    reference_index,
                    count,
                }
            }
            Tag::Open { number: 6 } => {
                let reference_sequence = decode_app_unsigned_inline(cur)?;
                let count = decode_app_signed_inline(cur)?;
                Tag::expect_close(cur, 6)?;
                RangeSelector::BySequence {
                    reference_sequence,
                    count,
                }
            }
            Tag::Open { number: 7 } => {
                let date = match Tag::decode(cur)? {
                    Tag::Application {
                        kind: ApplicationTag::Date,
                        len: 4,
                    } => {
                        let b = cur.take(4)?;
                        Date::from_octets([b[0], b[1], b[2], b[3]])
                    }
                    _ => return Err(DecodeError::InvalidTag),
                };
                let time = match Tag::decode(cur)? {
                    Tag::Application {
                        kind: ApplicationTag::Time,
                        len: 4,
                    } => {
                        let b = cur.take(4)?;
                        Time::from_octets([b[0], b[1], b[2], b[3]])
                    }
                    _ => return Err(DecodeError::InvalidTag),
                };
                let count = decode_app_signed_inline(cur)?;
                Tag::expect_close(cur, 7)?;
                RangeSelector::ByTime { date, time, count }
            }
            _ => return Err(DecodeError::InvalidTag),
        };
        Ok(Self {
            object_id,
            reference,
            selector,
        })
    }
}

/// ReadRange acknowledgement payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRangeAck {
    pub object_id: ObjectId,
    pub reference: PropertyRef,
    pub result_flags: BitString,
    pub item_count: u32,
    pub items: Vec<TaggedValue>,
    pub first_sequence_number: Option<u32>,
}

impl ReadRangeAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(buf, 0, self.object_id.raw())?;
        encode_ctx_unsigned(buf, 1, self.reference.property_id.to_u32())?;
        if let Some(index) = self.reference.wire_index() {
            encode_ctx_unsigned(buf, 2, index)?;
        }
        let len = u32::try_from(self.result_flags.data.len() + 1)
            .map_err(|_| EncodeError::ValueOutOfRange)?;
        Tag::Context { number: 3, len }.encode(buf)?;
        buf.push_u8(self.result_flags.unused_bits)?;
        buf.push_slice(&self.result_flags.data)?;
        encode_ctx_unsigned(buf, 4, self.item_count)?;
        Tag::Open { number: 5 }.encode(buf)?;
        for item in &self.items {
            item.encode(buf)?;
        }
        Tag::Close { number: 5 }.encode(buf)?;
        if let Some(first) = self.first_sequence_number {
            encode_ctx_unsigned(buf, 6, first)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(cur, 1)?);
        let array_index = decode_opt_ctx_unsigned(cur, 2)?;
        let result_flags = match Tag::decode(cur)? {
            Tag::Context { number: 3, len } if len >= 1 => {
                let raw = cur.take(len as usize)?;
                BitString::new(raw[0], raw[1..].to_vec())
            }
            _ => return Err(DecodeError::InvalidTag),
        };
        let item_count = decode_ctx_unsigned(cur, 4)?;
        Tag::expect_open(cur, 5)?;
        let items = TaggedValue::decode_until_close(cur, 5)?;
        let first_sequence_number = decode_opt_ctx_unsigned(cur, 6)?;
        Ok(Self {
            object_id,
            reference: PropertyRef::from_wire_index(property_id, array_index),
            result_flags,
            item_count,
            items,
            first_sequence_number,
        })
    }
}

fn encode_app_unsigned_inline(buf: &mut EncodeBuffer<'_>, value: u32) -> Result<(), EncodeError> {
    crate::encoding::primitives::encode_app_unsigned(buf, value)
}

fn decode_app_unsigned_inline(cur: &mut DecodeCursor<'_>) -> Result<u32, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::UnsignedInt,
            len,
        } => decode_unsigned_raw(cur, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

fn encode_app_signed_inline(buf: &mut EncodeBuffer<'_>, value: i32) -> Result<(), EncodeError> {
    Tag::Application {
        kind: ApplicationTag::SignedInt,
        len: signed_len(value),
    }
    .encode(buf)?;
    crate::encoding::primitives::encode_signed_raw(buf, value)?;
    Ok(())
}

fn decode_app_signed_inline(cur: &mut DecodeCursor<'_>) -> Result<i16, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::SignedInt,
            len,
        } => {
            let value = decode_signed_raw(cur, len as usize)?;
            i16::try_from(value).map_err(|_| DecodeError::InvalidValue)
        }
        _ => Err(DecodeError::InvalidTag),
    }
}

#[cfg(test)]
mod tests {
    use super::{RangeSelector, ReadRange, ReadRangeAck};
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::{
        BitString, ObjectId, ObjectType, PropertyId, PropertyRef, TaggedValue,
    };

    #[test]
    fn by_position_roundtrip() {
        let req = ReadRange {
            object_id: ObjectId::new(ObjectType::TrendLog, 1),
            reference: PropertyRef::whole(PropertyId::Proprietary(131)),
            selector: RangeSelector::ByPosition {
                reference_index: 1,
                count: -50,
            },
        };
        let mut raw = [0u8; 64];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ReadRange::decode(&mut cur).unwrap(), req);
    }

    #[test]
    fn whole_range_roundtrip() {
        let req = ReadRange {
            object_id: ObjectId::new(ObjectType::TrendLog, 1),
            reference: PropertyRef::whole(PropertyId::Proprietary(131)),
            selector: RangeSelector::All,
        };
        let mut raw = [0u8; 32];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ReadRange::decode(&mut cur).unwrap(), req);
    }

    #[test]
    fn ack_roundtrip() {
        let ack = ReadRangeAck {
            object_id: ObjectId::new(ObjectType::TrendLog, 1),
            reference: PropertyRef::whole(PropertyId::Proprietary(131)),
            result_flags: BitString::new(5, vec![0b1010_0000]),
            item_count: 2,
            items: vec![TaggedValue::Real(1.0), TaggedValue::Real(2.0)],
            first_sequence_number: Some(77),
        };
        let mut raw = [0u8; 128];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ReadRangeAck::decode(&mut cur).unwrap(), ack);
    }
}
