use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_object_id, decode_ctx_unsigned, decode_opt_ctx_unsigned, encode_ctx_object_id,
        encode_ctx_unsigned,
    },
    tag::Tag,
};
use crate::types::{ObjectId, PropertyId, PropertyRef, TaggedValue};
use crate::{DecodeError, EncodeError};

/// ReadProperty request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProperty {
    pub object_id: ObjectId,
    pub reference: PropertyRef,
}

impl ReadProperty {
    pub fn new(object_id: ObjectId, property_id: PropertyId) -> Self {
        Self {
            object_id,
            reference: PropertyRef::whole(property_id),
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(buf, 0, self.object_id.raw())?;
        encode_ctx_unsigned(buf, 1, self.reference.property_id.to_u32())?;
        if let Some(index) = self.reference.wire_index() {
            encode_ctx_unsigned(buf, 2, index)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(cur, 1)?);
        let array_index = decode_opt_ctx_unsigned(cur, 2)?;
        if !cur.is_empty() {
            return Err(DecodeError::TooManyArguments);
        }
        Ok(Self {
            object_id,
            reference: PropertyRef::from_wire_index(property_id, array_index),
        })
    }
}

/// ReadProperty acknowledgement payload. The value block may carry several
/// values when the property is a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPropertyAck {
    pub object_id: ObjectId,
    pub reference: PropertyRef,
    pub values: Vec<TaggedValue>,
}

impl ReadPropertyAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(buf, 0, self.object_id.raw())?;
        encode_ctx_unsigned(buf, 1, self.reference.property_id.to_u32())?;
        if let Some(index) = self.reference.wire_index() {
            encode_ctx_unsigned(buf, 2, index)?;
        }
        Tag::Open { number: 3 }.encode(buf)?;
        for value in &self.values {
            value.encode(buf)?;
        }
        Tag::Close { number: 3 }.encode(buf)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(cur, 1)?);
        let array_index = decode_opt_ctx_unsigned(cur, 2)?;
        Tag::expect_open(cur, 3)?;
        let values = TaggedValue::decode_until_close(cur, 3)?;
        Ok(Self {
            object_id,
            reference: PropertyRef::from_wire_index(property_id, array_index),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ReadProperty, ReadPropertyAck};
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::{ObjectId, ObjectType, PropertyId, PropertyRef, TaggedValue};

    #[test]
    fn request_roundtrip() {
        let req = ReadProperty::new(
            ObjectId::new(ObjectType::AnalogValue, 0),
            PropertyId::PresentValue,
        );
        let mut raw = [0u8; 32];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ReadProperty::decode(&mut cur).unwrap(), req);
    }

    #[test]
    fn request_with_array_index_roundtrip() {
        let req = ReadProperty {
            object_id: ObjectId::new(ObjectType::Device, 1),
            reference: PropertyRef::element(PropertyId::ObjectList, 0),
        };
        let mut raw = [0u8; 32];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        let decoded = ReadProperty::decode(&mut cur).unwrap();
        assert_eq!(decoded.reference.array_index, 0);
    }

    #[test]
    fn ack_roundtrip_with_value_list() {
        let ack = ReadPropertyAck {
            object_id: ObjectId::new(ObjectType::Device, 1),
            reference: PropertyRef::whole(PropertyId::ObjectList),
            values: vec![
                TaggedValue::ObjectId(ObjectId::new(ObjectType::AnalogInput, 1)),
                TaggedValue::ObjectId(ObjectId::new(ObjectType::AnalogInput, 2)),
            ],
        };
        let mut raw = [0u8; 64];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ReadPropertyAck::decode(&mut cur).unwrap(), ack);
    }
}
