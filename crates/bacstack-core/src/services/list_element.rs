//! AddListElement / RemoveListElement payloads. Both services share one
//! wire shape; only the service choice differs.

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

/// Payload for AddListElement and RemoveListElement.
#[derive(Debug, Clone, PartialEq)]
pub struct ListElementChange {
    pub object_id: ObjectId,
    pub reference: PropertyRef,
    pub elements: Vec<TaggedValue>,
}

impl ListElementChange {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(buf, 0, self.object_id.raw())?;
        encode_ctx_unsigned(buf, 1, self.reference.property_id.to_u32())?;
        if let Some(index) = self.reference.wire_index() {
            encode_ctx_unsigned(buf, 2, index)?;
        }
        Tag::Open { number: 3 }.encode(buf)?;
        for element in &self.elements {
            element.encode(buf)?;
        }
        Tag::Close { number: 3 }.encode(buf)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(cur, 1)?);
        let array_index = decode_opt_ctx_unsigned(cur, 2)?;
        Tag::expect_open(cur, 3)?;
        let elements = TaggedValue::decode_until_close(cur, 3)?;
        if !cur.is_empty() {
            return Err(DecodeError::TooManyArguments);
        }
        Ok(Self {
            object_id,
            reference: PropertyRef::from_wire_index(property_id, array_index),
            elements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ListElementChange;
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::{ObjectId, ObjectType, PropertyId, PropertyRef, TaggedValue};

    #[test]
    fn change_roundtrip() {
        let req = ListElementChange {
            object_id: ObjectId::new(ObjectType::Group, 1),
            reference: PropertyRef::whole(PropertyId::Proprietary(53)),
            elements: vec![
                TaggedValue::ObjectId(ObjectId::new(ObjectType::AnalogInput, 4)),
                TaggedValue::ObjectId(ObjectId::new(ObjectType::AnalogInput, 5)),
            ],
        };
        let mut raw = [0u8; 64];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ListElementChange::decode(&mut cur).unwrap(), req);
    }
}
