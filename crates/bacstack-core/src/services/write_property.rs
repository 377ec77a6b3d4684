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

/// WriteProperty request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteProperty {
    pub object_id: ObjectId,
    pub reference: PropertyRef,
    pub values: Vec<TaggedValue>,
    /// Command priority 1..=16 for commandable properties.
    pub priority: Option<u8>,
}

impl WriteProperty {
    pub fn new(object_id: ObjectId, property_id: PropertyId, value: TaggedValue) -> Self {
        Self {
            object_id,
            reference: PropertyRef::whole(property_id),
            values: vec![value],
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

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
        Tag::Close { number: 3 }.encode(buf)?;
        if let Some(priority) = self.priority {
            encode_ctx_unsigned(buf, 4, u32::from(priority))?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 0)?);
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(cur, 1)?);
        let array_index = decode_opt_ctx_unsigned(cur, 2)?;
        Tag::expect_open(cur, 3)?;
        let values = TaggedValue::decode_until_close(cur, 3)?;
        let priority = decode_opt_ctx_unsigned(cur, 4)?
            .map(|p| u8::try_from(p).map_err(|_| DecodeError::InvalidValue))
            .transpose()?;
        if !cur.is_empty() {
            return Err(DecodeError::TooManyArguments);
        }
        Ok(Self {
            object_id,
            reference: PropertyRef::from_wire_index(property_id, array_index),
            values,
            priority,
        })
    }
}
