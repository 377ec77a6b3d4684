use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_unsigned, decode_opt_ctx_unsigned, decode_unsigned_raw, encode_ctx_object_id,
        encode_ctx_unsigned,
    },
    tag::Tag,
};
use crate::types::{ObjectId, PropertyId, PropertyRef, PropertyValue, TaggedValue};
use crate::{DecodeError, EncodeError};

/// One object and the property values to write to it.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteAccessSpec {
    pub object_id: ObjectId,
    pub properties: Vec<PropertyValue>,
}

/// WritePropertyMultiple request payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WritePropertyMultiple {
    pub specs: Vec<WriteAccessSpec>,
}

impl WritePropertyMultiple {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        for spec in &self.specs {
            encode_ctx_object_id(buf, 0, spec.object_id.raw())?;
            Tag::Open { number: 1 }.encode(buf)?;
            for property in &spec.properties {
                encode_ctx_unsigned(buf, 0, property.reference.property_id.to_u32())?;
                if let Some(index) = property.reference.wire_index() {
                    encode_ctx_unsigned(buf, 1, index)?;
                }
                Tag::Open { number: 2 }.encode(buf)?;
                for value in &property.values {
                    value.encode(buf)?;
                }
                Tag::Close { number: 2 }.encode(buf)?;
                if let Some(priority) = property.priority {
                    encode_ctx_unsigned(buf, 3, u32::from(priority))?;
                }
            }
            Tag::Close { number: 1 }.encode(buf)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let mut specs = Vec::new();
        while !cur.is_empty() {
            let object_id = match Tag::decode(cur)? {
                Tag::Context { number: 0, len: 4 } => ObjectId::from_raw(cur.take_be_u32()?),
                _ => return Err(DecodeError::MissingRequired),
            };
            Tag::expect_open(cur, 1)?;
            let mut properties = Vec::new();
            loop {
                let tag = Tag::decode(cur)?;
                if tag == (Tag::Close { number: 1 }) {
                    break;
                }
                let property_id = match tag {
                    Tag::Context { number: 0, len } => {
                        PropertyId::from_u32(decode_unsigned_raw(cur, len as usize)?)
                    }
                    _ => return Err(DecodeError::InvalidTag),
                };
                let array_index = decode_opt_ctx_unsigned(cur, 1)?;
                Tag::expect_open(cur, 2)?;
                let values = TaggedValue::decode_until_close(cur, 2)?;
                let priority = decode_opt_ctx_unsigned(cur, 3)?
                    .map(|p| u8::try_from(p).map_err(|_| DecodeError::InvalidValue))
                    .transpose()?;
                properties.push(PropertyValue {
                    reference: PropertyRef::from_wire_index(property_id, array_index),
                    values,
                    priority,
                });
            }
            specs.push(WriteAccessSpec {
                object_id,
                properties,
            });
        }
        if specs.is_empty() {
            return Err(DecodeError::MissingRequired);
        }
        Ok(Self { specs })
    }
}
