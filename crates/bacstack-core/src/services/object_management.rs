//! CreateObject / DeleteObject payloads.

use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_opt_ctx_unsigned, decode_unsigned_raw, encode_ctx_enumerated, encode_ctx_object_id,
        encode_ctx_unsigned,
    },
    tag::{ApplicationTag, Tag},
};
use crate::types::{ObjectId, ObjectType, PropertyId, PropertyRef, PropertyValue, TaggedValue};
use crate::{DecodeError, EncodeError};

/// What to create: a fresh instance of a type, or a specific object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateTarget {
    ObjectType(ObjectType),
    ObjectId(ObjectId),
}

/// CreateObject request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateObject {
    pub target: CreateTarget,
    pub initial_values: Vec<PropertyValue>,
}

impl CreateObject {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        Tag::Open { number: 0 }.encode(buf)?;
        match self.target {
            CreateTarget::ObjectType(t) => encode_ctx_enumerated(buf, 0, u32::from(t.to_u16()))?,
            CreateTarget::ObjectId(id) => encode_ctx_object_id(buf, 1, id.raw())?,
        }
        Tag::Close { number: 0 }.encode(buf)?;
        if !self.initial_values.is_empty() {
            Tag::Open { number: 1 }.encode(buf)?;
            for property in &self.initial_values {
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
        Tag::expect_open(cur, 0)?;
        let target = match Tag::decode(cur)? {
            Tag::Context { number: 0, len } => CreateTarget::ObjectType(ObjectType::from_u16(
                decode_unsigned_raw(cur, len as usize)? as u16,
            )),
            Tag::Context { number: 1, len: 4 } => {
                CreateTarget::ObjectId(ObjectId::from_raw(cur.take_be_u32()?))
            }
            _ => return Err(DecodeError::InvalidTag),
        };
        Tag::expect_close(cur, 0)?;

        let mut initial_values = Vec::new();
        if cur.peek_open_tag(1) {
            Tag::expect_open(cur, 1)?;
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
                initial_values.push(PropertyValue {
                    reference: PropertyRef::from_wire_index(property_id, array_index),
                    values,
                    priority,
                });
            }
        }
        Ok(Self {
            target,
            initial_values,
        })
    }
}

/// CreateObject acknowledgement: the id of the created object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateObjectAck {
    pub object_id: ObjectId,
}

impl CreateObjectAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        Tag::Application {
            kind: ApplicationTag::ObjectId,
            len: 4,
        }
        .encode(buf)?;
        buf.push_be_u32(self.object_id.raw())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        match Tag::decode(cur)? {
            Tag::Application {
                kind: ApplicationTag::ObjectId,
                len: 4,
            } => Ok(Self {
                object_id: ObjectId::from_raw(cur.take_be_u32()?),
            }),
            _ => Err(DecodeError::InvalidTag),
        }
    }
}

/// DeleteObject request payload: the object id, application-tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteObject {
    pub object_id: ObjectId,
}

impl DeleteObject {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        Tag::Application {
            kind: ApplicationTag::ObjectId,
            len: 4,
        }
        .encode(buf)?;
        buf.push_be_u32(self.object_id.raw())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        match Tag::decode(cur)? {
            Tag::Application {
                kind: ApplicationTag::ObjectId,
                len: 4,
            } => Ok(Self {
                object_id: ObjectId::from_raw(cur.take_be_u32()?),
            }),
            _ => Err(DecodeError::InvalidTag),
        }
    }
}
