use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_object_id, decode_ctx_unsigned, decode_opt_ctx_unsigned, decode_unsigned_raw,
        encode_ctx_object_id, encode_ctx_unsigned,
    },
    tag::Tag,
};
use crate::types::{ObjectId, PropertyId, PropertyRef, PropertyValue, TaggedValue};
use crate::{DecodeError, EncodeError};

/// COV notification payload, shared by the confirmed and unconfirmed
/// service variants.
#[derive(Debug, Clone, PartialEq)]
pub struct CovNotification {
    pub process_id: u32,
    pub device_id: ObjectId,
    pub object_id: ObjectId,
    pub time_remaining_seconds: u32,
    pub values: Vec<PropertyValue>,
}

impl CovNotification {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_unsigned(buf, 0, self.process_id)?;
        encode_ctx_object_id(buf, 1, self.device_id.raw())?;
        encode_ctx_object_id(buf, 2, self.object_id.raw())?;
        encode_ctx_unsigned(buf, 3, self.time_remaining_seconds)?;
        Tag::Open { number: 4 }.encode(buf)?;
        for property in &self.values {
            encode_ctx_unsigned(buf, 0, property.reference.property_id.to_u32())?;
            if let Some(index) = property.reference.wire_index() {
                encode_ctx_unsigned(buf, 1, index)?;
            }
            Tag::Open { number: 2 }.encode(buf)?;
            for value in &property.values {
                value.encode(buf)?;
            }
            Tag::Close { number: 2 }.encode(buf)?;
        }
        Tag::Close { number: 4 }.encode(buf)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let process_id = decode_ctx_unsigned(cur, 0)?;
        let device_id = ObjectId::from_raw(decode_ctx_object_id(cur, 1)?);
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 2)?);
        let time_remaining_seconds = decode_ctx_unsigned(cur, 3)?;
        Tag::expect_open(cur, 4)?;
        let mut values = Vec::new();
        loop {
            let tag = Tag::decode(cur)?;
            if tag == (Tag::Close { number: 4 }) {
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
            let property_values = TaggedValue::decode_until_close(cur, 2)?;
            values.push(PropertyValue {
                reference: PropertyRef::from_wire_index(property_id, array_index),
                values: property_values,
                priority: None,
            });
        }
        Ok(Self {
            process_id,
            device_id,
            object_id,
            time_remaining_seconds,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CovNotification;
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::{
        BitString, ObjectId, ObjectType, PropertyId, PropertyRef, PropertyValue, TaggedValue,
    };

    #[test]
    fn notification_roundtrip() {
        let req = CovNotification {
            process_id: 1,
            device_id: ObjectId::new(ObjectType::Device, 666),
            object_id: ObjectId::new(ObjectType::AnalogInput, 3),
            time_remaining_seconds: 120,
            values: vec![
                PropertyValue::new(
                    PropertyRef::whole(PropertyId::PresentValue),
                    vec![TaggedValue::Real(20.5)],
                ),
                PropertyValue::new(
                    PropertyRef::whole(PropertyId::StatusFlags),
                    vec![TaggedValue::BitString(BitString::new(4, vec![0x00]))],
                ),
            ],
        };
        let mut raw = [0u8; 128];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(CovNotification::decode(&mut cur).unwrap(), req);
    }
}
