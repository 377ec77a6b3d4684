use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_unsigned, decode_unsigned_raw, encode_ctx_object_id, encode_ctx_unsigned,
    },
    tag::Tag,
};
use crate::types::{
    ErrorClass, ErrorCode, ObjectId, PropertyId, PropertyRef, PropertyValue, ReadAccessResult,
    TaggedValue,
};
use crate::{DecodeError, EncodeError};

/// One object and the property references to read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadAccessSpec {
    pub object_id: ObjectId,
    pub references: Vec<PropertyRef>,
}

/// ReadPropertyMultiple request payload: a list of read-access specs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadPropertyMultiple {
    pub specs: Vec<ReadAccessSpec>,
}

impl ReadPropertyMultiple {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        for spec in &self.specs {
            encode_ctx_object_id(buf, 0, spec.object_id.raw())?;
            Tag::Open { number: 1 }.encode(buf)?;
            for reference in &spec.references {
                encode_ctx_unsigned(buf, 0, reference.property_id.to_u32())?;
                if let Some(index) = reference.wire_index() {
                    encode_ctx_unsigned(buf, 1, index)?;
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
            let mut references = Vec::new();
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
                let array_index = if cur.peek_context_tag(1) {
                    Some(decode_ctx_unsigned(cur, 1)?)
                } else {
                    None
                };
                references.push(PropertyRef::from_wire_index(property_id, array_index));
            }
            specs.push(ReadAccessSpec {
                object_id,
                references,
            });
        }
        if specs.is_empty() {
            return Err(DecodeError::MissingRequired);
        }
        Ok(Self { specs })
    }
}

/// ReadPropertyMultiple acknowledgement: per-object results where each
/// property carries either values or an error ([`TaggedValue::Error`]).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadPropertyMultipleAck {
    pub results: Vec<ReadAccessResult>,
}

impl ReadPropertyMultipleAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        for access in &self.results {
            encode_ctx_object_id(buf, 0, access.object_id.raw())?;
            Tag::Open { number: 1 }.encode(buf)?;
            for property in &access.properties {
                encode_ctx_unsigned(buf, 2, property.reference.property_id.to_u32())?;
                if let Some(index) = property.reference.wire_index() {
                    encode_ctx_unsigned(buf, 3, index)?;
                }
                match property.values.as_slice() {
                    [TaggedValue::Error { class, code }] => {
                        Tag::Open { number: 5 }.encode(buf)?;
                        encode_ctx_unsigned(buf, 0, class.to_raw())?;
                        encode_ctx_unsigned(buf, 1, code.to_raw())?;
                        Tag::Close { number: 5 }.encode(buf)?;
                    }
                    values => {
                        Tag::Open { number: 4 }.encode(buf)?;
                        for value in values {
                            value.encode(buf)?;
                        }
                        Tag::Close { number: 4 }.encode(buf)?;
                    }
                }
            }
            Tag::Close { number: 1 }.encode(buf)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let mut results = Vec::new();
        while !cur.is_empty() {
            let object_id = match Tag::decode(cur)? {
                Tag::Context { number: 0, len: 4 } => ObjectId::from_raw(cur.take_be_u32()?),
                _ => return Err(DecodeError::InvalidTag),
            };
            Tag::expect_open(cur, 1)?;
            let mut properties = Vec::new();
            loop {
                let tag = Tag::decode(cur)?;
                if tag == (Tag::Close { number: 1 }) {
                    break;
                }
                let property_id = match tag {
                    Tag::Context { number: 2, len } => {
                        PropertyId::from_u32(decode_unsigned_raw(cur, len as usize)?)
                    }
                    _ => return Err(DecodeError::InvalidTag),
                };
                let array_index = if cur.peek_context_tag(3) {
                    Some(decode_ctx_unsigned(cur, 3)?)
                } else {
                    None
                };

                let values = match Tag::decode(cur)? {
                    Tag::Open { number: 4 } => TaggedValue::decode_until_close(cur, 4)?,
                    Tag::Open { number: 5 } => {
                        let class = decode_ctx_unsigned(cur, 0)?;
                        let code = decode_ctx_unsigned(cur, 1)?;
                        Tag::expect_close(cur, 5)?;
                        vec![TaggedValue::Error {
                            class: ErrorClass::from_raw(class),
                            code: ErrorCode::from_raw(code),
                        }]
                    }
                    _ => return Err(DecodeError::InvalidTag),
                };

                properties.push(PropertyValue {
                    reference: PropertyRef::from_wire_index(property_id, array_index),
                    values,
                    priority: None,
                });
            }
            results.push(ReadAccessResult {
                object_id,
                properties,
            });
        }
        Ok(Self { results })
    }
}

#[cfg(test)]
mod tests {
    use super::{ReadAccessSpec, ReadPropertyMultiple, ReadPropertyMultipleAck};
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::{
        ErrorClass, ErrorCode, ObjectId, ObjectType, PropertyId, PropertyRef, PropertyValue,
        ReadAccessResult, TaggedValue,
    };

    #[test]
    fn request_roundtrip() {
        let req = ReadPropertyMultiple {
            specs: vec![
                ReadAccessSpec {
                    object_id: ObjectId::new(ObjectType::AnalogValue, 0),
                    references: vec![
                        PropertyRef::whole(PropertyId::ObjectName),
                        PropertyRef::whole(PropertyId::PresentValue),
                        PropertyRef::element(PropertyId::PriorityArray, 8),
                    ],
                },
                ReadAccessSpec {
                    object_id: ObjectId::new(ObjectType::AnalogValue, 2),
                    references: vec![PropertyRef::whole(PropertyId::PresentValue)],
                },
            ],
        };
        let mut raw = [0u8; 128];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ReadPropertyMultiple::decode(&mut cur).unwrap(), req);
    }

    #[test]
    fn ack_roundtrip_with_error_entry() {
        let ack = ReadPropertyMultipleAck {
            results: vec![ReadAccessResult {
                object_id: ObjectId::new(ObjectType::AnalogValue, 0),
                properties: vec![
                    PropertyValue::new(
                        PropertyRef::whole(PropertyId::PresentValue),
                        vec![TaggedValue::Real(10.0)],
                    ),
                    PropertyValue::new(
                        PropertyRef::whole(PropertyId::Description),
                        vec![TaggedValue::Error {
                            class: ErrorClass::Property,
                            code: ErrorCode::UnknownProperty,
                        }],
                    ),
                ],
            }],
        };
        let mut raw = [0u8; 128];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ReadPropertyMultipleAck::decode(&mut cur).unwrap(), ack);
    }

    #[test]
    fn empty_request_is_missing_required() {
        let mut cur = DecodeCursor::new(&[]);
        assert_eq!(
            ReadPropertyMultiple::decode(&mut cur).unwrap_err(),
            crate::DecodeError::MissingRequired
        );
    }
}
