use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_character_string, decode_ctx_unsigned, encode_ctx_character_string,
        encode_ctx_enumerated, encode_ctx_object_id, encode_ctx_unsigned,
    },
    tag::Tag,
};
use crate::types::ObjectId;
use crate::{DecodeError, EncodeError};

/// LifeSafetyOperation request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifeSafetyOperation {
    pub process_id: u32,
    pub requesting_source: String,
    /// Life-safety operation enumeration (silence, reset, unsilence, ...).
    pub request: u32,
    pub object_id: Option<ObjectId>,
}

impl LifeSafetyOperation {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_unsigned(buf, 0, self.process_id)?;
        encode_ctx_character_string(buf, 1, &self.requesting_source)?;
        encode_ctx_enumerated(buf, 2, self.request)?;
        if let Some(id) = self.object_id {
            encode_ctx_object_id(buf, 3, id.raw())?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let process_id = decode_ctx_unsigned(cur, 0)?;
        let requesting_source = decode_ctx_character_string(cur, 1)?.to_owned();
        let request = decode_ctx_unsigned(cur, 2)?;
        let object_id = if cur.peek_context_tag(3) {
            match Tag::decode(cur)? {
                Tag::Context { number: 3, len: 4 } => {
                    Some(ObjectId::from_raw(cur.take_be_u32()?))
                }
                _ => return Err(DecodeError::InvalidTag),
            }
        } else {
            None
        };
        if !cur.is_empty() {
            return Err(DecodeError::TooManyArguments);
        }
        Ok(Self {
            process_id,
            requesting_source,
            request,
            object_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::LifeSafetyOperation;
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::{ObjectId, ObjectType};

    #[test]
    fn operation_roundtrip() {
        let req = LifeSafetyOperation {
            process_id: 1,
            requesting_source: "fire panel".into(),
            request: 2,
            object_id: Some(ObjectId::new(ObjectType::LifeSafetyZone, 1)),
        };
        let mut raw = [0u8; 64];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(LifeSafetyOperation::decode(&mut cur).unwrap(), req);
    }

    #[test]
    fn operation_without_object_roundtrip() {
        let req = LifeSafetyOperation {
            process_id: 9,
            requesting_source: "console".into(),
            request: 0,
            object_id: None,
        };
        let mut raw = [0u8; 64];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(LifeSafetyOperation::decode(&mut cur).unwrap(), req);
    }
}
