use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_character_string, decode_ctx_object_id, decode_ctx_unsigned,
        encode_ctx_character_string, encode_ctx_object_id, encode_ctx_unsigned,
    },
    tag::Tag,
};
use crate::types::ObjectId;
use crate::{DecodeError, EncodeError};

/// The object a Who-Has asks about: by identifier or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhoHasTarget {
    ObjectId(ObjectId),
    ObjectName(String),
}

/// Who-Has request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoHas {
    pub range: Option<(u32, u32)>,
    pub target: WhoHasTarget,
}

impl WhoHas {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        if let Some((low, high)) = self.range {
            encode_ctx_unsigned(buf, 0, low)?;
            encode_ctx_unsigned(buf, 1, high)?;
        }
        match &self.target {
            WhoHasTarget::ObjectId(id) => encode_ctx_object_id(buf, 2, id.raw()),
            WhoHasTarget::ObjectName(name) => encode_ctx_character_string(buf, 3, name),
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let range = if cur.peek_context_tag(0) {
            let low = decode_ctx_unsigned(cur, 0)?;
            let high = decode_ctx_unsigned(cur, 1)?;
            Some((low, high))
        } else {
            None
        };

        let target = match Tag::decode(cur)? {
            Tag::Context { number: 2, len: 4 } => {
                WhoHasTarget::ObjectId(ObjectId::from_raw(cur.take_be_u32()?))
            }
            Tag::Context { number: 3, len } => WhoHasTarget::ObjectName(
                crate::encoding::primitives::decode_character_string(cur, len as usize)?.to_owned(),
            ),
            _ => return Err(DecodeError::MissingRequired),
        };
        Ok(Self { range, target })
    }
}

/// I-Have answer to Who-Has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IHave {
    pub device_id: ObjectId,
    pub object_id: ObjectId,
    pub object_name: String,
}

impl IHave {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_object_id(buf, 0, self.device_id.raw())?;
        encode_ctx_object_id(buf, 1, self.object_id.raw())?;
        encode_ctx_character_string(buf, 2, &self.object_name)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let device_id = ObjectId::from_raw(decode_ctx_object_id(cur, 0)?);
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 1)?);
        let object_name = decode_ctx_character_string(cur, 2)?.to_owned();
        Ok(Self {
            device_id,
            object_id,
            object_name,
        })
    }
}
