use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_object_id, decode_ctx_unsigned, decode_opt_ctx_unsigned, encode_ctx_boolean,
        encode_ctx_object_id, encode_ctx_unsigned,
    },
    tag::Tag,
};
use crate::types::{ObjectId, PropertyId, PropertyRef};
use crate::{DecodeError, EncodeError};

/// SubscribeCOV request payload. Both confirmation flag and lifetime absent
/// means "cancel".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeCov {
    pub process_id: u32,
    pub object_id: ObjectId,
    pub issue_confirmed: Option<bool>,
    pub lifetime_seconds: Option<u32>,
}

impl SubscribeCov {
    pub const fn cancellation(process_id: u32, object_id: ObjectId) -> Self {
        Self {
            process_id,
            object_id,
            issue_confirmed: None,
            lifetime_seconds: None,
        }
    }

    pub const fn is_cancellation(&self) -> bool {
        self.issue_confirmed.is_none() && self.lifetime_seconds.is_none()
    }

    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_unsigned(buf, 0, self.process_id)?;
        encode_ctx_object_id(buf, 1, self.object_id.raw())?;
        if let Some(confirmed) = self.issue_confirmed {
            encode_ctx_boolean(buf, 2, confirmed)?;
        }
        if let Some(lifetime) = self.lifetime_seconds {
            encode_ctx_unsigned(buf, 3, lifetime)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let process_id = decode_ctx_unsigned(cur, 0)?;
        let object_id = ObjectId::from_raw(decode_ctx_object_id(cur, 1)?);
        let issue_confirmed = if cur.peek_context_tag(2) {
            match Tag::decode(cur)? {
                Tag::Context { number: 2, len: 1 } => Some(cur.take_u8()? != 0),
                _ => return Err(DecodeError::InvalidTag),
            }
        } else {
            None
        };
        let lifetime_seconds = decode_opt_ctx_unsigned(cur, 3)?;
        Ok(Self {
            process_id,
            object_id,
            issue_confirmed,
            lifetime_seconds,
        })
    }
}

/// SubscribeCOVProperty request payload: SubscribeCOV plus the monitored
/// property and an optional change increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscribeCovProperty {
    pub subscription: SubscribeCov,
    pub monitored: PropertyRef,
    pub cov_increment: Option<f32>,
}

impl SubscribeCovProperty {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        self.subscription.encode(buf)?;
        Tag::Open { number: 4 }.encode(buf)?;
        encode_ctx_unsigned(buf, 0, self.monitored.property_id.to_u32())?;
        if let Some(index) = self.monitored.wire_index() {
            encode_ctx_unsigned(buf, 1, index)?;
        }
        Tag::Close { number: 4 }.encode(buf)?;
        if let Some(increment) = self.cov_increment {
            Tag::Context { number: 5, len: 4 }.encode(buf)?;
            buf.push_slice(&increment.to_bits().to_be_bytes())?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let subscription = SubscribeCov::decode(cur)?;
        Tag::expect_open(cur, 4)?;
        let property_id = PropertyId::from_u32(decode_ctx_unsigned(cur, 0)?);
        let array_index = decode_opt_ctx_unsigned(cur, 1)?;
        Tag::expect_close(cur, 4)?;
        let cov_increment = if cur.peek_context_tag(5) {
            match Tag::decode(cur)? {
                Tag::Context { number: 5, len: 4 } => {
                    Some(f32::from_bits(cur.take_be_u32()?))
                }
                _ => return Err(DecodeError::InvalidTag),
            }
        } else {
            None
        };
        Ok(Self {
            subscription,
            monitored: PropertyRef::from_wire_index(property_id, array_index),
            cov_increment,
        })
    }
}
