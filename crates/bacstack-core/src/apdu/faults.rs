//! Error, Reject, and Abort PDUs. All three are encoded by servers and
//! decoded by clients; the decoders also run server-side so a device can
//! log a peer's fault PDUs.

use crate::apdu::PduType;
use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{decode_unsigned_raw, encode_app_enumerated},
    tag::{ApplicationTag, Tag},
};
use crate::types::{AbortReason, ErrorClass, ErrorCode, RejectReason};
use crate::{DecodeError, EncodeError};

const FLAG_FROM_SERVER: u8 = 0x01;

/// Error PDU: a service-level failure with class and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPdu {
    pub invoke_id: u8,
    pub service: u8,
    pub class: ErrorClass,
    pub code: ErrorCode,
}

impl ErrorPdu {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        buf.push_u8((PduType::Error as u8) << 4)?;
        buf.push_u8(self.invoke_id)?;
        buf.push_u8(self.service)?;
        encode_app_enumerated(buf, self.class.to_raw())?;
        encode_app_enumerated(buf, self.code.to_raw())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        if PduType::of_first_byte(cur.take_u8()?) != Some(PduType::Error) {
            return Err(DecodeError::InvalidValue);
        }
        let invoke_id = cur.take_u8()?;
        let service = cur.take_u8()?;

        // Most services carry a bare class/code pair; a few wrap it in a
        // [0] constructed block. Some peers also use context tags for the
        // pair itself, so accept all three shapes.
        let (class, code) = if cur.is_empty() {
            (ErrorClass::Unknown(0), ErrorCode::Unknown(0))
        } else if cur.peek_open_tag(0) {
            Tag::expect_open(cur, 0)?;
            let class = decode_error_value(cur, 0)?;
            let code = decode_error_value(cur, 1)?;
            Tag::expect_close(cur, 0)?;
            (ErrorClass::from_raw(class), ErrorCode::from_raw(code))
        } else {
            let class = decode_error_value(cur, 0)?;
            let code = decode_error_value(cur, 1)?;
            (ErrorClass::from_raw(class), ErrorCode::from_raw(code))
        };

        Ok(Self {
            invoke_id,
            service,
            class,
            code,
        })
    }
}

fn decode_error_value(cur: &mut DecodeCursor<'_>, ctx_number: u8) -> Result<u32, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::Enumerated,
            len,
        } => decode_unsigned_raw(cur, len as usize),
        Tag::Context { number, len } if number == ctx_number => {
            decode_unsigned_raw(cur, len as usize)
        }
        _ => Err(DecodeError::InvalidTag),
    }
}

/// Reject PDU: the request could not be understood at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectPdu {
    pub invoke_id: u8,
    pub reason: RejectReason,
}

impl RejectPdu {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        buf.push_u8((PduType::Reject as u8) << 4)?;
        buf.push_u8(self.invoke_id)?;
        buf.push_u8(self.reason.to_raw())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        if PduType::of_first_byte(cur.take_u8()?) != Some(PduType::Reject) {
            return Err(DecodeError::InvalidValue);
        }
        Ok(Self {
            invoke_id: cur.take_u8()?,
            reason: RejectReason::from_raw(cur.take_u8()?),
        })
    }
}

/// Abort PDU: the transaction was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortPdu {
    pub from_server: bool,
    pub invoke_id: u8,
    pub reason: AbortReason,
}

impl AbortPdu {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        let mut b0 = (PduType::Abort as u8) << 4;
        if self.from_server {
            b0 |= FLAG_FROM_SERVER;
        }
        buf.push_u8(b0)?;
        buf.push_u8(self.invoke_id)?;
        buf.push_u8(self.reason.to_raw())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let b0 = cur.take_u8()?;
        if PduType::of_first_byte(b0) != Some(PduType::Abort) {
            return Err(DecodeError::InvalidValue);
        }
        Ok(Self {
            from_server: (b0 & FLAG_FROM_SERVER) != 0,
            invoke_id: cur.take_u8()?,
            reason: AbortReason::from_raw(cur.take_u8()?),
        })
    }
}
