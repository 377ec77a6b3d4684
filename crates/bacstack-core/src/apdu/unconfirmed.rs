use crate::apdu::PduType;
use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
use crate::{DecodeError, EncodeError};

/// Unconfirmed-Request APDU header: just the service choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnconfirmedRequest {
    pub service: u8,
}

impl UnconfirmedRequest {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        buf.push_u8((PduType::UnconfirmedRequest as u8) << 4)?;
        buf.push_u8(self.service)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        if PduType::of_first_byte(cur.take_u8()?) != Some(PduType::UnconfirmedRequest) {
            return Err(DecodeError::InvalidValue);
        }
        Ok(Self {
            service: cur.take_u8()?,
        })
    }
}
