use crate::apdu::PduType;
use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
use crate::types::MaxApdu;
use crate::{DecodeError, EncodeError};

const FLAG_SEGMENTED: u8 = 0b0000_1000;
const FLAG_MORE_FOLLOWS: u8 = 0b0000_0100;
const FLAG_SEGMENTED_RESPONSE_ACCEPTED: u8 = 0b0000_0010;

/// Confirmed-Request APDU header. Sequence number and window size are
/// present only on segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedRequest {
    pub segmented: bool,
    pub more_follows: bool,
    pub segmented_response_accepted: bool,
    /// Encoded max-segments nibble (0 = unspecified).
    pub max_segments: u8,
    pub max_apdu: MaxApdu,
    pub invoke_id: u8,
    pub sequence_number: Option<u8>,
    pub window_size: Option<u8>,
    pub service: u8,
}

impl ConfirmedRequest {
    /// A plain, unsegmented request header advertising this side's
    /// max-APDU and willingness to accept a segmented answer.
    pub fn plain(invoke_id: u8, service: u8, max_apdu: MaxApdu) -> Self {
        Self {
            segmented: false,
            more_follows: false,
            segmented_response_accepted: true,
            max_segments: 0,
            max_apdu,
            invoke_id,
            sequence_number: None,
            window_size: None,
            service,
        }
    }

    /// Header for segment `sequence` of a segmented request.
    pub fn segment(&self, sequence: u8, window_size: u8, more_follows: bool) -> Self {
        Self {
            segmented: true,
            more_follows,
            sequence_number: Some(sequence),
            window_size: Some(window_size),
            ..*self
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        let mut b0 = (PduType::ConfirmedRequest as u8) << 4;
        if self.segmented {
            b0 |= FLAG_SEGMENTED;
        }
        if self.more_follows {
            b0 |= FLAG_MORE_FOLLOWS;
        }
        if self.segmented_response_accepted {
            b0 |= FLAG_SEGMENTED_RESPONSE_ACCEPTED;
        }
        buf.push_u8(b0)?;
        buf.push_u8((self.max_segments << 4) | (self.max_apdu.code() & 0x0F))?;
        buf.push_u8(self.invoke_id)?;
        if self.segmented {
            buf.push_u8(self.sequence_number.unwrap_or(0))?;
            buf.push_u8(self.window_size.unwrap_or(1))?;
        }
        buf.push_u8(self.service)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let b0 = cur.take_u8()?;
        if PduType::of_first_byte(b0) != Some(PduType::ConfirmedRequest) {
            return Err(DecodeError::InvalidValue);
        }
        let segmented = (b0 & FLAG_SEGMENTED) != 0;
        let seg_apdu = cur.take_u8()?;
        let invoke_id = cur.take_u8()?;
        let (sequence_number, window_size) = if segmented {
            (Some(cur.take_u8()?), Some(cur.take_u8()?))
        } else {
            (None, None)
        };
        Ok(Self {
            segmented,
            more_follows: (b0 & FLAG_MORE_FOLLOWS) != 0,
            segmented_response_accepted: (b0 & FLAG_SEGMENTED_RESPONSE_ACCEPTED) != 0,
            max_segments: seg_apdu >> 4,
            max_apdu: MaxApdu::from_code(seg_apdu),
            invoke_id,
            sequence_number,
            window_size,
            service: cur.take_u8()?,
        })
    }

    /// Encoded header length in bytes.
    pub const fn len(&self) -> usize {
        if self.segmented {
            6
        } else {
            4
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConfirmedRequest;
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::MaxApdu;

    #[test]
    fn plain_header_roundtrip() {
        let header = ConfirmedRequest::plain(33, 12, MaxApdu::UpTo1476);
        let mut raw = [0u8; 8];
        let mut buf = EncodeBuffer::new(&mut raw);
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.payload().len(), header.len());

        let mut cur = DecodeCursor::new(buf.payload());
        let decoded = ConfirmedRequest::decode(&mut cur).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn segment_header_roundtrip() {
        let header = ConfirmedRequest::plain(7, 14, MaxApdu::UpTo480).segment(2, 10, true);
        let mut raw = [0u8; 8];
        let mut buf = EncodeBuffer::new(&mut raw);
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.payload().len(), 6);

        let mut cur = DecodeCursor::new(buf.payload());
        let decoded = ConfirmedRequest::decode(&mut cur).unwrap();
        assert_eq!(decoded.sequence_number, Some(2));
        assert_eq!(decoded.window_size, Some(10));
        assert!(decoded.more_follows);
    }
}
