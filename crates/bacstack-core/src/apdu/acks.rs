use crate::apdu::PduType;
use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
use crate::{DecodeError, EncodeError};

const FLAG_SEGMENTED: u8 = 0b0000_1000;
const FLAG_MORE_FOLLOWS: u8 = 0b0000_0100;
const FLAG_NEGATIVE_ACK: u8 = 0b0000_0010;
const FLAG_FROM_SERVER: u8 = 0b0000_0001;

/// Simple-Ack APDU: the successful answer to write-style services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleAck {
    pub invoke_id: u8,
    pub service: u8,
}

impl SimpleAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        buf.push_u8((PduType::SimpleAck as u8) << 4)?;
        buf.push_u8(self.invoke_id)?;
        buf.push_u8(self.service)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        if PduType::of_first_byte(cur.take_u8()?) != Some(PduType::SimpleAck) {
            return Err(DecodeError::InvalidValue);
        }
        Ok(Self {
            invoke_id: cur.take_u8()?,
            service: cur.take_u8()?,
        })
    }
}

/// Complex-Ack APDU header; carries a service payload and may be segmented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexAck {
    pub segmented: bool,
    pub more_follows: bool,
    pub invoke_id: u8,
    pub sequence_number: Option<u8>,
    pub window_size: Option<u8>,
    pub service: u8,
}

impl ComplexAck {
    pub fn plain(invoke_id: u8, service: u8) -> Self {
        Self {
            segmented: false,
            more_follows: false,
            invoke_id,
            sequence_number: None,
            window_size: None,
            service,
        }
    }

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
        let mut b0 = (PduType::ComplexAck as u8) << 4;
        if self.segmented {
            b0 |= FLAG_SEGMENTED;
        }
        if self.more_follows {
            b0 |= FLAG_MORE_FOLLOWS;
        }
        buf.push_u8(b0)?;
        buf.push_u8(self.invoke_id)?;
        if self.segmented {
            buf.push_u8(self.sequence_number.unwrap_or(0))?;
            buf.push_u8(self.window_size.unwrap_or(1))?;
        }
        buf.push_u8(self.service)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let b0 = cur.take_u8()?;
        if PduType::of_first_byte(b0) != Some(PduType::ComplexAck) {
            return Err(DecodeError::InvalidValue);
        }
        let segmented = (b0 & FLAG_SEGMENTED) != 0;
        let invoke_id = cur.take_u8()?;
        let (sequence_number, window_size) = if segmented {
            (Some(cur.take_u8()?), Some(cur.take_u8()?))
        } else {
            (None, None)
        };
        Ok(Self {
            segmented,
            more_follows: (b0 & FLAG_MORE_FOLLOWS) != 0,
            invoke_id,
            sequence_number,
            window_size,
            service: cur.take_u8()?,
        })
    }

    /// Encoded header length in bytes.
    pub const fn len(&self) -> usize {
        if self.segmented {
            5
        } else {
            3
        }
    }
}

/// Segment-Ack APDU, flowing opposite to the segments it acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentAck {
    pub negative_ack: bool,
    pub from_server: bool,
    pub invoke_id: u8,
    pub sequence_number: u8,
    pub actual_window_size: u8,
}

impl SegmentAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        let mut b0 = (PduType::SegmentAck as u8) << 4;
        if self.negative_ack {
            b0 |= FLAG_NEGATIVE_ACK;
        }
        if self.from_server {
            b0 |= FLAG_FROM_SERVER;
        }
        buf.push_u8(b0)?;
        buf.push_u8(self.invoke_id)?;
        buf.push_u8(self.sequence_number)?;
        buf.push_u8(self.actual_window_size)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let b0 = cur.take_u8()?;
        if PduType::of_first_byte(b0) != Some(PduType::SegmentAck) {
            return Err(DecodeError::InvalidValue);
        }
        Ok(Self {
            negative_ack: (b0 & FLAG_NEGATIVE_ACK) != 0,
            from_server: (b0 & FLAG_FROM_SERVER) != 0,
            invoke_id: cur.take_u8()?,
            sequence_number: cur.take_u8()?,
            actual_window_size: cur.take_u8()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ComplexAck, SegmentAck, SimpleAck};
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};

    #[test]
    fn simple_ack_roundtrip() {
        let ack = SimpleAck {
            invoke_id: 200,
            service: 15,
        };
        let mut raw = [0u8; 4];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        assert_eq!(buf.payload(), &[0x20, 200, 15]);
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(SimpleAck::decode(&mut cur).unwrap(), ack);
    }

    #[test]
    fn complex_ack_segment_roundtrip() {
        let ack = ComplexAck::plain(9, 14).segment(4, 10, true);
        let mut raw = [0u8; 8];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        assert_eq!(buf.payload().len(), ack.len());
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(ComplexAck::decode(&mut cur).unwrap(), ack);
    }

    #[test]
    fn segment_ack_flags() {
        let ack = SegmentAck {
            negative_ack: true,
            from_server: true,
            invoke_id: 1,
            sequence_number: 6,
            actual_window_size: 10,
        };
        let mut raw = [0u8; 8];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        assert_eq!(buf.payload()[0], 0x43);
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(SegmentAck::decode(&mut cur).unwrap(), ack);
    }
}
