use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{decode_ctx_unsigned, encode_ctx_object_id, encode_ctx_unsigned},
    tag::Tag,
};
use crate::services::event_notification::TimeStamp;
use crate::types::{BitString, ObjectId};
use crate::{DecodeError, EncodeError};

/// GetEventInformation request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetEventInformation {
    /// Resume marker: the last object id received in a prior answer.
    pub last_received: Option<ObjectId>,
}

impl GetEventInformation {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        if let Some(id) = self.last_received {
            encode_ctx_object_id(buf, 0, id.raw())?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let last_received = if cur.peek_context_tag(0) {
            match Tag::decode(cur)? {
                Tag::Context { number: 0, len: 4 } => {
                    Some(ObjectId::from_raw(cur.take_be_u32()?))
                }
                _ => return Err(DecodeError::InvalidTag),
            }
        } else {
            None
        };
        Ok(Self { last_received })
    }
}

/// One event summary in a GetEventInformation answer.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub object_id: ObjectId,
    pub event_state: u32,
    pub acknowledged_transitions: BitString,
    pub event_timestamps: [TimeStamp; 3],
    pub notify_type: u32,
    pub event_enable: BitString,
    pub event_priorities: [u32; 3],
}

/// GetEventInformation acknowledgement payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GetEventInformationAck {
    pub summaries: Vec<EventSummary>,
    pub more_events: bool,
}

impl GetEventInformationAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        Tag::Open { number: 0 }.encode(buf)?;
        for summary in &self.summaries {
            encode_ctx_object_id(buf, 0, summary.object_id.raw())?;
            encode_ctx_unsigned(buf, 1, summary.event_state)?;
            encode_ctx_bit_string(buf, 2, &summary.acknowledged_transitions)?;
            Tag::Open { number: 3 }.encode(buf)?;
            for stamp in &summary.event_timestamps {
                stamp.encode(buf)?;
            }
            Tag::Close { number: 3 }.encode(buf)?;
            encode_ctx_unsigned(buf, 4, summary.notify_type)?;
            encode_ctx_bit_string(buf, 5, &summary.event_enable)?;
            Tag::Open { number: 6 }.encode(buf)?;
            for priority in summary.event_priorities {
                crate::encoding::primitives::encode_app_unsigned(buf, priority)?;
            }
            Tag::Close { number: 6 }.encode(buf)?;
        }
        Tag::Close { number: 0 }.encode(buf)?;
        crate::encoding::primitives::encode_ctx_boolean(buf, 1, self.more_events)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        Tag::expect_open(cur, 0)?;
        let mut summaries = Vec::new();
        loop {
            let tag = Tag::decode(cur)?;
            if tag == (Tag::Close { number: 0 }) {
                break;
            }
            let object_id = match tag {
                Tag::Context { number: 0, len: 4 } => ObjectId::from_raw(cur.take_be_u32()?),
                _ => return Err(DecodeError::InvalidTag),
            };
            let event_state = decode_ctx_unsigned(cur, 1)?;
            let acknowledged_transitions = decode_ctx_bit_string(cur, 2)?;
            Tag::expect_open(cur, 3)?;
            let stamps = [
                TimeStamp::decode(cur)?,
                TimeStamp::decode(cur)?,
                TimeStamp::decode(cur)?,
            ];
            Tag::expect_close(cur, 3)?;
            let notify_type = decode_ctx_unsigned(cur, 4)?;
            let event_enable = decode_ctx_bit_string(cur, 5)?;
            Tag::expect_open(cur, 6)?;
            let priorities = [
                crate::encoding::primitives::decode_app_unsigned(cur)?,
                crate::encoding::primitives::decode_app_unsigned(cur)?,
                crate::encoding::primitives::decode_app_unsigned(cur)?,
            ];
            Tag::expect_close(cur, 6)?;
            summaries.push(EventSummary {
                object_id,
                event_state,
                acknowledged_transitions,
                event_timestamps: stamps,
                notify_type,
                event_enable,
                event_priorities: priorities,
            });
        }
        let more_events = match Tag::decode(cur)? {
            Tag::Context { number: 1, len: 1 } => cur.take_u8()? != 0,
            _ => return Err(DecodeError::MissingRequired),
        };
        Ok(Self {
            summaries,
            more_events,
        })
    }
}

fn encode_ctx_bit_string(
    buf: &mut EncodeBuffer<'_>,
    number: u8,
    bits: &BitString,
) -> Result<(), EncodeError> {
    let len = u32::try_from(bits.data.len() + 1).map_err(|_| EncodeError::ValueOutOfRange)?;
    Tag::Context { number, len }.encode(buf)?;
    buf.push_u8(bits.unused_bits)?;
    buf.push_slice(&bits.data)
}

fn decode_ctx_bit_string(
    cur: &mut DecodeCursor<'_>,
    number: u8,
) -> Result<BitString, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Context { number: n, len } if n == number => {
            if len == 0 {
                return Err(DecodeError::InvalidLength);
            }
            let raw = cur.take(len as usize)?;
            Ok(BitString::new(raw[0], raw[1..].to_vec()))
        }
        _ => Err(DecodeError::InvalidTag),
    }
}

#[cfg(test)]
mod tests {
    use super::{EventSummary, GetEventInformation, GetEventInformationAck};
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::services::event_notification::TimeStamp;
    use crate::types::{BitString, ObjectId, ObjectType};

    #[test]
    fn request_roundtrip() {
        let req = GetEventInformation {
            last_received: Some(ObjectId::new(ObjectType::AnalogInput, 9)),
        };
        let mut raw = [0u8; 16];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(GetEventInformation::decode(&mut cur).unwrap(), req);
    }

    #[test]
    fn ack_roundtrip() {
        let ack = GetEventInformationAck {
            summaries: vec![EventSummary {
                object_id: ObjectId::new(ObjectType::AnalogInput, 2),
                event_state: 3,
                acknowledged_transitions: BitString::new(5, vec![0b1110_0000]),
                event_timestamps: [
                    TimeStamp::Sequence(1),
                    TimeStamp::Sequence(2),
                    TimeStamp::Sequence(3),
                ],
                notify_type: 0,
                event_enable: BitString::new(5, vec![0b1110_0000]),
                event_priorities: [100, 100, 200],
            }],
            more_events: false,
        };
        let mut raw = [0u8; 128];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(GetEventInformationAck::decode(&mut cur).unwrap(), ack);
    }
}
