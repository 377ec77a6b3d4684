use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_character_string, decode_ctx_object_id, decode_ctx_unsigned,
        decode_opt_ctx_unsigned, encode_ctx_boolean, encode_ctx_character_string,
        encode_ctx_object_id, encode_ctx_unsigned,
    },
    tag::Tag,
};
use crate::types::{ObjectId, TaggedValue, Time};
use crate::{DecodeError, EncodeError};

/// A BACnet timestamp choice.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeStamp {
    Time(Time),
    Sequence(u32),
    /// Date and time carried as a constructed pair.
    DateTime(Vec<TaggedValue>),
}

impl TimeStamp {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::Time(time) => {
                Tag::Context { number: 0, len: 4 }.encode(buf)?;
                buf.push_slice(&time.octets())
            }
            Self::Sequence(seq) => encode_ctx_unsigned(buf, 1, *seq),
            Self::DateTime(values) => {
                Tag::Open { number: 2 }.encode(buf)?;
                for value in values {
                    value.encode(buf)?;
                }
                Tag::Close { number: 2 }.encode(buf)
            }
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        match Tag::decode(cur)? {
            Tag::Context { number: 0, len: 4 } => {
                let b = cur.take(4)?;
                Ok(Self::Time(Time::from_octets([b[0], b[1], b[2], b[3]])))
            }
            Tag::Context { number: 1, len } => Ok(Self::Sequence(
                crate::encoding::primitives::decode_unsigned_raw(cur, len as usize)?,
            )),
            Tag::Open { number: 2 } => {
                Ok(Self::DateTime(TaggedValue::decode_until_close(cur, 2)?))
            }
            _ => Err(DecodeError::InvalidTag),
        }
    }

    /// Decodes a timestamp wrapped in a constructed block `[number]`.
    pub fn decode_wrapped(cur: &mut DecodeCursor<'_>, number: u8) -> Result<Self, DecodeError> {
        Tag::expect_open(cur, number)?;
        let stamp = Self::decode(cur)?;
        Tag::expect_close(cur, number)?;
        Ok(stamp)
    }

    pub fn encode_wrapped(
        &self,
        buf: &mut EncodeBuffer<'_>,
        number: u8,
    ) -> Result<(), EncodeError> {
        Tag::Open { number }.encode(buf)?;
        self.encode(buf)?;
        Tag::Close { number }.encode(buf)
    }
}

/// Event notification payload, shared by the confirmed and unconfirmed
/// service variants. Event-specific parameter blocks are carried opaquely.
#[derive(Debug, Clone, PartialEq)]
pub struct EventNotification {
    pub process_id: u32,
    pub initiating_device: ObjectId,
    pub event_object: ObjectId,
    pub timestamp: TimeStamp,
    pub notification_class: u32,
    pub priority: u8,
    pub event_type: u32,
    pub message_text: Option<String>,
    pub notify_type: u32,
    pub ack_required: Option<bool>,
    pub from_state: Option<u32>,
    pub to_state: u32,
    /// Raw `[12]` event-values block, kept undecoded.
    pub event_values: Option<Vec<TaggedValue>>,
}

impl EventNotification {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_unsigned(buf, 0, self.process_id)?;
        encode_ctx_object_id(buf, 1, self.initiating_device.raw())?;
        encode_ctx_object_id(buf, 2, self.event_object.raw())?;
        self.timestamp.encode_wrapped(buf, 3)?;
        encode_ctx_unsigned(buf, 4, self.notification_class)?;
        encode_ctx_unsigned(buf, 5, u32::from(self.priority))?;
        encode_ctx_unsigned(buf, 6, self.event_type)?;
        if let Some(text) = &self.message_text {
            encode_ctx_character_string(buf, 7, text)?;
        }
        encode_ctx_unsigned(buf, 8, self.notify_type)?;
        if let Some(ack) = self.ack_required {
            encode_ctx_boolean(buf, 9, ack)?;
        }
        if let Some(from) = self.from_state {
            encode_ctx_unsigned(buf, 10, from)?;
        }
        encode_ctx_unsigned(buf, 11, self.to_state)?;
        if let Some(values) = &self.event_values {
            Tag::Open { number: 12 }.encode(buf)?;
            for value in values {
                value.encode(buf)?;
            }
            Tag::Close { number: 12 }.encode(buf)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let process_id = decode_ctx_unsigned(cur, 0)?;
        let initiating_device = ObjectId::from_raw(decode_ctx_object_id(cur, 1)?);
        let event_object = ObjectId::from_raw(decode_ctx_object_id(cur, 2)?);
        let timestamp = TimeStamp::decode_wrapped(cur, 3)?;
        let notification_class = decode_ctx_unsigned(cur, 4)?;
        let priority =
            u8::try_from(decode_ctx_unsigned(cur, 5)?).map_err(|_| DecodeError::InvalidValue)?;
        let event_type = decode_ctx_unsigned(cur, 6)?;
        let message_text = if cur.peek_context_tag(7) {
            Some(decode_ctx_character_string(cur, 7)?.to_owned())
        } else {
            None
        };
        let notify_type = decode_ctx_unsigned(cur, 8)?;
        let ack_required = if cur.peek_context_tag(9) {
            match Tag::decode(cur)? {
                Tag::Context { number: 9, len: 1 } => Some(cur.take_u8()? != 0),
                _ => return Err(DecodeError::InvalidTag),
            }
        } else {
            None
        };
        let from_state = decode_opt_ctx_unsigned(cur, 10)?;
        let to_state = decode_ctx_unsigned(cur, 11)?;
        let event_values = if cur.peek_open_tag(12) {
            Tag::expect_open(cur, 12)?;
            Some(TaggedValue::decode_until_close(cur, 12)?)
        } else {
            None
        };
        Ok(Self {
            process_id,
            initiating_device,
            event_object,
            timestamp,
            notification_class,
            priority,
            event_type,
            message_text,
            notify_type,
            ack_required,
            from_state,
            to_state,
            event_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{EventNotification, TimeStamp};
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::{ObjectId, ObjectType, Time};

    #[test]
    fn notification_roundtrip() {
        let req = EventNotification {
            process_id: 3,
            initiating_device: ObjectId::new(ObjectType::Device, 666),
            event_object: ObjectId::new(ObjectType::AnalogInput, 1),
            timestamp: TimeStamp::Time(Time {
                hour: 10,
                minute: 30,
                second: 0,
                hundredths: 0,
            }),
            notification_class: 4,
            priority: 100,
            event_type: 2,
            message_text: Some("high limit".into()),
            notify_type: 0,
            ack_required: Some(true),
            from_state: Some(0),
            to_state: 3,
            event_values: None,
        };
        let mut raw = [0u8; 128];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(EventNotification::decode(&mut cur).unwrap(), req);
    }

    #[test]
    fn timestamp_sequence_roundtrip() {
        let stamp = TimeStamp::Sequence(42);
        let mut raw = [0u8; 16];
        let mut buf = EncodeBuffer::new(&mut raw);
        stamp.encode_wrapped(&mut buf, 3).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(TimeStamp::decode_wrapped(&mut cur, 3).unwrap(), stamp);
    }
}
