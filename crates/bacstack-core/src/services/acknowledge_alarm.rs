use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_character_string, decode_ctx_object_id, decode_ctx_unsigned,
        encode_ctx_character_string, encode_ctx_object_id, encode_ctx_unsigned,
    },
};
use crate::services::event_notification::TimeStamp;
use crate::types::ObjectId;
use crate::{DecodeError, EncodeError};

/// AcknowledgeAlarm request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeAlarm {
    pub process_id: u32,
    pub event_object: ObjectId,
    pub event_state_acknowledged: u32,
    pub event_timestamp: TimeStamp,
    pub acknowledgment_source: String,
    pub acknowledgment_timestamp: TimeStamp,
}

impl AcknowledgeAlarm {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_unsigned(buf, 0, self.process_id)?;
        encode_ctx_object_id(buf, 1, self.event_object.raw())?;
        encode_ctx_unsigned(buf, 2, self.event_state_acknowledged)?;
        self.event_timestamp.encode_wrapped(buf, 3)?;
        encode_ctx_character_string(buf, 4, &self.acknowledgment_source)?;
        self.acknowledgment_timestamp.encode_wrapped(buf, 5)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let process_id = decode_ctx_unsigned(cur, 0)?;
        let event_object = ObjectId::from_raw(decode_ctx_object_id(cur, 1)?);
        let event_state_acknowledged = decode_ctx_unsigned(cur, 2)?;
        let event_timestamp = TimeStamp::decode_wrapped(cur, 3)?;
        let acknowledgment_source = decode_ctx_character_string(cur, 4)?.to_owned();
        let acknowledgment_timestamp = TimeStamp::decode_wrapped(cur, 5)?;
        if !cur.is_empty() {
            return Err(DecodeError::TooManyArguments);
        }
        Ok(Self {
            process_id,
            event_object,
            event_state_acknowledged,
            event_timestamp,
            acknowledgment_source,
            acknowledgment_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::AcknowledgeAlarm;
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::services::event_notification::TimeStamp;
    use crate::types::{ObjectId, ObjectType, Time};

    #[test]
    fn acknowledge_roundtrip() {
        let req = AcknowledgeAlarm {
            process_id: 1,
            event_object: ObjectId::new(ObjectType::AnalogInput, 2),
            event_state_acknowledged: 3,
            event_timestamp: TimeStamp::Sequence(16),
            acknowledgment_source: "operator".into(),
            acknowledgment_timestamp: TimeStamp::Time(Time {
                hour: 9,
                minute: 0,
                second: 0,
                hundredths: 0,
            }),
        };
        let mut raw = [0u8; 128];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(AcknowledgeAlarm::decode(&mut cur).unwrap(), req);
    }
}
