//! TimeSynchronization payload, used by both the local and UTC variants
//! (the service choice distinguishes them).

use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    tag::{ApplicationTag, Tag},
};
use crate::types::{Date, Time};
use crate::{DecodeError, EncodeError};

/// The broadcast date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSynchronization {
    pub date: Date,
    pub time: Time,
}

impl TimeSynchronization {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        Tag::Application {
            kind: ApplicationTag::Date,
            len: 4,
        }
        .encode(buf)?;
        buf.push_slice(&self.date.octets())?;
        Tag::Application {
            kind: ApplicationTag::Time,
            len: 4,
        }
        .encode(buf)?;
        buf.push_slice(&self.time.octets())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let date = match Tag::decode(cur)? {
            Tag::Application {
                kind: ApplicationTag::Date,
                len: 4,
            } => {
                let b = cur.take(4)?;
                Date::from_octets([b[0], b[1], b[2], b[3]])
            }
            _ => return Err(DecodeError::InvalidTag),
        };
        let time = match Tag::decode(cur)? {
            Tag::Application {
                kind: ApplicationTag::Time,
                len: 4,
            } => {
                let b = cur.take(4)?;
                Time::from_octets([b[0], b[1], b[2], b[3]])
            }
            _ => return Err(DecodeError::InvalidTag),
        };
        Ok(Self { date, time })
    }
}
