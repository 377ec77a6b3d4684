use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_app_enumerated, decode_app_unsigned, encode_app_enumerated, encode_app_unsigned,
    },
    tag::{ApplicationTag, Tag},
};
use crate::types::{ObjectId, Segmentation};
use crate::{DecodeError, EncodeError};

/// I-Am announcement: device identity and transfer capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IAm {
    pub device_id: ObjectId,
    pub max_apdu: u32,
    pub segmentation: Segmentation,
    pub vendor_id: u32,
}

impl IAm {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        Tag::Application {
            kind: ApplicationTag::ObjectId,
            len: 4,
        }
        .encode(buf)?;
        buf.push_be_u32(self.device_id.raw())?;
        encode_app_unsigned(buf, self.max_apdu)?;
        encode_app_enumerated(buf, self.segmentation.to_u32())?;
        encode_app_unsigned(buf, self.vendor_id)
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let device_id = match Tag::decode(cur)? {
            Tag::Application {
                kind: ApplicationTag::ObjectId,
                len: 4,
            } => ObjectId::from_raw(cur.take_be_u32()?),
            _ => return Err(DecodeError::InvalidTag),
        };
        let max_apdu = decode_app_unsigned(cur)?;
        let segmentation = Segmentation::from_u32(decode_app_enumerated(cur)?)
            .ok_or(DecodeError::InvalidValue)?;
        let vendor_id = decode_app_unsigned(cur)?;
        Ok(Self {
            device_id,
            max_apdu,
            segmentation,
            vendor_id,
        })
    }
}
