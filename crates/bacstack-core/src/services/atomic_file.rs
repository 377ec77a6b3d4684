//! AtomicReadFile / AtomicWriteFile payloads, stream and record access.

use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{decode_app_unsigned, encode_app_unsigned},
    tag::{ApplicationTag, Tag},
};
use crate::types::ObjectId;
use crate::{DecodeError, EncodeError};

/// File access selector for a read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFileAccess {
    Stream {
        start_position: i32,
        octet_count: u32,
    },
    Record {
        start_record: i32,
        record_count: u32,
    },
}

/// AtomicReadFile request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicReadFile {
    pub file_id: ObjectId,
    pub access: ReadFileAccess,
}

impl AtomicReadFile {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_app_object_id(buf, self.file_id)?;
        match self.access {
            ReadFileAccess::Stream {
                start_position,
                octet_count,
            } => {
                Tag::Open { number: 0 }.encode(buf)?;
                encode_app_signed(buf, start_position)?;
                encode_app_unsigned(buf, octet_count)?;
                Tag::Close { number: 0 }.encode(buf)
            }
            ReadFileAccess::Record {
                start_record,
                record_count,
            } => {
                Tag::Open { number: 1 }.encode(buf)?;
                encode_app_signed(buf, start_record)?;
                encode_app_unsigned(buf, record_count)?;
                Tag::Close { number: 1 }.encode(buf)
            }
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let file_id = decode_app_object_id(cur)?;
        let access = match Tag::decode(cur)? {
            Tag::Open { number: 0 } => {
                let start_position = decode_app_signed(cur)?;
                let octet_count = decode_app_unsigned(cur)?;
                Tag::expect_close(cur, 0)?;
                ReadFileAccess::Stream {
                    start_position,
                    octet_count,
                }
            }
            Tag::Open { number: 1 } => {
                let start_record = decode_app_signed(cur)?;
                let record_count = decode_app_unsigned(cur)?;
                Tag::expect_close(cur, 1)?;
                ReadFileAccess::Record {
                    start_record,
                    record_count,
                }
            }
            _ => return Err(DecodeError::InvalidTag),
        };
        Ok(Self { file_id, access })
    }
}

/// AtomicReadFile acknowledgement payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomicReadFileAck {
    Stream {
        end_of_file: bool,
        start_position: i32,
        data: Vec<u8>,
    },
    Record {
        end_of_file: bool,
        start_record: i32,
        records: Vec<Vec<u8>>,
    },
}

impl AtomicReadFileAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::Stream {
                end_of_file,
                start_position,
                data,
            } => {
                encode_app_boolean(buf, *end_of_file)?;
                Tag::Open { number: 0 }.encode(buf)?;
                encode_app_signed(buf, *start_position)?;
                encode_app_octet_string(buf, data)?;
                Tag::Close { number: 0 }.encode(buf)
            }
            Self::Record {
                end_of_file,
                start_record,
                records,
            } => {
                encode_app_boolean(buf, *end_of_file)?;
                Tag::Open { number: 1 }.encode(buf)?;
                encode_app_signed(buf, *start_record)?;
                encode_app_unsigned(
                    buf,
                    u32::try_from(records.len()).map_err(|_| EncodeError::ValueOutOfRange)?,
                )?;
                for record in records {
                    encode_app_octet_string(buf, record)?;
                }
                Tag::Close { number: 1 }.encode(buf)
            }
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let end_of_file = decode_app_boolean(cur)?;
        match Tag::decode(cur)? {
            Tag::Open { number: 0 } => {
                let start_position = decode_app_signed(cur)?;
                let data = decode_app_octet_string(cur)?.to_vec();
                Tag::expect_close(cur, 0)?;
                Ok(Self::Stream {
                    end_of_file,
                    start_position,
                    data,
                })
            }
            Tag::Open { number: 1 } => {
                let start_record = decode_app_signed(cur)?;
                let count = decode_app_unsigned(cur)? as usize;
                let mut records = Vec::with_capacity(count);
                for _ in 0..count {
                    records.push(decode_app_octet_string(cur)?.to_vec());
                }
                Tag::expect_close(cur, 1)?;
                Ok(Self::Record {
                    end_of_file,
                    start_record,
                    records,
                })
            }
            _ => Err(DecodeError::InvalidTag),
        }
    }
}

/// AtomicWriteFile request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomicWriteFileData {
    Stream { start_position: i32, data: Vec<u8> },
    Record {
        start_record: i32,
        records: Vec<Vec<u8>>,
    },
}

/// AtomicWriteFile request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicWriteFile {
    pub file_id: ObjectId,
    pub data: AtomicWriteFileData,
}

impl AtomicWriteFile {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_app_object_id(buf, self.file_id)?;
        match &self.data {
            AtomicWriteFileData::Stream {
                start_position,
                data,
            } => {
                Tag::Open { number: 0 }.encode(buf)?;
                encode_app_signed(buf, *start_position)?;
                encode_app_octet_string(buf, data)?;
                Tag::Close { number: 0 }.encode(buf)
            }
            AtomicWriteFileData::Record {
                start_record,
                records,
            } => {
                Tag::Open { number: 1 }.encode(buf)?;
                encode_app_signed(buf, *start_record)?;
                encode_app_unsigned(
                    buf,
                    u32::try_from(records.len()).map_err(|_| EncodeError::ValueOutOfRange)?,
                )?;
                for record in records {
                    encode_app_octet_string(buf, record)?;
                }
                Tag::Close { number: 1 }.encode(buf)
            }
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let file_id = decode_app_object_id(cur)?;
        let data = match Tag::decode(cur)? {
            Tag::Open { number: 0 } => {
                let start_position = decode_app_signed(cur)?;
                let data = decode_app_octet_string(cur)?.to_vec();
                Tag::expect_close(cur, 0)?;
                AtomicWriteFileData::Stream {
                    start_position,
                    data,
                }
            }
            Tag::Open { number: 1 } => {
                let start_record = decode_app_signed(cur)?;
                let count = decode_app_unsigned(cur)? as usize;
                let mut records = Vec::with_capacity(count);
                for _ in 0..count {
                    records.push(decode_app_octet_string(cur)?.to_vec());
                }
                Tag::expect_close(cur, 1)?;
                AtomicWriteFileData::Record {
                    start_record,
                    records,
                }
            }
            _ => return Err(DecodeError::InvalidTag),
        };
        Ok(Self { file_id, data })
    }
}

/// AtomicWriteFile acknowledgement: where the write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicWriteFileAck {
    Stream { start_position: i32 },
    Record { start_record: i32 },
}

impl AtomicWriteFileAck {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::Stream { start_position } => {
                crate::encoding::primitives::encode_ctx_signed(buf, 0, *start_position)
            }
            Self::Record { start_record } => {
                crate::encoding::primitives::encode_ctx_signed(buf, 1, *start_record)
            }
        }
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        match Tag::decode(cur)? {
            Tag::Context { number: 0, len } => Ok(Self::Stream {
                start_position: crate::encoding::primitives::decode_signed_raw(cur, len as usize)?,
            }),
            Tag::Context { number: 1, len } => Ok(Self::Record {
                start_record: crate::encoding::primitives::decode_signed_raw(cur, len as usize)?,
            }),
            _ => Err(DecodeError::InvalidTag),
        }
    }
}

fn encode_app_object_id(buf: &mut EncodeBuffer<'_>, id: ObjectId) -> Result<(), EncodeError> {
    Tag::Application {
        kind: ApplicationTag::ObjectId,
        len: 4,
    }
    .encode(buf)?;
    buf.push_be_u32(id.raw())
}

fn decode_app_object_id(cur: &mut DecodeCursor<'_>) -> Result<ObjectId, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::ObjectId,
            len: 4,
        } => Ok(ObjectId::from_raw(cur.take_be_u32()?)),
        _ => Err(DecodeError::InvalidTag),
    }
}

fn encode_app_signed(buf: &mut EncodeBuffer<'_>, value: i32) -> Result<(), EncodeError> {
    Tag::Application {
        kind: ApplicationTag::SignedInt,
        len: crate::encoding::primitives::signed_len(value),
    }
    .encode(buf)?;
    crate::encoding::primitives::encode_signed_raw(buf, value)?;
    Ok(())
}

fn decode_app_signed(cur: &mut DecodeCursor<'_>) -> Result<i32, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::SignedInt,
            len,
        } => crate::encoding::primitives::decode_signed_raw(cur, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

fn encode_app_boolean(buf: &mut EncodeBuffer<'_>, value: bool) -> Result<(), EncodeError> {
    Tag::Application {
        kind: ApplicationTag::Boolean,
        len: u32::from(value),
    }
    .encode(buf)
}

fn decode_app_boolean(cur: &mut DecodeCursor<'_>) -> Result<bool, DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::Boolean,
            len,
        } => Ok(len != 0),
        _ => Err(DecodeError::InvalidTag),
    }
}

fn encode_app_octet_string(buf: &mut EncodeBuffer<'_>, data: &[u8]) -> Result<(), EncodeError> {
    Tag::Application {
        kind: ApplicationTag::OctetString,
        len: u32::try_from(data.len()).map_err(|_| EncodeError::ValueOutOfRange)?,
    }
    .encode(buf)?;
    buf.push_slice(data)
}

fn decode_app_octet_string<'a>(cur: &mut DecodeCursor<'a>) -> Result<&'a [u8], DecodeError> {
    match Tag::decode(cur)? {
        Tag::Application {
            kind: ApplicationTag::OctetString,
            len,
        } => cur.take(len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
    use crate::types::{ObjectId, ObjectType};

    #[test]
    fn read_request_stream_roundtrip() {
        let req = AtomicReadFile {
            file_id: ObjectId::new(ObjectType::File, 1),
            access: ReadFileAccess::Stream {
                start_position: 0,
                octet_count: 1024,
            },
        };
        let mut raw = [0u8; 32];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(AtomicReadFile::decode(&mut cur).unwrap(), req);
    }

    #[test]
    fn read_ack_record_roundtrip() {
        let ack = AtomicReadFileAck::Record {
            end_of_file: true,
            start_record: 2,
            records: vec![vec![1, 2, 3], vec![4, 5]],
        };
        let mut raw = [0u8; 64];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(AtomicReadFileAck::decode(&mut cur).unwrap(), ack);
    }

    #[test]
    fn write_roundtrip() {
        let req = AtomicWriteFile {
            file_id: ObjectId::new(ObjectType::File, 3),
            data: AtomicWriteFileData::Stream {
                start_position: -1,
                data: vec![0xAB; 16],
            },
        };
        let mut raw = [0u8; 64];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(AtomicWriteFile::decode(&mut cur).unwrap(), req);

        let ack = AtomicWriteFileAck::Stream { start_position: 16 };
        let mut raw = [0u8; 16];
        let mut buf = EncodeBuffer::new(&mut raw);
        ack.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(AtomicWriteFileAck::decode(&mut cur).unwrap(), ack);
    }
}
