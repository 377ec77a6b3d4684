use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{decode_ctx_unsigned, encode_ctx_unsigned},
};
use crate::{DecodeError, EncodeError};

/// Who-Is request. The device-instance range is optional; when present both
/// limits are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WhoIs {
    pub range: Option<(u32, u32)>,
}

impl WhoIs {
    pub const fn global() -> Self {
        Self { range: None }
    }

    pub const fn limited(low: u32, high: u32) -> Self {
        Self {
            range: Some((low, high)),
        }
    }

    /// True when a device with this instance should answer.
    pub fn matches(&self, instance: u32) -> bool {
        match self.range {
            None => true,
            Some((low, high)) => (low..=high).contains(&instance),
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        if let Some((low, high)) = self.range {
            encode_ctx_unsigned(buf, 0, low)?;
            encode_ctx_unsigned(buf, 1, high)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        if cur.is_empty() {
            return Ok(Self::global());
        }
        let low = decode_ctx_unsigned(cur, 0)?;
        let high = decode_ctx_unsigned(cur, 1)?;
        if !cur.is_empty() {
            return Err(DecodeError::TooManyArguments);
        }
        Ok(Self::limited(low, high))
    }
}

#[cfg(test)]
mod tests {
    use super::WhoIs;
    use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};

    #[test]
    fn global_is_empty_payload() {
        let mut raw = [0u8; 8];
        let mut buf = EncodeBuffer::new(&mut raw);
        WhoIs::global().encode(&mut buf).unwrap();
        assert!(buf.payload().is_empty());
        let mut cur = DecodeCursor::new(buf.payload());
        assert_eq!(WhoIs::decode(&mut cur).unwrap(), WhoIs::global());
    }

    #[test]
    fn limited_roundtrip_and_matching() {
        let req = WhoIs::limited(100, 200);
        let mut raw = [0u8; 16];
        let mut buf = EncodeBuffer::new(&mut raw);
        req.encode(&mut buf).unwrap();
        let mut cur = DecodeCursor::new(buf.payload());
        let decoded = WhoIs::decode(&mut cur).unwrap();
        assert_eq!(decoded, req);
        assert!(decoded.matches(150));
        assert!(!decoded.matches(99));
        assert!(WhoIs::global().matches(4_194_302));
    }
}
