//! BVLC: the 4-byte virtual-link-control prefix on every BACnet/IP
//! datagram.

use bacstack_core::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
use bacstack_core::{DecodeError, EncodeError};

/// BVLC type octet for BACnet/IP.
pub const BVLC_TYPE: u8 = 0x81;

/// Length of the BVLC prefix; transports reserve this much header space.
pub const BVLC_HEADER_LEN: usize = 4;

/// BVLC function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BvlcFunction {
    Result,
    WriteBroadcastDistributionTable,
    ReadBroadcastDistributionTable,
    ReadBroadcastDistributionTableAck,
    ForwardedNpdu,
    RegisterForeignDevice,
    ReadForeignDeviceTable,
    ReadForeignDeviceTableAck,
    DeleteForeignDeviceTableEntry,
    DistributeBroadcastToNetwork,
    OriginalUnicastNpdu,
    OriginalBroadcastNpdu,
    Unknown(u8),
}

impl BvlcFunction {
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Result,
            0x01 => Self::WriteBroadcastDistributionTable,
            0x02 => Self::ReadBroadcastDistributionTable,
            0x03 => Self::ReadBroadcastDistributionTableAck,
            0x04 => Self::ForwardedNpdu,
            0x05 => Self::RegisterForeignDevice,
            0x06 => Self::ReadForeignDeviceTable,
            0x07 => Self::ReadForeignDeviceTableAck,
            0x08 => Self::DeleteForeignDeviceTableEntry,
            0x09 => Self::DistributeBroadcastToNetwork,
            0x0A => Self::OriginalUnicastNpdu,
            0x0B => Self::OriginalBroadcastNpdu,
            v => Self::Unknown(v),
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Result => 0x00,
            Self::WriteBroadcastDistributionTable => 0x01,
            Self::ReadBroadcastDistributionTable => 0x02,
            Self::ReadBroadcastDistributionTableAck => 0x03,
            Self::ForwardedNpdu => 0x04,
            Self::RegisterForeignDevice => 0x05,
            Self::ReadForeignDeviceTable => 0x06,
            Self::ReadForeignDeviceTableAck => 0x07,
            Self::DeleteForeignDeviceTableEntry => 0x08,
            Self::DistributeBroadcastToNetwork => 0x09,
            Self::OriginalUnicastNpdu => 0x0A,
            Self::OriginalBroadcastNpdu => 0x0B,
            Self::Unknown(v) => v,
        }
    }
}

/// The BVLC header: type, function, and total datagram length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvlcHeader {
    pub function: BvlcFunction,
    /// Total datagram length, the 4 header bytes included.
    pub length: u16,
}

impl BvlcHeader {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        buf.push_u8(BVLC_TYPE)?;
        buf.push_u8(self.function.to_u8())?;
        buf.push_be_u16(self.length)
    }

    /// Writes the header directly into a reserved 4-byte prefix.
    pub fn write_into(&self, header: &mut [u8]) -> Result<(), EncodeError> {
        if header.len() != BVLC_HEADER_LEN {
            return Err(EncodeError::InvalidLength);
        }
        header[0] = BVLC_TYPE;
        header[1] = self.function.to_u8();
        header[2..4].copy_from_slice(&self.length.to_be_bytes());
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        if cur.take_u8()? != BVLC_TYPE {
            return Err(DecodeError::InvalidValue);
        }
        let function = BvlcFunction::from_u8(cur.take_u8()?);
        let length = cur.take_be_u16()?;
        if (length as usize) < BVLC_HEADER_LEN {
            return Err(DecodeError::InvalidLength);
        }
        Ok(Self { function, length })
    }
}
