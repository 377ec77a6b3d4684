//! DeviceCommunicationControl and ReinitializeDevice payloads.

use crate::encoding::{
    buffer::EncodeBuffer,
    cursor::DecodeCursor,
    primitives::{
        decode_ctx_character_string, decode_ctx_unsigned, decode_opt_ctx_unsigned,
        encode_ctx_character_string, encode_ctx_enumerated, encode_ctx_unsigned,
    },
};
use crate::{DecodeError, EncodeError};

/// Whether the device should keep talking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommunicationState {
    Enable = 0,
    Disable = 1,
    DisableInitiation = 2,
}

impl CommunicationState {
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Enable),
            1 => Some(Self::Disable),
            2 => Some(Self::DisableInitiation),
            _ => None,
        }
    }
}

/// DeviceCommunicationControl request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommunicationControl {
    pub duration_minutes: Option<u16>,
    pub state: CommunicationState,
    pub password: Option<String>,
}

impl DeviceCommunicationControl {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        if let Some(duration) = self.duration_minutes {
            encode_ctx_unsigned(buf, 0, u32::from(duration))?;
        }
        encode_ctx_enumerated(buf, 1, self.state as u32)?;
        if let Some(password) = &self.password {
            encode_ctx_character_string(buf, 2, password)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let duration_minutes = decode_opt_ctx_unsigned(cur, 0)?
            .map(|d| u16::try_from(d).map_err(|_| DecodeError::InvalidValue))
            .transpose()?;
        let state = CommunicationState::from_u32(decode_ctx_unsigned(cur, 1)?)
            .ok_or(DecodeError::InvalidValue)?;
        let password = if cur.peek_context_tag(2) {
            Some(decode_ctx_character_string(cur, 2)?.to_owned())
        } else {
            None
        };
        Ok(Self {
            duration_minutes,
            state,
            password,
        })
    }
}

/// Reinitialization target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReinitializeKind {
    ColdStart = 0,
    WarmStart = 1,
    StartBackup = 2,
    EndBackup = 3,
    StartRestore = 4,
    EndRestore = 5,
    AbortRestore = 6,
}

impl ReinitializeKind {
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::ColdStart),
            1 => Some(Self::WarmStart),
            2 => Some(Self::StartBackup),
            3 => Some(Self::EndBackup),
            4 => Some(Self::StartRestore),
            5 => Some(Self::EndRestore),
            6 => Some(Self::AbortRestore),
            _ => None,
        }
    }
}

/// ReinitializeDevice request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReinitializeDevice {
    pub kind: ReinitializeKind,
    pub password: Option<String>,
}

impl ReinitializeDevice {
    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        encode_ctx_enumerated(buf, 0, self.kind as u32)?;
        if let Some(password) = &self.password {
            encode_ctx_character_string(buf, 1, password)?;
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        let kind = ReinitializeKind::from_u32(decode_ctx_unsigned(cur, 0)?)
            .ok_or(DecodeError::InvalidValue)?;
        let password = if cur.peek_context_tag(1) {
            Some(decode_ctx_character_string(cur, 1)?.to_owned())
        } else {
            None
        };
        Ok(Self { kind, password })
    }
}
