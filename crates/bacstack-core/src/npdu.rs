use crate::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
use crate::{DecodeError, EncodeError};

/// Network layer protocol version, always `0x01`.
pub const NPDU_VERSION: u8 = 0x01;

const CTRL_NETWORK_MESSAGE: u8 = 0x80;
const CTRL_DESTINATION: u8 = 0x20;
const CTRL_SOURCE: u8 = 0x08;
const CTRL_EXPECTING_REPLY: u8 = 0x04;
const CTRL_PRIORITY_MASK: u8 = 0x03;

/// A routed station: network number plus data-link MAC bytes. An empty MAC
/// with a destination means "broadcast on that network".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteStation {
    pub network: u16,
    pub mac: Vec<u8>,
}

/// Network-layer message header carried when the control byte flags a
/// network message instead of an APDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkMessage {
    pub message_type: u8,
    /// Present only for vendor message types (0x80..).
    pub vendor_id: Option<u16>,
}

/// The NPDU header that precedes every APDU.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Npdu {
    pub priority: u8,
    pub expecting_reply: bool,
    pub destination: Option<RemoteStation>,
    pub source: Option<RemoteStation>,
    /// Encoded only when a destination is present; defaults to 255.
    pub hop_count: Option<u8>,
    pub network_message: Option<NetworkMessage>,
}

impl Npdu {
    /// Header for an application request; `expecting_reply` is set for
    /// confirmed requests.
    pub fn application(expecting_reply: bool) -> Self {
        Self {
            expecting_reply,
            ..Self::default()
        }
    }

    pub fn is_network_message(&self) -> bool {
        self.network_message.is_some()
    }

    fn control(&self) -> u8 {
        let mut control = self.priority & CTRL_PRIORITY_MASK;
        if self.network_message.is_some() {
            control |= CTRL_NETWORK_MESSAGE;
        }
        if self.destination.is_some() {
            control |= CTRL_DESTINATION;
        }
        if self.source.is_some() {
            control |= CTRL_SOURCE;
        }
        if self.expecting_reply {
            control |= CTRL_EXPECTING_REPLY;
        }
        control
    }

    pub fn encode(&self, buf: &mut EncodeBuffer<'_>) -> Result<(), EncodeError> {
        buf.push_u8(NPDU_VERSION)?;
        buf.push_u8(self.control())?;

        if let Some(dest) = &self.destination {
            encode_station(buf, dest)?;
        }
        if let Some(src) = &self.source {
            encode_station(buf, src)?;
        }
        if self.destination.is_some() {
            buf.push_u8(self.hop_count.unwrap_or(255))?;
        }
        if let Some(msg) = &self.network_message {
            buf.push_u8(msg.message_type)?;
            if msg.message_type >= 0x80 {
                buf.push_be_u16(msg.vendor_id.unwrap_or(0))?;
            }
        }
        Ok(())
    }

    pub fn decode(cur: &mut DecodeCursor<'_>) -> Result<Self, DecodeError> {
        if cur.take_u8()? != NPDU_VERSION {
            return Err(DecodeError::InvalidValue);
        }
        let control = cur.take_u8()?;

        let destination = if (control & CTRL_DESTINATION) != 0 {
            Some(decode_station(cur)?)
        } else {
            None
        };
        let source = if (control & CTRL_SOURCE) != 0 {
            Some(decode_station(cur)?)
        } else {
            None
        };
        let hop_count = if destination.is_some() {
            Some(cur.take_u8()?)
        } else {
            None
        };
        let network_message = if (control & CTRL_NETWORK_MESSAGE) != 0 {
            let message_type = cur.take_u8()?;
            let vendor_id = if message_type >= 0x80 {
                Some(cur.take_be_u16()?)
            } else {
                None
            };
            Some(NetworkMessage {
                message_type,
                vendor_id,
            })
        } else {
            None
        };

        Ok(Self {
            priority: control & CTRL_PRIORITY_MASK,
            expecting_reply: (control & CTRL_EXPECTING_REPLY) != 0,
            destination,
            source,
            hop_count,
            network_message,
        })
    }
}

fn encode_station(buf: &mut EncodeBuffer<'_>, station: &RemoteStation) -> Result<(), EncodeError> {
    let len = u8::try_from(station.mac.len()).map_err(|_| EncodeError::InvalidLength)?;
    buf.push_be_u16(station.network)?;
    buf.push_u8(len)?;
    buf.push_slice(&station.mac)
}

fn decode_station(cur: &mut DecodeCursor<'_>) -> Result<RemoteStation, DecodeError> {
    let network = cur.take_be_u16()?;
    let len = cur.take_u8()?;
    Ok(RemoteStation {
        network,
        mac: cur.take(len as usize)?.to_vec(),
    })
}
