use crate::types::ObjectType;
use core::fmt;

/// Device instance that matches any device; rewritten to the local device id
/// before any storage lookup.
pub const WILDCARD_DEVICE_INSTANCE: u32 = 0x3F_FFFF;

/// Packed BACnet object identifier: 10-bit type in the upper bits, 22-bit
/// instance (0..=4_194_302) in the lower bits, as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId(u32);

impl ObjectId {
    pub const fn new(object_type: ObjectType, instance: u32) -> Self {
        Self((((object_type.to_u16() as u32) & 0x03FF) << 22) | (instance & WILDCARD_DEVICE_INSTANCE))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn object_type(self) -> ObjectType {
        ObjectType::from_u16(((self.0 >> 22) & 0x03FF) as u16)
    }

    pub const fn instance(self) -> u32 {
        self.0 & WILDCARD_DEVICE_INSTANCE
    }

    pub const fn is_wildcard_device(self) -> bool {
        matches!(self.object_type(), ObjectType::Device) && self.instance() == WILDCARD_DEVICE_INSTANCE
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type().name(), self.instance())
    }
}
