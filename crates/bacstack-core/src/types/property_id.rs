/// BACnet property identifiers. The set here covers the properties the
/// stack itself reads, writes, or persists; everything else round-trips
/// through [`Proprietary`](Self::Proprietary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyId {
    /// The `all` pseudo-property; expands to every property of the object.
    All,
    Description,
    EventState,
    FirmwareRevision,
    MaxApduLengthAccepted,
    ModelName,
    ObjectIdentifier,
    ObjectList,
    ObjectName,
    ObjectType,
    OutOfService,
    PresentValue,
    PriorityArray,
    ProtocolVersion,
    RelinquishDefault,
    SegmentationSupported,
    StatusFlags,
    SystemStatus,
    Units,
    VendorIdentifier,
    VendorName,
    ProtocolRevision,
    Proprietary(u32),
}

impl PropertyId {
    pub const fn to_u32(self) -> u32 {
        match self {
            Self::All => 8,
            Self::Description => 28,
            Self::EventState => 36,
            Self::FirmwareRevision => 44,
            Self::MaxApduLengthAccepted => 62,
            Self::ModelName => 70,
            Self::ObjectIdentifier => 75,
            Self::ObjectList => 76,
            Self::ObjectName => 77,
            Self::ObjectType => 79,
            Self::OutOfService => 81,
            Self::PresentValue => 85,
            Self::PriorityArray => 87,
            Self::ProtocolVersion => 98,
            Self::RelinquishDefault => 104,
            Self::SegmentationSupported => 107,
            Self::StatusFlags => 111,
            Self::SystemStatus => 112,
            Self::Units => 117,
            Self::VendorIdentifier => 120,
            Self::VendorName => 121,
            Self::ProtocolRevision => 139,
            Self::Proprietary(v) => v,
        }
    }

    pub const fn from_u32(value: u32) -> Self {
        match value {
            8 => Self::All,
            28 => Self::Description,
            36 => Self::EventState,
            44 => Self::FirmwareRevision,
            62 => Self::MaxApduLengthAccepted,
            70 => Self::ModelName,
            75 => Self::ObjectIdentifier,
            76 => Self::ObjectList,
            77 => Self::ObjectName,
            79 => Self::ObjectType,
            81 => Self::OutOfService,
            85 => Self::PresentValue,
            87 => Self::PriorityArray,
            98 => Self::ProtocolVersion,
            104 => Self::RelinquishDefault,
            107 => Self::SegmentationSupported,
            111 => Self::StatusFlags,
            112 => Self::SystemStatus,
            117 => Self::Units,
            120 => Self::VendorIdentifier,
            121 => Self::VendorName,
            139 => Self::ProtocolRevision,
            v => Self::Proprietary(v),
        }
    }

    /// Enum name used by the storage file format.
    pub fn name(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Description => "Description",
            Self::EventState => "EventState",
            Self::FirmwareRevision => "FirmwareRevision",
            Self::MaxApduLengthAccepted => "MaxApduLengthAccepted",
            Self::ModelName => "ModelName",
            Self::ObjectIdentifier => "ObjectIdentifier",
            Self::ObjectList => "ObjectList",
            Self::ObjectName => "ObjectName",
            Self::ObjectType => "ObjectType",
            Self::OutOfService => "OutOfService",
            Self::PresentValue => "PresentValue",
            Self::PriorityArray => "PriorityArray",
            Self::ProtocolVersion => "ProtocolVersion",
            Self::RelinquishDefault => "RelinquishDefault",
            Self::SegmentationSupported => "SegmentationSupported",
            Self::StatusFlags => "StatusFlags",
            Self::SystemStatus => "SystemStatus",
            Self::Units => "Units",
            Self::VendorIdentifier => "VendorIdentifier",
            Self::VendorName => "VendorName",
            Self::ProtocolRevision => "ProtocolRevision",
            Self::Proprietary(_) => "Proprietary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if let Ok(v) = name.parse::<u32>() {
            return Some(Self::from_u32(v));
        }
        [
            Self::All,
            Self::Description,
            Self::EventState,
            Self::FirmwareRevision,
            Self::MaxApduLengthAccepted,
            Self::ModelName,
            Self::ObjectIdentifier,
            Self::ObjectList,
            Self::ObjectName,
            Self::ObjectType,
            Self::OutOfService,
            Self::PresentValue,
            Self::PriorityArray,
            Self::ProtocolVersion,
            Self::RelinquishDefault,
            Self::SegmentationSupported,
            Self::StatusFlags,
            Self::SystemStatus,
            Self::Units,
            Self::VendorIdentifier,
            Self::VendorName,
            Self::ProtocolRevision,
        ]
        .into_iter()
        .find(|p| p.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::PropertyId;

    #[test]
    fn numeric_roundtrip() {
        assert_eq!(PropertyId::from_u32(85), PropertyId::PresentValue);
        assert_eq!(PropertyId::PresentValue.to_u32(), 85);
        assert_eq!(PropertyId::from_u32(9999), PropertyId::Proprietary(9999));
    }

    #[test]
    fn name_roundtrip() {
        assert_eq!(
            PropertyId::from_name("RelinquishDefault"),
            Some(PropertyId::RelinquishDefault)
        );
        assert_eq!(PropertyId::from_name("85"), Some(PropertyId::PresentValue));
        assert_eq!(PropertyId::from_name("Bogus"), None);
    }
}
