//! Enumerations defined by the protocol: segmentation support, max-APDU
//! codes, and the error/reject/abort vocabularies.

/// Segmentation capability advertised in I-Am.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Segmentation {
    Both = 0,
    Transmit = 1,
    Receive = 2,
    None = 3,
}

impl Segmentation {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Both),
            1 => Some(Self::Transmit),
            2 => Some(Self::Receive),
            3 => Some(Self::None),
            _ => None,
        }
    }
}

/// The max-APDU code carried in confirmed-request headers, and its octet
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MaxApdu {
    UpTo50 = 0,
    UpTo128 = 1,
    UpTo206 = 2,
    UpTo480 = 3,
    UpTo1024 = 4,
    UpTo1476 = 5,
}

impl MaxApdu {
    pub const fn octets(self) -> usize {
        match self {
            Self::UpTo50 => 50,
            Self::UpTo128 => 128,
            Self::UpTo206 => 206,
            Self::UpTo480 => 480,
            Self::UpTo1024 => 1024,
            Self::UpTo1476 => 1476,
        }
    }

    pub const fn from_code(code: u8) -> Self {
        match code & 0x0F {
            0 => Self::UpTo50,
            1 => Self::UpTo128,
            2 => Self::UpTo206,
            3 => Self::UpTo480,
            4 => Self::UpTo1024,
            _ => Self::UpTo1476,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Smallest code whose octet count covers `octets`.
    pub const fn for_octets(octets: usize) -> Self {
        match octets {
            0..=50 => Self::UpTo50,
            51..=128 => Self::UpTo128,
            129..=206 => Self::UpTo206,
            207..=480 => Self::UpTo480,
            481..=1024 => Self::UpTo1024,
            _ => Self::UpTo1476,
        }
    }
}

macro_rules! wire_enum {
    ($(#[$doc:meta])* $name:ident: $repr:ty { $($variant:ident = $num:expr),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $($variant,)+
            Unknown($repr),
        }

        impl $name {
            pub const fn to_raw(self) -> $repr {
                match self {
                    $(Self::$variant => $num,)+
                    Self::Unknown(v) => v,
                }
            }

            pub const fn from_raw(value: $repr) -> Self {
                match value {
                    $($num => Self::$variant,)+
                    v => Self::Unknown(v),
                }
            }
        }
    };
}

wire_enum! {
    /// Error class carried in Error PDUs.
    ErrorClass: u32 {
        Device = 0,
        Object = 1,
        Property = 2,
        Resources = 3,
        Security = 4,
        Services = 5,
        Vt = 6,
        Communication = 7,
    }
}

wire_enum! {
    /// Error code carried in Error PDUs.
    ErrorCode: u32 {
        Other = 0,
        ConfigurationInProgress = 2,
        DeviceBusy = 3,
        Timeout = 30,
        UnknownObject = 31,
        UnknownProperty = 32,
        ValueOutOfRange = 37,
        WriteAccessDenied = 40,
        InvalidArrayIndex = 42,
    }
}

wire_enum! {
    /// Reject reason carried in Reject PDUs.
    RejectReason: u8 {
        Other = 0,
        BufferOverflow = 1,
        InconsistentParameters = 2,
        InvalidParameterDataType = 3,
        InvalidTag = 4,
        MissingRequiredParameter = 5,
        ParameterOutOfRange = 6,
        TooManyArguments = 7,
        UndefinedEnumeration = 8,
        UnrecognizedService = 9,
    }
}

wire_enum! {
    /// Abort reason carried in Abort PDUs.
    AbortReason: u8 {
        Other = 0,
        BufferOverflow = 1,
        InvalidApduInThisState = 2,
        PreemptedByHigherPriorityTask = 3,
        SegmentationNotSupported = 4,
        SecurityError = 5,
        InsufficientSecurity = 6,
        WindowSizeOutOfRange = 7,
        ApplicationExceededReplyTime = 8,
        OutOfResources = 9,
        TsmTimeout = 10,
        ApduTooLong = 11,
    }
}

#[cfg(test)]
mod tests {
    use super::{AbortReason, ErrorCode, MaxApdu, RejectReason};

    #[test]
    fn max_apdu_codes() {
        assert_eq!(MaxApdu::from_code(5).octets(), 1476);
        assert_eq!(MaxApdu::for_octets(480).code(), 3);
        assert_eq!(MaxApdu::for_octets(481), MaxApdu::UpTo1024);
    }

    #[test]
    fn unknown_codes_survive() {
        assert_eq!(ErrorCode::from_raw(77), ErrorCode::Unknown(77));
        assert_eq!(ErrorCode::Unknown(77).to_raw(), 77);
        assert_eq!(RejectReason::from_raw(9), RejectReason::UnrecognizedService);
        assert_eq!(AbortReason::from_raw(11), AbortReason::ApduTooLong);
    }
}
