/// Confirmed service choices, with their standard numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConfirmedService {
    AcknowledgeAlarm = 0,
    CovNotification = 1,
    EventNotification = 2,
    SubscribeCov = 5,
    AtomicReadFile = 6,
    AtomicWriteFile = 7,
    AddListElement = 8,
    RemoveListElement = 9,
    CreateObject = 10,
    DeleteObject = 11,
    ReadProperty = 12,
    ReadPropertyMultiple = 14,
    WriteProperty = 15,
    WritePropertyMultiple = 16,
    DeviceCommunicationControl = 17,
    ReinitializeDevice = 20,
    ReadRange = 26,
    LifeSafetyOperation = 27,
    SubscribeCovProperty = 28,
    GetEventInformation = 29,
}

impl ConfirmedService {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::AcknowledgeAlarm),
            1 => Some(Self::CovNotification),
            2 => Some(Self::EventNotification),
            5 => Some(Self::SubscribeCov),
            6 => Some(Self::AtomicReadFile),
            7 => Some(Self::AtomicWriteFile),
            8 => Some(Self::AddListElement),
            9 => Some(Self::RemoveListElement),
            10 => Some(Self::CreateObject),
            11 => Some(Self::DeleteObject),
            12 => Some(Self::ReadProperty),
            14 => Some(Self::ReadPropertyMultiple),
            15 => Some(Self::WriteProperty),
            16 => Some(Self::WritePropertyMultiple),
            17 => Some(Self::DeviceCommunicationControl),
            20 => Some(Self::ReinitializeDevice),
            26 => Some(Self::ReadRange),
            27 => Some(Self::LifeSafetyOperation),
            28 => Some(Self::SubscribeCovProperty),
            29 => Some(Self::GetEventInformation),
            _ => None,
        }
    }
}

/// Unconfirmed service choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnconfirmedService {
    IAm = 0,
    IHave = 1,
    CovNotification = 2,
    EventNotification = 3,
    TimeSynchronization = 6,
    WhoHas = 7,
    WhoIs = 8,
    UtcTimeSynchronization = 9,
}

impl UnconfirmedService {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::IAm),
            1 => Some(Self::IHave),
            2 => Some(Self::CovNotification),
            3 => Some(Self::EventNotification),
            6 => Some(Self::TimeSynchronization),
            7 => Some(Self::WhoHas),
            8 => Some(Self::WhoIs),
            9 => Some(Self::UtcTimeSynchronization),
            _ => None,
        }
    }
}
