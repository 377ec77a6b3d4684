/// BACnet object types. Standard types are named variants; anything else
/// decodes as [`Proprietary`](Self::Proprietary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectType {
    AnalogInput,
    AnalogOutput,
    AnalogValue,
    BinaryInput,
    BinaryOutput,
    BinaryValue,
    Calendar,
    Command,
    Device,
    EventEnrollment,
    File,
    Group,
    Loop,
    MultiStateInput,
    MultiStateOutput,
    NotificationClass,
    Program,
    Schedule,
    Averaging,
    MultiStateValue,
    TrendLog,
    LifeSafetyPoint,
    LifeSafetyZone,
    Accumulator,
    PulseConverter,
    Proprietary(u16),
}

impl ObjectType {
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::AnalogInput => 0,
            Self::AnalogOutput => 1,
            Self::AnalogValue => 2,
            Self::BinaryInput => 3,
            Self::BinaryOutput => 4,
            Self::BinaryValue => 5,
            Self::Calendar => 6,
            Self::Command => 7,
            Self::Device => 8,
            Self::EventEnrollment => 9,
            Self::File => 10,
            Self::Group => 11,
            Self::Loop => 12,
            Self::MultiStateInput => 13,
            Self::MultiStateOutput => 14,
            Self::NotificationClass => 15,
            Self::Program => 16,
            Self::Schedule => 17,
            Self::Averaging => 18,
            Self::MultiStateValue => 19,
            Self::TrendLog => 20,
            Self::LifeSafetyPoint => 21,
            Self::LifeSafetyZone => 22,
            Self::Accumulator => 23,
            Self::PulseConverter => 24,
            Self::Proprietary(v) => v,
        }
    }

    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::AnalogInput,
            1 => Self::AnalogOutput,
            2 => Self::AnalogValue,
            3 => Self::BinaryInput,
            4 => Self::BinaryOutput,
            5 => Self::BinaryValue,
            6 => Self::Calendar,
            7 => Self::Command,
            8 => Self::Device,
            9 => Self::EventEnrollment,
            10 => Self::File,
            11 => Self::Group,
            12 => Self::Loop,
            13 => Self::MultiStateInput,
            14 => Self::MultiStateOutput,
            15 => Self::NotificationClass,
            16 => Self::Program,
            17 => Self::Schedule,
            18 => Self::Averaging,
            19 => Self::MultiStateValue,
            20 => Self::TrendLog,
            21 => Self::LifeSafetyPoint,
            22 => Self::LifeSafetyZone,
            23 => Self::Accumulator,
            24 => Self::PulseConverter,
            v => Self::Proprietary(v),
        }
    }

    /// Enum name used by the storage file format. Proprietary types render
    /// as their decimal number.
    pub fn name(self) -> &'static str {
        match self {
            Self::AnalogInput => "AnalogInput",
            Self::AnalogOutput => "AnalogOutput",
            Self::AnalogValue => "AnalogValue",
            Self::BinaryInput => "BinaryInput",
            Self::BinaryOutput => "BinaryOutput",
            Self::BinaryValue => "BinaryValue",
            Self::Calendar => "Calendar",
            Self::Command => "Command",
            Self::Device => "Device",
            Self::EventEnrollment => "EventEnrollment",
            Self::File => "File",
            Self::Group => "Group",
            Self::Loop => "Loop",
            Self::MultiStateInput => "MultiStateInput",
            Self::MultiStateOutput => "MultiStateOutput",
            Self::NotificationClass => "NotificationClass",
            Self::Program => "Program",
            Self::Schedule => "Schedule",
            Self::Averaging => "Averaging",
            Self::MultiStateValue => "MultiStateValue",
            Self::TrendLog => "TrendLog",
            Self::LifeSafetyPoint => "LifeSafetyPoint",
            Self::LifeSafetyZone => "LifeSafetyZone",
            Self::Accumulator => "Accumulator",
            Self::PulseConverter => "PulseConverter",
            Self::Proprietary(_) => "Proprietary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if let Ok(v) = name.parse::<u16>() {
            return Some(Self::from_u16(v));
        }
        let found = [
            Self::AnalogInput,
            Self::AnalogOutput,
            Self::AnalogValue,
            Self::BinaryInput,
            Self::BinaryOutput,
            Self::BinaryValue,
            Self::Calendar,
            Self::Command,
            Self::Device,
            Self::EventEnrollment,
            Self::File,
            Self::Group,
            Self::Loop,
            Self::MultiStateInput,
            Self::MultiStateOutput,
            Self::NotificationClass,
            Self::Program,
            Self::Schedule,
            Self::Averaging,
            Self::MultiStateValue,
            Self::TrendLog,
            Self::LifeSafetyPoint,
            Self::LifeSafetyZone,
            Self::Accumulator,
            Self::PulseConverter,
        ]
        .into_iter()
        .find(|t| t.name() == name)?;
        Some(found)
    }
}
