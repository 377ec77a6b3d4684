//! Point addressing and runtime-type inference.
//!
//! Integrations address objects by the compact string form
//! `"<instance>_<type>"` where both parts are decimal; a missing type
//! defaults to 0 (analog-input).

use crate::error::ClientError;
use bacstack_core::encoding::tag::ApplicationTag;
use bacstack_core::types::{ObjectId, ObjectType, TaggedValue};
use core::fmt;
use std::str::FromStr;

/// A parsed point name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointRef {
    pub instance: u32,
    pub object_type: ObjectType,
}

impl PointRef {
    pub const fn new(object_type: ObjectType, instance: u32) -> Self {
        Self {
            instance,
            object_type,
        }
    }

    pub const fn object_id(self) -> ObjectId {
        ObjectId::new(self.object_type, self.instance)
    }

    pub const fn from_object_id(id: ObjectId) -> Self {
        Self {
            instance: id.instance(),
            object_type: id.object_type(),
        }
    }
}

impl FromStr for PointRef {
    type Err = ClientError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let bad = || ClientError::BadPointName(name.to_owned());
        let (instance_text, type_text) = match name.split_once('_') {
            Some((i, t)) => (i, t),
            None => (name, ""),
        };
        let instance: u32 = instance_text.parse().map_err(|_| bad())?;
        let object_type = if type_text.is_empty() {
            ObjectType::AnalogInput
        } else {
            ObjectType::from_u16(type_text.parse().map_err(|_| bad())?)
        };
        Ok(Self {
            instance,
            object_type,
        })
    }
}

impl fmt::Display for PointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.instance, self.object_type.to_u16())
    }
}

/// The runtime data kind of a point, inferred from the device's answers
/// or, before any answer, from the object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum PointKind {
    Real,
    Boolean,
    Unsigned,
    Signed,
    Text,
    Enumerated,
    #[default]
    Unknown,
}

impl PointKind {
    /// Default kind when the device has not yet answered: analog objects
    /// read as reals, binary as booleans, multi-state and command objects
    /// as unsigned.
    pub const fn for_object_type(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::AnalogInput | ObjectType::AnalogOutput | ObjectType::AnalogValue => {
                Self::Real
            }
            ObjectType::BinaryInput | ObjectType::BinaryOutput | ObjectType::BinaryValue => {
                Self::Boolean
            }
            ObjectType::MultiStateInput
            | ObjectType::MultiStateOutput
            | ObjectType::MultiStateValue
            | ObjectType::Command => Self::Unsigned,
            _ => Self::Unknown,
        }
    }

    /// Kind observed in an actual value.
    pub fn for_value(value: &TaggedValue) -> Self {
        match value.app_tag() {
            Some(ApplicationTag::Real) | Some(ApplicationTag::Double) => Self::Real,
            Some(ApplicationTag::Boolean) => Self::Boolean,
            Some(ApplicationTag::UnsignedInt) => Self::Unsigned,
            Some(ApplicationTag::SignedInt) => Self::Signed,
            Some(ApplicationTag::CharacterString) => Self::Text,
            Some(ApplicationTag::Enumerated) => Self::Enumerated,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PointKind, PointRef};
    use bacstack_core::types::{ObjectType, TaggedValue};

    #[test]
    fn parse_full_form() {
        let point: PointRef = "3_0".parse().unwrap();
        assert_eq!(point.instance, 3);
        assert_eq!(point.object_type, ObjectType::AnalogInput);

        let point: PointRef = "0_2".parse().unwrap();
        assert_eq!(point.instance, 0);
        assert_eq!(point.object_type, ObjectType::AnalogValue);
    }

    #[test]
    fn parse_defaults_missing_type_to_analog_input() {
        let point: PointRef = "7".parse().unwrap();
        assert_eq!(point.instance, 7);
        assert_eq!(point.object_type, ObjectType::AnalogInput);
    }

    #[test]
    fn format_roundtrip() {
        let point: PointRef = "12_19".parse().unwrap();
        assert_eq!(point.to_string(), "12_19");
        assert_eq!(point.object_type, ObjectType::MultiStateValue);
    }

    #[test]
    fn bad_names_are_rejected() {
        assert!("".parse::<PointRef>().is_err());
        assert!("x_2".parse::<PointRef>().is_err());
        assert!("3_y".parse::<PointRef>().is_err());
    }

    #[test]
    fn kind_inference() {
        assert_eq!(
            PointKind::for_object_type(ObjectType::BinaryOutput),
            PointKind::Boolean
        );
        assert_eq!(
            PointKind::for_object_type(ObjectType::Command),
            PointKind::Unsigned
        );
        assert_eq!(
            PointKind::for_value(&TaggedValue::Real(1.0)),
            PointKind::Real
        );
    }
}
