use crate::types::{ObjectId, PropertyId, TaggedValue};

/// Array index meaning "the whole property".
pub const ARRAY_INDEX_ALL: u32 = 0xFFFF_FFFF;

/// A property reference: which property, and which element of it.
///
/// `array_index` of [`ARRAY_INDEX_ALL`] selects the whole property, `0`
/// selects the element count, anything else the 1-based element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub property_id: PropertyId,
    pub array_index: u32,
}

impl PropertyRef {
    pub const fn whole(property_id: PropertyId) -> Self {
        Self {
            property_id,
            array_index: ARRAY_INDEX_ALL,
        }
    }

    pub const fn element(property_id: PropertyId, index: u32) -> Self {
        Self {
            property_id,
            array_index: index,
        }
    }

    pub const fn is_whole(self) -> bool {
        self.array_index == ARRAY_INDEX_ALL
    }

    /// The optional wire form: `None` when the whole property is meant.
    pub const fn wire_index(self) -> Option<u32> {
        if self.is_whole() {
            None
        } else {
            Some(self.array_index)
        }
    }

    pub const fn from_wire_index(property_id: PropertyId, index: Option<u32>) -> Self {
        match index {
            Some(i) => Self::element(property_id, i),
            None => Self::whole(property_id),
        }
    }
}

/// A referenced property together with its values and an optional write
/// priority (1..=16).
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub reference: PropertyRef,
    pub values: Vec<TaggedValue>,
    pub priority: Option<u8>,
}

impl PropertyValue {
    pub fn new(reference: PropertyRef, values: Vec<TaggedValue>) -> Self {
        Self {
            reference,
            values,
            priority: None,
        }
    }
}

/// One object's worth of results in a ReadPropertyMultiple answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadAccessResult {
    pub object_id: ObjectId,
    pub properties: Vec<PropertyValue>,
}
