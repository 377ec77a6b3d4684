//! Discovery bookkeeping: one [`BacNode`] per discovered device.

use crate::point::{PointKind, PointRef};
use bacstack_core::types::{ObjectId, Segmentation, TaggedValue};
use bacstack_datalink::Address;
use serde::{Deserialize, Serialize};

/// One object on a discovered device, with the lazily-populated name,
/// description, and cached value from enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacPoint {
    pub object_id: ObjectId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub value: Option<TaggedValue>,
    pub kind: PointKind,
}

impl BacPoint {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            name: None,
            description: None,
            value: None,
            kind: PointKind::for_object_type(object_id.object_type()),
        }
    }

    /// The addressable name of this point.
    pub fn point_ref(&self) -> PointRef {
        PointRef::from_object_id(self.object_id)
    }
}

/// A device seen in an I-Am: its address, identity, capabilities, and the
/// points found by enumeration. One entry per device id, kept from the
/// first I-Am until the client shuts down.
#[derive(Debug, Clone)]
pub struct BacNode {
    pub address: Address,
    pub device_id: u32,
    pub max_apdu: u32,
    pub segmentation: Segmentation,
    pub vendor_id: u32,
    pub points: Vec<BacPoint>,
}

impl BacNode {
    pub fn new(address: Address, device_id: u32) -> Self {
        Self {
            address,
            device_id,
            max_apdu: 0,
            segmentation: Segmentation::None,
            vendor_id: 0,
            points: Vec::new(),
        }
    }

    pub fn point(&self, object_id: ObjectId) -> Option<&BacPoint> {
        self.points.iter().find(|p| p.object_id == object_id)
    }

    pub fn point_mut(&mut self, object_id: ObjectId) -> Option<&mut BacPoint> {
        self.points.iter_mut().find(|p| p.object_id == object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{BacNode, BacPoint};
    use crate::point::PointKind;
    use bacstack_core::types::{ObjectId, ObjectType};
    use bacstack_datalink::Address;

    #[test]
    fn new_point_infers_kind_from_type() {
        let point = BacPoint::new(ObjectId::new(ObjectType::BinaryValue, 4));
        assert_eq!(point.kind, PointKind::Boolean);
        assert_eq!(point.point_ref().to_string(), "4_5");
    }

    #[test]
    fn node_point_lookup() {
        let mut node = BacNode::new(Address::new("10.0.0.5:47808".parse().unwrap()), 9);
        node.points
            .push(BacPoint::new(ObjectId::new(ObjectType::AnalogValue, 0)));
        assert!(node.point(ObjectId::new(ObjectType::AnalogValue, 0)).is_some());
        assert!(node.point(ObjectId::new(ObjectType::AnalogValue, 1)).is_none());
    }
}
