//! The in-memory object/property database behind a device.
//!
//! All access is serialised by the mutex the server wraps around the
//! storage; the storage itself is plain single-threaded state.

use bacstack_core::encoding::tag::ApplicationTag;
use bacstack_core::types::{
    ObjectId, ObjectType, PropertyId, PropertyRef, PropertyValue, TaggedValue,
    WILDCARD_DEVICE_INSTANCE,
};
use thiserror::Error;

/// Slots in a commandable object's priority array.
pub const PRIORITY_LEVELS: usize = 16;

/// The priority level reserved for minimum-on/off timing; writes at this
/// level are refused.
const RESERVED_PRIORITY: u8 = 6;

/// Priority used when a commandable write carries none.
const DEFAULT_PRIORITY: u8 = 16;

/// Failures of a storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("unknown object")]
    UnknownObject,
    #[error("no such property or element")]
    NotExist,
    #[error("write access denied")]
    WriteAccessDenied,
    /// The object is not commandable; the caller should fall back to a
    /// plain write.
    #[error("not a commandable property")]
    NotForMe,
    #[error("storage error")]
    Generic,
}

/// One property of a stored object. When `tag` is set, every non-null
/// element of `values` carries that application tag.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageProperty {
    pub property_id: PropertyId,
    pub tag: Option<ApplicationTag>,
    pub values: Vec<TaggedValue>,
}

impl StorageProperty {
    pub fn new(property_id: PropertyId, values: Vec<TaggedValue>) -> Self {
        let tag = values
            .iter()
            .filter_map(TaggedValue::app_tag)
            .find(|tag| *tag != ApplicationTag::Null);
        Self {
            property_id,
            tag,
            values,
        }
    }
}

/// One object: identity is (type, instance).
#[derive(Debug, Clone, PartialEq)]
pub struct StorageObject {
    pub object_type: ObjectType,
    pub instance: u32,
    pub properties: Vec<StorageProperty>,
}

impl StorageObject {
    pub fn new(object_type: ObjectType, instance: u32) -> Self {
        Self {
            object_type,
            instance,
            properties: Vec::new(),
        }
    }

    pub fn object_id(&self) -> ObjectId {
        ObjectId::new(self.object_type, self.instance)
    }

    pub fn property(&self, property_id: PropertyId) -> Option<&StorageProperty> {
        self.properties.iter().find(|p| p.property_id == property_id)
    }

    pub fn property_mut(&mut self, property_id: PropertyId) -> Option<&mut StorageProperty> {
        self.properties
            .iter_mut()
            .find(|p| p.property_id == property_id)
    }

    /// Builder-style property insert, replacing any previous value.
    pub fn with_property(mut self, property_id: PropertyId, values: Vec<TaggedValue>) -> Self {
        self.properties.retain(|p| p.property_id != property_id);
        self.properties.push(StorageProperty::new(property_id, values));
        self
    }

    /// A commandable object carries the full present-value/relinquish/
    /// out-of-service/priority-array quartet.
    pub fn commandable(object_type: ObjectType, instance: u32, relinquish_default: TaggedValue) -> Self {
        Self::new(object_type, instance)
            .with_property(PropertyId::PresentValue, vec![relinquish_default.clone()])
            .with_property(PropertyId::RelinquishDefault, vec![relinquish_default])
            .with_property(PropertyId::OutOfService, vec![TaggedValue::Boolean(false)])
            .with_property(
                PropertyId::PriorityArray,
                vec![TaggedValue::Null; PRIORITY_LEVELS],
            )
    }
}

/// Change-of-value observer, fired synchronously from inside the storage
/// operation; observers must not re-enter the storage.
pub type CovObserver = Box<dyn FnMut(ObjectId, PropertyId, u32, &[TaggedValue]) + Send>;

/// Read override: return values to short-circuit the stored ones.
pub type ReadOverride =
    Box<dyn Fn(ObjectId, PropertyId, u32) -> Option<Vec<TaggedValue>> + Send>;

/// Write override: return `true` to claim the write.
pub type WriteOverride =
    Box<dyn FnMut(ObjectId, PropertyId, u32, &[TaggedValue]) -> bool + Send>;

/// The object database of one device. Holds exactly one device object
/// whose instance is the device id.
pub struct DeviceStorage {
    device_id: u32,
    objects: Vec<StorageObject>,
    read_override: Option<ReadOverride>,
    write_override: Option<WriteOverride>,
    cov_observer: Option<CovObserver>,
}

impl std::fmt::Debug for DeviceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStorage")
            .field("device_id", &self.device_id)
            .field("objects", &self.objects.len())
            .finish()
    }
}

impl DeviceStorage {
    pub fn new(device_id: u32) -> Self {
        let device = StorageObject::new(ObjectType::Device, device_id)
            .with_property(
                PropertyId::ObjectIdentifier,
                vec![TaggedValue::ObjectId(ObjectId::new(
                    ObjectType::Device,
                    device_id,
                ))],
            )
            .with_property(
                PropertyId::ObjectName,
                vec![TaggedValue::CharacterString(format!("Device-{device_id}"))],
            );
        Self {
            device_id,
            objects: vec![device],
            read_override: None,
            write_override: None,
            cov_observer: None,
        }
    }

    pub fn from_objects(device_id: u32, objects: Vec<StorageObject>) -> Self {
        let mut storage = Self {
            device_id,
            objects,
            read_override: None,
            write_override: None,
            cov_observer: None,
        };
        if !storage
            .objects
            .iter()
            .any(|o| o.object_type == ObjectType::Device)
        {
            storage
                .objects
                .insert(0, StorageObject::new(ObjectType::Device, device_id));
        }
        storage.set_device_id(device_id);
        storage
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// Rewrites every device object's instance; persisted files carry the
    /// id they were saved with, the runtime id wins.
    pub fn set_device_id(&mut self, device_id: u32) {
        self.device_id = device_id;
        for object in &mut self.objects {
            if object.object_type == ObjectType::Device {
                object.instance = device_id;
                if let Some(identifier) = object.property_mut(PropertyId::ObjectIdentifier) {
                    identifier.values = vec![TaggedValue::ObjectId(ObjectId::new(
                        ObjectType::Device,
                        device_id,
                    ))];
                }
            }
        }
    }

    pub fn objects(&self) -> &[StorageObject] {
        &self.objects
    }

    pub fn add_object(&mut self, object: StorageObject) {
        self.objects
            .retain(|o| !(o.object_type == object.object_type && o.instance == object.instance));
        self.objects.push(object);
    }

    pub fn remove_object(&mut self, object_id: ObjectId) -> bool {
        let before = self.objects.len();
        let object_id = self.normalize(object_id);
        self.objects.retain(|o| o.object_id() != object_id);
        self.objects.len() != before
    }

    /// Rebuilds the device object's object-list property from the
    /// current object set.
    pub fn refresh_object_list(&mut self) {
        let list: Vec<TaggedValue> = self
            .objects
            .iter()
            .map(|o| TaggedValue::ObjectId(o.object_id()))
            .collect();
        let device_id = ObjectId::new(ObjectType::Device, self.device_id);
        if let Some(device) = self.find_object_mut(device_id) {
            device
                .properties
                .retain(|p| p.property_id != PropertyId::ObjectList);
            device
                .properties
                .push(StorageProperty::new(PropertyId::ObjectList, list));
        }
    }

    pub fn on_change(&mut self, observer: CovObserver) {
        self.cov_observer = Some(observer);
    }

    pub fn set_read_override(&mut self, hook: ReadOverride) {
        self.read_override = Some(hook);
    }

    pub fn set_write_override(&mut self, hook: WriteOverride) {
        self.write_override = Some(hook);
    }

    /// The wildcard device instance resolves to this device before any
    /// lookup.
    fn normalize(&self, object_id: ObjectId) -> ObjectId {
        if object_id.object_type() == ObjectType::Device
            && object_id.instance() == WILDCARD_DEVICE_INSTANCE
        {
            ObjectId::new(ObjectType::Device, self.device_id)
        } else {
            object_id
        }
    }

    pub fn find_object(&self, object_id: ObjectId) -> Option<&StorageObject> {
        let object_id = self.normalize(object_id);
        self.objects.iter().find(|o| o.object_id() == object_id)
    }

    fn find_object_mut(&mut self, object_id: ObjectId) -> Option<&mut StorageObject> {
        let object_id = self.normalize(object_id);
        self.objects.iter_mut().find(|o| o.object_id() == object_id)
    }

    pub fn contains_object(&self, object_id: ObjectId) -> bool {
        self.find_object(object_id).is_some()
    }

    /// Reads a property, honoring the array-index convention: index 0 is
    /// the element count, the whole-property sentinel returns every
    /// value, anything else the 1-based element.
    pub fn read_property(
        &self,
        object_id: ObjectId,
        reference: PropertyRef,
    ) -> Result<Vec<TaggedValue>, StorageError> {
        let object_id = self.normalize(object_id);
        if let Some(hook) = &self.read_override {
            if let Some(values) =
                hook(object_id, reference.property_id, reference.array_index)
            {
                return Ok(values);
            }
        }
        let object = self.find_object(object_id).ok_or(StorageError::UnknownObject)?;
        let property = object
            .property(reference.property_id)
            .ok_or(StorageError::NotExist)?;

        if reference.is_whole() {
            return Ok(property.values.clone());
        }
        match reference.array_index {
            0 => Ok(vec![TaggedValue::Unsigned(property.values.len() as u32)]),
            index => property
                .values
                .get(index as usize - 1)
                .cloned()
                .map(|v| vec![v])
                .ok_or(StorageError::NotExist),
        }
    }

    /// Writes a property, creating the object and property when
    /// `add_if_missing` allows it. A property whose recorded tag is still
    /// null adopts the tag of the first typed value written.
    pub fn write_property(
        &mut self,
        object_id: ObjectId,
        reference: PropertyRef,
        values: Vec<TaggedValue>,
        add_if_missing: bool,
    ) -> Result<(), StorageError> {
        let object_id = self.normalize(object_id);
        if let Some(hook) = &mut self.write_override {
            if hook(object_id, reference.property_id, reference.array_index, &values) {
                return Ok(());
            }
        }

        if self.find_object(object_id).is_none() {
            if !add_if_missing {
                return Err(StorageError::NotExist);
            }
            self.add_object(StorageObject::new(
                object_id.object_type(),
                object_id.instance(),
            ));
        }
        let object = self
            .find_object_mut(object_id)
            .ok_or(StorageError::UnknownObject)?;

        if object.property(reference.property_id).is_none() {
            if !add_if_missing {
                return Err(StorageError::NotExist);
            }
            object.properties.push(StorageProperty {
                property_id: reference.property_id,
                tag: None,
                values: Vec::new(),
            });
        }
        let property = object
            .property_mut(reference.property_id)
            .ok_or(StorageError::NotExist)?;

        if property.tag.is_none() {
            property.tag = values
                .iter()
                .filter_map(TaggedValue::app_tag)
                .find(|tag| *tag != ApplicationTag::Null);
        }

        if reference.is_whole() {
            property.values = values.clone();
        } else {
            match reference.array_index {
                0 => return Err(StorageError::NotExist),
                index => {
                    let slot = index as usize - 1;
                    if slot >= property.values.len() {
                        return Err(StorageError::NotExist);
                    }
                    let Some(value) = values.first() else {
                        return Err(StorageError::Generic);
                    };
                    property.values[slot] = value.clone();
                }
            }
        }

        self.fire_change(object_id, reference, &values);
        Ok(())
    }

    /// Writes through the 16-slot priority array of a commandable object.
    ///
    /// A null value relinquishes the slot; the lowest-numbered occupied
    /// slot becomes the present value, or the relinquish default when all
    /// slots are empty. With OUT_OF_SERVICE set, present-value writes
    /// bypass the array entirely.
    pub fn write_commandable_property(
        &mut self,
        object_id: ObjectId,
        property_id: PropertyId,
        value: TaggedValue,
        priority: Option<u8>,
    ) -> Result<(), StorageError> {
        let object_id = self.normalize(object_id);
        {
            let object = self.find_object(object_id).ok_or(StorageError::UnknownObject)?;
            let commandable = [
                PropertyId::PresentValue,
                PropertyId::RelinquishDefault,
                PropertyId::OutOfService,
                PropertyId::PriorityArray,
            ]
            .iter()
            .all(|p| object.property(*p).is_some());
            if !commandable {
                return Err(StorageError::NotForMe);
            }
        }

        match property_id {
            PropertyId::PresentValue => {
                let out_of_service = {
                    let object = self.find_object(object_id).expect("checked above");
                    matches!(
                        object
                            .property(PropertyId::OutOfService)
                            .and_then(|p| p.values.first()),
                        Some(TaggedValue::Boolean(true))
                    )
                };
                if out_of_service {
                    return self.write_property(
                        object_id,
                        PropertyRef::whole(PropertyId::PresentValue),
                        vec![value],
                        false,
                    );
                }

                let priority = priority.unwrap_or(DEFAULT_PRIORITY);
                if priority == RESERVED_PRIORITY {
                    return Err(StorageError::WriteAccessDenied);
                }
                if !(1..=PRIORITY_LEVELS as u8).contains(&priority) {
                    return Err(StorageError::Generic);
                }

                let object = self.find_object_mut(object_id).expect("checked above");
                let array = object
                    .property_mut(PropertyId::PriorityArray)
                    .expect("checked above");
                if array.values.len() < PRIORITY_LEVELS {
                    array.values.resize(PRIORITY_LEVELS, TaggedValue::Null);
                }
                array.values[priority as usize - 1] = value;

                let winner = array
                    .values
                    .iter()
                    .find(|v| !matches!(v, TaggedValue::Null))
                    .cloned();
                let present = match winner {
                    Some(value) => value,
                    None => object
                        .property(PropertyId::RelinquishDefault)
                        .and_then(|p| p.values.first().cloned())
                        .unwrap_or(TaggedValue::Null),
                };
                self.write_property(
                    object_id,
                    PropertyRef::whole(PropertyId::PresentValue),
                    vec![present],
                    false,
                )
            }
            // Relinquish-default writes land directly; the array is left
            // alone and the present value recomputed from it.
            PropertyId::RelinquishDefault => {
                self.write_property(
                    object_id,
                    PropertyRef::whole(PropertyId::RelinquishDefault),
                    vec![value],
                    false,
                )?;
                let object = self.find_object(object_id).expect("checked above");
                let occupied = object
                    .property(PropertyId::PriorityArray)
                    .map(|p| p.values.iter().any(|v| !matches!(v, TaggedValue::Null)))
                    .unwrap_or(false);
                if !occupied {
                    let fallback = object
                        .property(PropertyId::RelinquishDefault)
                        .and_then(|p| p.values.first().cloned())
                        .unwrap_or(TaggedValue::Null);
                    self.write_property(
                        object_id,
                        PropertyRef::whole(PropertyId::PresentValue),
                        vec![fallback],
                        false,
                    )?;
                }
                Ok(())
            }
            _ => Err(StorageError::NotForMe),
        }
    }

    /// Per-reference reads for a ReadPropertyMultiple answer; failures
    /// become inline error values.
    pub fn read_property_multiple(
        &self,
        object_id: ObjectId,
        references: &[PropertyRef],
    ) -> Vec<PropertyValue> {
        references
            .iter()
            .map(|&reference| match self.read_property(object_id, reference) {
                Ok(values) => PropertyValue::new(reference, values),
                Err(err) => PropertyValue::new(reference, vec![err.into_value()]),
            })
            .collect()
    }

    /// Expansion of the `all` pseudo-property: every property the object
    /// holds.
    pub fn read_property_all(&self, object_id: ObjectId) -> Result<Vec<PropertyValue>, StorageError> {
        let object = self.find_object(object_id).ok_or(StorageError::UnknownObject)?;
        Ok(object
            .properties
            .iter()
            .map(|property| {
                PropertyValue::new(
                    PropertyRef::whole(property.property_id),
                    property.values.clone(),
                )
            })
            .collect())
    }

    fn fire_change(&mut self, object_id: ObjectId, reference: PropertyRef, values: &[TaggedValue]) {
        if let Some(observer) = &mut self.cov_observer {
            observer(object_id, reference.property_id, reference.array_index, values);
        }
    }
}

impl StorageError {
    /// The inline error value a ReadPropertyMultiple answer carries for
    /// this failure.
    pub fn into_value(self) -> TaggedValue {
        use bacstack_core::types::{ErrorClass, ErrorCode};
        let (class, code) = match self {
            Self::UnknownObject => (ErrorClass::Object, ErrorCode::UnknownObject),
            Self::NotExist => (ErrorClass::Property, ErrorCode::UnknownProperty),
            Self::WriteAccessDenied => (ErrorClass::Device, ErrorCode::WriteAccessDenied),
            Self::NotForMe | Self::Generic => (ErrorClass::Device, ErrorCode::Other),
        };
        TaggedValue::Error { class, code }
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceStorage, StorageError, StorageObject, PRIORITY_LEVELS};
    use bacstack_core::types::{
        ObjectId, ObjectType, PropertyId, PropertyRef, TaggedValue, WILDCARD_DEVICE_INSTANCE,
    };

    fn analog_value(storage: &mut DeviceStorage, instance: u32, value: f32) {
        storage.add_object(StorageObject::commandable(
            ObjectType::AnalogValue,
            instance,
            TaggedValue::Real(value),
        ));
    }

    fn present_value(storage: &DeviceStorage, instance: u32) -> Vec<TaggedValue> {
        storage
            .read_property(
                ObjectId::new(ObjectType::AnalogValue, instance),
                PropertyRef::whole(PropertyId::PresentValue),
            )
            .unwrap()
    }

    #[test]
    fn read_missing_object_and_property() {
        let storage = DeviceStorage::new(1);
        let err = storage
            .read_property(
                ObjectId::new(ObjectType::AnalogValue, 9),
                PropertyRef::whole(PropertyId::PresentValue),
            )
            .unwrap_err();
        assert_eq!(err, StorageError::UnknownObject);

        let err = storage
            .read_property(
                ObjectId::new(ObjectType::Device, 1),
                PropertyRef::whole(PropertyId::PresentValue),
            )
            .unwrap_err();
        assert_eq!(err, StorageError::NotExist);
    }

    #[test]
    fn array_index_semantics() {
        let mut storage = DeviceStorage::new(1);
        analog_value(&mut storage, 0, 0.0);
        let id = ObjectId::new(ObjectType::AnalogValue, 0);

        let count = storage
            .read_property(id, PropertyRef::element(PropertyId::PriorityArray, 0))
            .unwrap();
        assert_eq!(count, vec![TaggedValue::Unsigned(PRIORITY_LEVELS as u32)]);

        let first = storage
            .read_property(id, PropertyRef::element(PropertyId::PriorityArray, 1))
            .unwrap();
        assert_eq!(first, vec![TaggedValue::Null]);

        let err = storage
            .read_property(id, PropertyRef::element(PropertyId::PriorityArray, 17))
            .unwrap_err();
        assert_eq!(err, StorageError::NotExist);
    }

    #[test]
    fn wildcard_device_instance_resolves() {
        let storage = DeviceStorage::new(666);
        let values = storage
            .read_property(
                ObjectId::new(ObjectType::Device, WILDCARD_DEVICE_INSTANCE),
                PropertyRef::whole(PropertyId::ObjectIdentifier),
            )
            .unwrap();
        assert_eq!(
            values,
            vec![TaggedValue::ObjectId(ObjectId::new(ObjectType::Device, 666))]
        );
    }

    #[test]
    fn write_read_roundtrip_and_tag_adoption() {
        let mut storage = DeviceStorage::new(1);
        let id = ObjectId::new(ObjectType::AnalogValue, 3);
        let reference = PropertyRef::whole(PropertyId::PresentValue);

        assert_eq!(
            storage.write_property(id, reference, vec![TaggedValue::Real(1.5)], false),
            Err(StorageError::NotExist)
        );
        storage
            .write_property(id, reference, vec![TaggedValue::Real(1.5)], true)
            .unwrap();
        assert_eq!(
            storage.read_property(id, reference).unwrap(),
            vec![TaggedValue::Real(1.5)]
        );
        let tag = storage
            .find_object(id)
            .unwrap()
            .property(PropertyId::PresentValue)
            .unwrap()
            .tag;
        assert_eq!(tag, Some(bacstack_core::encoding::tag::ApplicationTag::Real));
    }

    #[test]
    fn last_write_wins() {
        let mut storage = DeviceStorage::new(1);
        let id = ObjectId::new(ObjectType::AnalogValue, 0);
        let reference = PropertyRef::whole(PropertyId::PresentValue);
        for value in [1.0f32, 2.0, 3.0] {
            storage
                .write_property(id, reference, vec![TaggedValue::Real(value)], true)
                .unwrap();
        }
        assert_eq!(
            storage.read_property(id, reference).unwrap(),
            vec![TaggedValue::Real(3.0)]
        );
    }

    #[test]
    fn priority_array_sequence() {
        let mut storage = DeviceStorage::new(1);
        analog_value(&mut storage, 0, 0.0);
        let id = ObjectId::new(ObjectType::AnalogValue, 0);

        storage
            .write_commandable_property(id, PropertyId::PresentValue, TaggedValue::Real(1.0), Some(8))
            .unwrap();
        assert_eq!(present_value(&storage, 0), vec![TaggedValue::Real(1.0)]);

        storage
            .write_commandable_property(id, PropertyId::PresentValue, TaggedValue::Real(2.0), Some(4))
            .unwrap();
        assert_eq!(present_value(&storage, 0), vec![TaggedValue::Real(2.0)]);

        storage
            .write_commandable_property(id, PropertyId::PresentValue, TaggedValue::Null, Some(4))
            .unwrap();
        assert_eq!(present_value(&storage, 0), vec![TaggedValue::Real(1.0)]);

        storage
            .write_commandable_property(id, PropertyId::PresentValue, TaggedValue::Null, Some(8))
            .unwrap();
        assert_eq!(present_value(&storage, 0), vec![TaggedValue::Real(0.0)]);
    }

    #[test]
    fn priority_six_is_refused() {
        let mut storage = DeviceStorage::new(1);
        analog_value(&mut storage, 0, 0.0);
        let id = ObjectId::new(ObjectType::AnalogValue, 0);
        assert_eq!(
            storage.write_commandable_property(
                id,
                PropertyId::PresentValue,
                TaggedValue::Real(9.0),
                Some(6)
            ),
            Err(StorageError::WriteAccessDenied)
        );
        // The refusal must leave the array untouched.
        assert_eq!(present_value(&storage, 0), vec![TaggedValue::Real(0.0)]);
    }

    #[test]
    fn out_of_service_bypasses_the_array() {
        let mut storage = DeviceStorage::new(1);
        analog_value(&mut storage, 0, 0.0);
        let id = ObjectId::new(ObjectType::AnalogValue, 0);
        storage
            .write_property(
                id,
                PropertyRef::whole(PropertyId::OutOfService),
                vec![TaggedValue::Boolean(true)],
                false,
            )
            .unwrap();
        storage
            .write_commandable_property(id, PropertyId::PresentValue, TaggedValue::Real(5.0), Some(6))
            .unwrap();
        assert_eq!(present_value(&storage, 0), vec![TaggedValue::Real(5.0)]);
    }

    #[test]
    fn relinquish_default_write_updates_fallback_only() {
        let mut storage = DeviceStorage::new(1);
        analog_value(&mut storage, 0, 0.0);
        let id = ObjectId::new(ObjectType::AnalogValue, 0);

        // With an empty array the new default becomes the present value.
        storage
            .write_commandable_property(
                id,
                PropertyId::RelinquishDefault,
                TaggedValue::Real(7.0),
                None,
            )
            .unwrap();
        assert_eq!(present_value(&storage, 0), vec![TaggedValue::Real(7.0)]);

        // An occupied slot keeps winning.
        storage
            .write_commandable_property(id, PropertyId::PresentValue, TaggedValue::Real(2.0), Some(4))
            .unwrap();
        storage
            .write_commandable_property(
                id,
                PropertyId::RelinquishDefault,
                TaggedValue::Real(9.0),
                None,
            )
            .unwrap();
        assert_eq!(present_value(&storage, 0), vec![TaggedValue::Real(2.0)]);
    }

    #[test]
    fn non_commandable_object_is_not_for_me() {
        let mut storage = DeviceStorage::new(1);
        storage.add_object(
            StorageObject::new(ObjectType::AnalogValue, 1)
                .with_property(PropertyId::PresentValue, vec![TaggedValue::Real(0.0)]),
        );
        let err = storage
            .write_commandable_property(
                ObjectId::new(ObjectType::AnalogValue, 1),
                PropertyId::PresentValue,
                TaggedValue::Real(1.0),
                None,
            )
            .unwrap_err();
        assert_eq!(err, StorageError::NotForMe);
    }

    #[test]
    fn change_callback_fires_inside_writes() {
        let mut storage = DeviceStorage::new(1);
        analog_value(&mut storage, 0, 0.0);
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        storage.on_change(Box::new(move |object_id, property_id, _index, values| {
            sink.lock()
                .unwrap()
                .push((object_id, property_id, values.to_vec()));
        }));
        storage
            .write_property(
                ObjectId::new(ObjectType::AnalogValue, 0),
                PropertyRef::whole(PropertyId::PresentValue),
                vec![TaggedValue::Real(3.5)],
                false,
            )
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, PropertyId::PresentValue);
    }

    #[test]
    fn read_override_short_circuits() {
        let mut storage = DeviceStorage::new(1);
        storage.set_read_override(Box::new(|_, property_id, _| {
            (property_id == PropertyId::Proprietary(999))
                .then(|| vec![TaggedValue::Unsigned(42)])
        }));
        let values = storage
            .read_property(
                ObjectId::new(ObjectType::AnalogValue, 5),
                PropertyRef::whole(PropertyId::Proprietary(999)),
            )
            .unwrap();
        assert_eq!(values, vec![TaggedValue::Unsigned(42)]);
    }

    #[test]
    fn read_property_multiple_carries_inline_errors() {
        let mut storage = DeviceStorage::new(1);
        analog_value(&mut storage, 0, 10.0);
        let results = storage.read_property_multiple(
            ObjectId::new(ObjectType::AnalogValue, 0),
            &[
                PropertyRef::whole(PropertyId::PresentValue),
                PropertyRef::whole(PropertyId::Description),
            ],
        );
        assert_eq!(results[0].values, vec![TaggedValue::Real(10.0)]);
        assert!(matches!(results[1].values[0], TaggedValue::Error { .. }));
    }
}
