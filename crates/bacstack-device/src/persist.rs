//! XML persistence for [`DeviceStorage`].
//!
//! The on-disk shape mirrors the storage model: a `Device` root with the
//! id, `Object` elements keyed by type and instance, and per-property
//! `Tag` plus `Value` children in text form. A reload yields a storage
//! whose every readable property reads back identically.

use crate::storage::{DeviceStorage, StorageObject, StorageProperty};
use bacstack_core::encoding::tag::ApplicationTag;
use bacstack_core::types::{BitString, Date, ObjectId, ObjectType, PropertyId, TaggedValue, Time};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed storage file: {0}")]
    Malformed(String),
    #[error("value {0:?} cannot be persisted")]
    Unsupported(String),
    #[error("storage file {0:?} not found")]
    NotFound(String),
}

/// Named storage documents compiled into the binary; searched when a
/// storage path does not resolve to a file.
#[derive(Debug, Default, Clone)]
pub struct EmbeddedResources {
    entries: HashMap<String, &'static str>,
}

impl EmbeddedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: &str, content: &'static str) -> Self {
        self.entries.insert(name.to_owned(), content);
        self
    }

    fn lookup(&self, path: &Path) -> Option<&'static str> {
        let name = path.file_name()?.to_str()?;
        self.entries
            .get(name)
            .or_else(|| self.entries.get(&path.display().to_string()))
            .copied()
    }
}

impl DeviceStorage {
    /// Serialises the storage to the XML document form.
    pub fn to_xml(&self) -> Result<String, PersistError> {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        let _ = writeln!(out, "<Device DeviceId=\"{}\">", self.device_id());
        out.push_str("  <Objects>\n");
        for object in self.objects() {
            let _ = writeln!(
                out,
                "    <Object Type=\"{}\" Instance=\"{}\">",
                type_name(object.object_type),
                object.instance
            );
            out.push_str("      <Properties>\n");
            for property in &object.properties {
                let _ = writeln!(
                    out,
                    "        <Property Id=\"{}\">",
                    property_name(property.property_id)
                );
                let tag = property
                    .tag
                    .map(ApplicationTag::name)
                    .unwrap_or("Null");
                let _ = writeln!(out, "          <Tag>{tag}</Tag>");
                for value in &property.values {
                    let _ = writeln!(
                        out,
                        "          <Value>{}</Value>",
                        escape_xml(&value_text(value)?)
                    );
                }
                out.push_str("        </Property>\n");
            }
            out.push_str("      </Properties>\n");
            out.push_str("    </Object>\n");
        }
        out.push_str("  </Objects>\n");
        out.push_str("</Device>\n");
        Ok(out)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        std::fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    /// Parses a storage document.
    pub fn from_xml(text: &str) -> Result<Self, PersistError> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| PersistError::Malformed(e.to_string()))?;
        let root = doc.root_element();
        if root.tag_name().name() != "Device" {
            return Err(PersistError::Malformed("missing Device root".into()));
        }
        let device_id: u32 = root
            .attribute("DeviceId")
            .ok_or_else(|| PersistError::Malformed("missing DeviceId".into()))?
            .parse()
            .map_err(|_| PersistError::Malformed("bad DeviceId".into()))?;

        let mut objects = Vec::new();
        for object_node in root
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "Object")
        {
            let type_text = object_node
                .attribute("Type")
                .ok_or_else(|| PersistError::Malformed("Object without Type".into()))?;
            let object_type = ObjectType::from_name(type_text)
                .ok_or_else(|| PersistError::Malformed(format!("unknown type {type_text}")))?;
            let instance: u32 = object_node
                .attribute("Instance")
                .ok_or_else(|| PersistError::Malformed("Object without Instance".into()))?
                .parse()
                .map_err(|_| PersistError::Malformed("bad Instance".into()))?;

            let mut object = StorageObject::new(object_type, instance);
            for property_node in object_node
                .descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == "Property")
            {
                let id_text = property_node
                    .attribute("Id")
                    .ok_or_else(|| PersistError::Malformed("Property without Id".into()))?;
                let property_id = PropertyId::from_name(id_text)
                    .ok_or_else(|| PersistError::Malformed(format!("unknown property {id_text}")))?;

                let tag_text = property_node
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "Tag")
                    .and_then(|n| n.text())
                    .unwrap_or("Null");
                let tag = ApplicationTag::from_name(tag_text.trim())
                    .ok_or_else(|| PersistError::Malformed(format!("unknown tag {tag_text}")))?;

                let mut values = Vec::new();
                for value_node in property_node
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "Value")
                {
                    let text = value_node.text().unwrap_or("");
                    values.push(value_from_text(tag, text)?);
                }
                object.properties.push(StorageProperty {
                    property_id,
                    tag: (tag != ApplicationTag::Null).then_some(tag),
                    values,
                });
            }
            objects.push(object);
        }

        Ok(DeviceStorage::from_objects(device_id, objects))
    }

    /// Loads a storage document from the filesystem, falling back to the
    /// embedded resource set when the path does not resolve to a file.
    pub fn load(
        path: impl AsRef<Path>,
        embedded: &EmbeddedResources,
    ) -> Result<Self, PersistError> {
        let path = path.as_ref();
        if path.is_file() {
            let text = std::fs::read_to_string(path)?;
            return Self::from_xml(&text);
        }
        if let Some(content) = embedded.lookup(path) {
            return Self::from_xml(content);
        }
        Err(PersistError::NotFound(path.display().to_string()))
    }
}

fn type_name(object_type: ObjectType) -> String {
    match object_type {
        ObjectType::Proprietary(v) => v.to_string(),
        other => other.name().to_owned(),
    }
}

fn property_name(property_id: PropertyId) -> String {
    match property_id {
        PropertyId::Proprietary(v) => v.to_string(),
        other => other.name().to_owned(),
    }
}

/// The text form of a persisted value: decimal for numerics, raw text for
/// strings, hex for byte data.
fn value_text(value: &TaggedValue) -> Result<String, PersistError> {
    Ok(match value {
        TaggedValue::Null => String::new(),
        TaggedValue::Boolean(v) => u8::from(*v).to_string(),
        TaggedValue::Unsigned(v) | TaggedValue::Enumerated(v) => v.to_string(),
        TaggedValue::Signed(v) => v.to_string(),
        TaggedValue::Real(v) => v.to_string(),
        TaggedValue::Double(v) => v.to_string(),
        TaggedValue::CharacterString(v) => v.clone(),
        TaggedValue::OctetString(v) => hex_encode(v),
        TaggedValue::BitString(bits) => {
            format!("{};{}", bits.unused_bits, hex_encode(&bits.data))
        }
        TaggedValue::Date(d) => format!(
            "{}-{}-{}-{}",
            d.year_since_1900, d.month, d.day, d.weekday
        ),
        TaggedValue::Time(t) => format!("{}:{}:{}.{}", t.hour, t.minute, t.second, t.hundredths),
        TaggedValue::ObjectId(id) => {
            format!("{}:{}", type_name(id.object_type()), id.instance())
        }
        TaggedValue::Constructed { .. } | TaggedValue::Error { .. } => {
            return Err(PersistError::Unsupported(format!("{value:?}")))
        }
    })
}

fn value_from_text(tag: ApplicationTag, text: &str) -> Result<TaggedValue, PersistError> {
    let bad = |what: &str| PersistError::Malformed(format!("bad {what} value {text:?}"));
    // An empty element under any tag is a persisted null.
    if text.is_empty() && tag != ApplicationTag::CharacterString {
        return Ok(TaggedValue::Null);
    }
    Ok(match tag {
        ApplicationTag::Null => TaggedValue::Null,
        ApplicationTag::Boolean => TaggedValue::Boolean(text.trim() != "0"),
        ApplicationTag::UnsignedInt => {
            TaggedValue::Unsigned(text.trim().parse().map_err(|_| bad("unsigned"))?)
        }
        ApplicationTag::Enumerated => {
            TaggedValue::Enumerated(text.trim().parse().map_err(|_| bad("enumerated"))?)
        }
        ApplicationTag::SignedInt => {
            TaggedValue::Signed(text.trim().parse().map_err(|_| bad("signed"))?)
        }
        ApplicationTag::Real => TaggedValue::Real(text.trim().parse().map_err(|_| bad("real"))?),
        ApplicationTag::Double => {
            TaggedValue::Double(text.trim().parse().map_err(|_| bad("double"))?)
        }
        ApplicationTag::CharacterString => TaggedValue::CharacterString(text.to_owned()),
        ApplicationTag::OctetString => {
            TaggedValue::OctetString(hex_decode(text.trim()).ok_or_else(|| bad("octet string"))?)
        }
        ApplicationTag::BitString => {
            let (unused, data) = text
                .trim()
                .split_once(';')
                .ok_or_else(|| bad("bit string"))?;
            TaggedValue::BitString(BitString::new(
                unused.parse().map_err(|_| bad("bit string"))?,
                hex_decode(data).ok_or_else(|| bad("bit string"))?,
            ))
        }
        ApplicationTag::Date => {
            let parts: Vec<u8> = text
                .trim()
                .split('-')
                .map(|p| p.parse())
                .collect::<Result<_, _>>()
                .map_err(|_| bad("date"))?;
            if parts.len() != 4 {
                return Err(bad("date"));
            }
            TaggedValue::Date(Date::from_octets([parts[0], parts[1], parts[2], parts[3]]))
        }
        ApplicationTag::Time => {
            let text = text.trim();
            let (hms, hundredths) = text.split_once('.').ok_or_else(|| bad("time"))?;
            let parts: Vec<u8> = hms
                .split(':')
                .map(|p| p.parse())
                .collect::<Result<_, _>>()
                .map_err(|_| bad("time"))?;
            if parts.len() != 3 {
                return Err(bad("time"));
            }
            TaggedValue::Time(Time::from_octets([
                parts[0],
                parts[1],
                parts[2],
                hundredths.parse().map_err(|_| bad("time"))?,
            ]))
        }
        ApplicationTag::ObjectId => {
            let (type_text, instance) =
                text.trim().split_once(':').ok_or_else(|| bad("object id"))?;
            let object_type =
                ObjectType::from_name(type_text).ok_or_else(|| bad("object id"))?;
            TaggedValue::ObjectId(ObjectId::new(
                object_type,
                instance.parse().map_err(|_| bad("object id"))?,
            ))
        }
    })
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::persist::EmbeddedResources;
    use crate::storage::{DeviceStorage, StorageObject};
    use bacstack_core::types::{
        BitString, Date, ObjectId, ObjectType, PropertyId, PropertyRef, TaggedValue, Time,
    };

    fn sample_storage() -> DeviceStorage {
        let mut storage = DeviceStorage::new(666);
        storage.add_object(StorageObject::commandable(
            ObjectType::AnalogValue,
            0,
            TaggedValue::Real(1234.5),
        ));
        storage.add_object(
            StorageObject::new(ObjectType::BinaryValue, 3)
                .with_property(PropertyId::PresentValue, vec![TaggedValue::Boolean(true)])
                .with_property(
                    PropertyId::ObjectName,
                    vec![TaggedValue::CharacterString("Fan <1> & Co".into())],
                )
                .with_property(
                    PropertyId::StatusFlags,
                    vec![TaggedValue::BitString(BitString::new(4, vec![0b1010_0000]))],
                ),
        );
        storage.add_object(
            StorageObject::new(ObjectType::Schedule, 1)
                .with_property(
                    PropertyId::Proprietary(300),
                    vec![
                        TaggedValue::Date(Date {
                            year_since_1900: 126,
                            month: 8,
                            day: 2,
                            weekday: 7,
                        }),
                        TaggedValue::Time(Time {
                            hour: 6,
                            minute: 30,
                            second: 0,
                            hundredths: 0,
                        }),
                    ],
                )
                .with_property(
                    PropertyId::ObjectIdentifier,
                    vec![TaggedValue::ObjectId(ObjectId::new(ObjectType::Schedule, 1))],
                ),
        );
        storage
    }

    #[test]
    fn xml_roundtrip_reads_back_identically() {
        let storage = sample_storage();
        let xml = storage.to_xml().unwrap();
        let restored = DeviceStorage::from_xml(&xml).unwrap();

        assert_eq!(restored.device_id(), storage.device_id());
        for object in storage.objects() {
            for property in &object.properties {
                let reference = PropertyRef::whole(property.property_id);
                assert_eq!(
                    restored.read_property(object.object_id(), reference).unwrap(),
                    storage.read_property(object.object_id(), reference).unwrap(),
                    "property {:?} of {}",
                    property.property_id,
                    object.object_id()
                );
                let restored_tag = restored
                    .find_object(object.object_id())
                    .unwrap()
                    .property(property.property_id)
                    .unwrap()
                    .tag;
                assert_eq!(restored_tag, property.tag);
            }
        }
    }

    #[test]
    fn missing_file_falls_back_to_embedded() {
        let storage = sample_storage();
        let xml = storage.to_xml().unwrap();
        let leaked: &'static str = Box::leak(xml.into_boxed_str());
        let embedded = EmbeddedResources::new().register("device.xml", leaked);

        let restored = DeviceStorage::load("/nonexistent/device.xml", &embedded).unwrap();
        assert_eq!(restored.device_id(), 666);

        let err = DeviceStorage::load("/nonexistent/other.xml", &embedded).unwrap_err();
        assert!(matches!(err, crate::persist::PersistError::NotFound(_)));
    }

    #[test]
    fn device_id_attribute_survives() {
        let xml = DeviceStorage::new(42).to_xml().unwrap();
        assert!(xml.contains("DeviceId=\"42\""));
        let restored = DeviceStorage::from_xml(&xml).unwrap();
        assert_eq!(restored.device_id(), 42);
    }
}
