/// Property references, property values, and read-access results.
pub mod access;
/// Owned bit string.
pub mod bit_string;
/// BACnet date and time with wildcard octets.
pub mod date_time;
/// Packed (type, instance) object identifier.
pub mod object_id;
/// Object type enumeration.
pub mod object_type;
/// Property identifier enumeration.
pub mod property_id;
/// Protocol-level enumerations: segmentation, max-APDU, error/reject/abort codes.
pub mod protocol;
/// The application-layer value union.
pub mod value;

pub use access::{PropertyRef, PropertyValue, ReadAccessResult, ARRAY_INDEX_ALL};
pub use bit_string::BitString;
pub use date_time::{Date, Time};
pub use object_id::{ObjectId, WILDCARD_DEVICE_INSTANCE};
pub use object_type::ObjectType;
pub use property_id::PropertyId;
pub use protocol::{AbortReason, ErrorClass, ErrorCode, MaxApdu, RejectReason, Segmentation};
pub use value::TaggedValue;
