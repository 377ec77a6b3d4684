//! BACnet device server: the in-memory object/property database, its XML
//! persistence, and the request-handling façade.

pub mod persist;
pub mod server;
pub mod storage;

pub use persist::{EmbeddedResources, PersistError};
pub use server::{DeviceServer, ServerConfig, ServerError};
pub use storage::{DeviceStorage, StorageError, StorageObject, StorageProperty, PRIORITY_LEVELS};
