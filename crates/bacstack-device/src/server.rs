//! The device-server façade: a listener-mode client, a storage mutex,
//! and the request handlers that bridge them.

use crate::persist::{EmbeddedResources, PersistError};
use crate::storage::{DeviceStorage, StorageError};
use bacstack_client::engine::{Reply, ServiceFault};
use bacstack_client::{BacnetClient, ClientConfig, ClientError};
use bacstack_core::encoding::buffer::EncodeBuffer;
use bacstack_core::encoding::cursor::DecodeCursor;
use bacstack_core::services::i_am::IAm;
use bacstack_core::services::read_property::{ReadProperty, ReadPropertyAck};
use bacstack_core::services::read_property_multiple::{
    ReadPropertyMultiple, ReadPropertyMultipleAck,
};
use bacstack_core::services::who_is::WhoIs;
use bacstack_core::services::write_property::WriteProperty;
use bacstack_core::services::{ConfirmedService, UnconfirmedService};
use bacstack_core::types::{
    ErrorClass, ErrorCode, ObjectType, PropertyId, ReadAccessResult, Segmentation,
};
use bacstack_core::EncodeError;
use bacstack_datalink::{Transport, UdpTransport, UdpTransportConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("transport error: {0}")]
    Transport(#[from] bacstack_datalink::TransportError),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub device_id: u32,
    pub port: u16,
    /// Storage document loaded at open; missing paths fall back to the
    /// embedded resources, absent configuration starts empty.
    pub storage_file: Option<PathBuf>,
    pub vendor_id: u32,
    /// (type, property) pairs remote writes may touch.
    pub writable: Vec<(ObjectType, PropertyId)>,
}

impl ServerConfig {
    pub fn new(device_id: u32) -> Self {
        Self {
            device_id,
            port: bacstack_datalink::address::BACNET_IP_PORT,
            storage_file: None,
            vendor_id: 0,
            writable: vec![(ObjectType::AnalogValue, PropertyId::PresentValue)],
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_storage_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_file = Some(path.into());
        self
    }
}

/// A BACnet device server. Holds a listener-mode client, the storage
/// mutex, and the configured identity.
pub struct DeviceServer {
    client: Arc<BacnetClient<UdpTransport>>,
    storage: Arc<Mutex<DeviceStorage>>,
    config: ServerConfig,
    embedded: EmbeddedResources,
}

impl DeviceServer {
    /// Binds the server transport. `open` must follow before the device
    /// answers anything.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        Self::bind_with_embedded(config, EmbeddedResources::new()).await
    }

    pub async fn bind_with_embedded(
        config: ServerConfig,
        embedded: EmbeddedResources,
    ) -> Result<Self, ServerError> {
        let transport = UdpTransport::bind(UdpTransportConfig {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port),
            ..UdpTransportConfig::default()
        })
        .await?;
        let client = BacnetClient::new(
            transport,
            ClientConfig {
                listen_only: true,
                ..ClientConfig::default()
            },
        );
        Ok(Self {
            client,
            storage: Arc::new(Mutex::new(DeviceStorage::new(config.device_id))),
            config,
            embedded,
        })
    }

    /// The storage mutex; user code mutates properties through it.
    pub fn storage(&self) -> Arc<Mutex<DeviceStorage>> {
        Arc::clone(&self.storage)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.client.engine().transport().local_addr()?)
    }

    /// Loads storage, registers the handlers, and announces the device.
    pub async fn open(&self) -> Result<(), ServerError> {
        if let Some(path) = &self.config.storage_file {
            let mut loaded = DeviceStorage::load(path, &self.embedded)?;
            loaded.set_device_id(self.config.device_id);
            *self.storage.lock().expect("storage lock") = loaded;
        }
        {
            let mut storage = self.storage.lock().expect("storage lock");
            storage.set_device_id(self.config.device_id);
            storage.refresh_object_list();
        }

        self.client.open().await?;
        self.register_handlers();

        // One unsolicited I-Am so existing clients learn about us without
        // asking. Best effort: a host without a broadcast route still
        // serves unicast traffic.
        let i_am = self.identity();
        if let Err(err) = self
            .client
            .engine()
            .broadcast(UnconfirmedService::IAm, |buf| i_am.encode(buf))
            .await
        {
            log::warn!("startup announcement failed: {err}");
        }
        Ok(())
    }

    pub fn close(&self) {
        self.client.close();
    }

    fn identity(&self) -> IAm {
        IAm {
            device_id: bacstack_core::types::ObjectId::new(
                ObjectType::Device,
                self.config.device_id,
            ),
            max_apdu: self.client.engine().transport().max_apdu().octets() as u32,
            segmentation: Segmentation::Both,
            vendor_id: self.config.vendor_id,
        }
    }

    fn register_handlers(&self) {
        let engine = self.client.engine();

        // Who-Is: answer with I-Am unless the range excludes us.
        let device_id = self.config.device_id;
        let identity = self.identity();
        engine.on_unconfirmed(UnconfirmedService::WhoIs, move |source, payload| {
            let mut cur = DecodeCursor::new(payload);
            let who_is = match WhoIs::decode(&mut cur) {
                Ok(who_is) => who_is,
                Err(err) => {
                    log::debug!("ignoring malformed Who-Is from {source}: {err}");
                    return None;
                }
            };
            if !who_is.matches(device_id) {
                return None;
            }
            match BacnetClient::<UdpTransport>::reply_i_am(&identity) {
                Ok(reply) => Some(reply),
                Err(err) => {
                    log::warn!("failed to encode I-Am: {err}");
                    None
                }
            }
        });

        let storage = Arc::clone(&self.storage);
        engine.on_confirmed(ConfirmedService::ReadProperty, move |_source, payload| {
            let mut cur = DecodeCursor::new(payload);
            let request = ReadProperty::decode(&mut cur).map_err(ServiceFault::from_decode)?;
            let values = storage
                .lock()
                .expect("storage lock")
                .read_property(request.object_id, request.reference)
                .map_err(|_| ServiceFault::error(ErrorClass::Device, ErrorCode::Other))?;
            let ack = ReadPropertyAck {
                object_id: request.object_id,
                reference: request.reference,
                values,
            };
            encode_reply(|buf| ack.encode(buf))
        });

        let storage = Arc::clone(&self.storage);
        engine.on_confirmed(
            ConfirmedService::ReadPropertyMultiple,
            move |_source, payload| {
                let mut cur = DecodeCursor::new(payload);
                let request =
                    ReadPropertyMultiple::decode(&mut cur).map_err(ServiceFault::from_decode)?;
                let storage = storage.lock().expect("storage lock");

                let mut results = Vec::with_capacity(request.specs.len());
                for spec in &request.specs {
                    if !storage.contains_object(spec.object_id) {
                        return Err(ServiceFault::error(
                            ErrorClass::Object,
                            ErrorCode::UnknownObject,
                        ));
                    }
                    let all_requested = matches!(
                        spec.references.as_slice(),
                        [only] if only.property_id == PropertyId::All
                    );
                    let properties = if all_requested {
                        storage.read_property_all(spec.object_id).map_err(|_| {
                            ServiceFault::error(ErrorClass::Object, ErrorCode::UnknownObject)
                        })?
                    } else {
                        storage.read_property_multiple(spec.object_id, &spec.references)
                    };
                    results.push(ReadAccessResult {
                        object_id: spec.object_id,
                        properties,
                    });
                }
                let ack = ReadPropertyMultipleAck { results };
                encode_reply(|buf| ack.encode(buf))
            },
        );

        let storage = Arc::clone(&self.storage);
        let writable = self.config.writable.clone();
        engine.on_confirmed(ConfirmedService::WriteProperty, move |_source, payload| {
            let mut cur = DecodeCursor::new(payload);
            let request = WriteProperty::decode(&mut cur).map_err(ServiceFault::from_decode)?;

            let allowed = writable.iter().any(|(object_type, property_id)| {
                *object_type == request.object_id.object_type()
                    && *property_id == request.reference.property_id
            });
            if !allowed {
                return Err(ServiceFault::error(
                    ErrorClass::Device,
                    ErrorCode::WriteAccessDenied,
                ));
            }

            let mut storage = storage.lock().expect("storage lock");
            let value = request
                .values
                .first()
                .cloned()
                .unwrap_or(bacstack_core::types::TaggedValue::Null);
            let commanded = storage.write_commandable_property(
                request.object_id,
                request.reference.property_id,
                value,
                request.priority,
            );
            let result = match commanded {
                Err(StorageError::NotForMe) => storage.write_property(
                    request.object_id,
                    request.reference,
                    request.values.clone(),
                    false,
                ),
                other => other,
            };
            match result {
                Ok(()) => Ok(Reply::Simple),
                Err(StorageError::WriteAccessDenied) => Err(ServiceFault::error(
                    ErrorClass::Device,
                    ErrorCode::WriteAccessDenied,
                )),
                Err(_) => Err(ServiceFault::error(ErrorClass::Device, ErrorCode::Other)),
            }
        });
    }
}

/// Encodes an ack payload into an owned reply; oversized payloads are the
/// engine's segmentation problem, not ours.
fn encode_reply<F>(encode: F) -> Result<Reply, ServiceFault>
where
    F: Fn(&mut EncodeBuffer<'_>) -> Result<(), EncodeError>,
{
    // Generous scratch: reassembled answers are capped well above this by
    // the engine.
    let mut raw = vec![0u8; 64 * 1024];
    let mut buf = EncodeBuffer::new(&mut raw);
    match encode(&mut buf) {
        Ok(()) => Ok(Reply::Complex(buf.payload().to_vec())),
        Err(_) => Err(ServiceFault::Abort {
            reason: bacstack_core::types::AbortReason::OutOfResources,
        }),
    }
}
