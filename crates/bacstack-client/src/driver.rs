//! The driver surface consumed by integration hosts: open a device,
//! read and write named points, close.

use crate::client::{BacnetClient, ClientConfig};
use crate::error::ClientError;
use bacstack_core::services::who_is::WhoIs;
use bacstack_core::services::UnconfirmedService;
use bacstack_core::types::TaggedValue;
use bacstack_datalink::address::BACNET_IP_PORT;
use bacstack_datalink::{Address, UdpTransport, UdpTransportConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

fn default_port() -> u16 {
    BACNET_IP_PORT
}

/// Connection parameter for one device.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverParameter {
    /// Device IP; discovered by broadcast when absent.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub device_id: u32,
}

impl DriverParameter {
    /// Canonical key for client pooling: the decimal device id.
    pub fn pool_key(&self) -> String {
        self.device_id.to_string()
    }
}

/// An open device.
#[derive(Clone)]
pub struct DeviceHandle {
    client: Arc<BacnetClient<UdpTransport>>,
    pool_key: String,
    pub device_id: u32,
    pub address: Address,
}

/// Driver entry point. Pools one client per device id.
#[derive(Default)]
pub struct BacnetDriver {
    clients: Mutex<HashMap<String, Arc<BacnetClient<UdpTransport>>>>,
}

impl BacnetDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or reuses) a client for the device and resolves its
    /// address, by direct configuration or by discovery.
    pub async fn open(&self, parameter: &DriverParameter) -> Result<DeviceHandle, ClientError> {
        let pool_key = parameter.pool_key();
        let existing = self
            .clients
            .lock()
            .expect("client pool lock")
            .get(&pool_key)
            .cloned();
        let client = match existing {
            Some(client) => client,
            None => {
                let transport = UdpTransport::bind(UdpTransportConfig {
                    bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
                    broadcast: Some(SocketAddr::new(
                        IpAddr::V4(Ipv4Addr::BROADCAST),
                        parameter.port,
                    )),
                    ..UdpTransportConfig::default()
                })
                .await?;
                let config = ClientConfig {
                    target_device_id: Some(parameter.device_id),
                    ..ClientConfig::default()
                };
                let client = BacnetClient::new(transport, config);
                client.open().await?;
                self.clients
                    .lock()
                    .expect("client pool lock")
                    .insert(pool_key.clone(), Arc::clone(&client));
                client
            }
        };

        // A configured address gets a unicast Who-Is so the node book
        // still fills in max-APDU and segmentation capabilities.
        if let Some(host) = &parameter.address {
            let ip: IpAddr = host
                .parse()
                .map_err(|_| ClientError::BadPointName(host.clone()))?;
            let target = Address::new(SocketAddr::new(ip, parameter.port));
            client
                .engine()
                .unconfirmed(&target, UnconfirmedService::WhoIs, |buf| {
                    WhoIs::global().encode(buf)
                })
                .await?;
        }

        let wait = std::time::Duration::from_millis(3000);
        let node = client
            .wait_for_device(parameter.device_id, wait)
            .await
            .ok_or(ClientError::UnknownDevice(parameter.device_id))?;

        Ok(DeviceHandle {
            client,
            pool_key,
            device_id: parameter.device_id,
            address: node.address,
        })
    }

    /// Reads the named points; the result maps each answered name to its
    /// value.
    pub async fn read(
        &self,
        handle: &DeviceHandle,
        points: &[&str],
    ) -> Result<HashMap<String, TaggedValue>, ClientError> {
        handle.client.read_properties(&handle.address, points).await
    }

    /// Writes one named point.
    pub async fn write(
        &self,
        handle: &DeviceHandle,
        point: &str,
        value: TaggedValue,
    ) -> Result<(), ClientError> {
        handle
            .client
            .write_property(&handle.address, point, value, None)
            .await
    }

    /// Closes the device's pooled client.
    pub fn close(&self, handle: DeviceHandle) {
        let removed = self
            .clients
            .lock()
            .expect("client pool lock")
            .remove(&handle.pool_key);
        if let Some(client) = removed {
            client.close();
        }
    }
}
