//! The high-level client: discovery, enumeration, and point-level
//! read/write on top of the engine.

use crate::engine::{Engine, EngineConfig, Reply, ServiceOutcome, UnconfirmedReply};
use crate::error::ClientError;
use crate::node::{BacNode, BacPoint};
use crate::point::{PointKind, PointRef};
use bacstack_core::encoding::cursor::DecodeCursor;
use bacstack_core::services::cov_notification::CovNotification;
use bacstack_core::services::i_am::IAm;
use bacstack_core::services::read_property::{ReadProperty, ReadPropertyAck};
use bacstack_core::services::read_property_multiple::{
    ReadAccessSpec, ReadPropertyMultiple, ReadPropertyMultipleAck,
};
use bacstack_core::services::subscribe_cov::SubscribeCov;
use bacstack_core::services::time_sync::TimeSynchronization;
use bacstack_core::services::who_has::{IHave, WhoHas, WhoHasTarget};
use bacstack_core::services::who_is::WhoIs;
use bacstack_core::services::write_property::WriteProperty;
use bacstack_core::services::write_property_multiple::{WriteAccessSpec, WritePropertyMultiple};
use bacstack_core::services::{ConfirmedService, UnconfirmedService};
use bacstack_core::types::{
    Date, ObjectId, ObjectType, PropertyId, PropertyRef, PropertyValue, TaggedValue, Time,
};
use bacstack_datalink::{Address, Transport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

/// Client tuning knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Only track this device id when set; I-Ams from other devices are
    /// ignored.
    pub target_device_id: Option<u32>,
    /// How long [`BacnetClient::scan`] waits for the first I-Am.
    pub scan_wait: Duration,
    /// Objects per ReadPropertyMultiple batch during enumeration.
    pub batch_size: usize,
    /// Period of the background Who-Is refresh.
    pub whois_interval: Duration,
    /// Enumerate a device's points as soon as it is discovered.
    pub auto_enumerate: bool,
    /// Listener mode: keep the node book from inbound I-Ams but never
    /// originate Who-Is traffic. Server façades run the client this way.
    pub listen_only: bool,
    pub engine: EngineConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target_device_id: None,
            scan_wait: Duration::from_millis(3000),
            batch_size: 20,
            whois_interval: Duration::from_secs(60),
            auto_enumerate: true,
            listen_only: false,
            engine: EngineConfig::default(),
        }
    }
}

/// The BACnet client. Construct with [`BacnetClient::new`], then
/// [`open`](Self::open) to start discovery.
pub struct BacnetClient<T: Transport> {
    engine: Arc<Engine<T>>,
    config: ClientConfig,
    nodes: Mutex<HashMap<u32, BacNode>>,
    node_seen: Notify,
    ihave_sink: Mutex<Option<mpsc::UnboundedSender<(Address, OwnedIHave)>>>,
    cov_sink: Mutex<Option<mpsc::UnboundedSender<CovEvent>>>,
    whois_task: Mutex<Option<JoinHandle<()>>>,
}

/// An owned I-Have observation.
#[derive(Debug, Clone)]
pub struct OwnedIHave {
    pub device_id: ObjectId,
    pub object_id: ObjectId,
    pub object_name: String,
}

/// A received change-of-value notification.
#[derive(Debug, Clone)]
pub struct CovEvent {
    pub source: Address,
    pub confirmed: bool,
    pub notification: CovNotification,
}

impl<T: Transport> BacnetClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Arc<Self> {
        let engine = Engine::new(transport, config.engine.clone());
        Arc::new(Self {
            engine,
            config,
            nodes: Mutex::new(HashMap::new()),
            node_seen: Notify::new(),
            ihave_sink: Mutex::new(None),
            cov_sink: Mutex::new(None),
            whois_task: Mutex::new(None),
        })
    }

    pub fn engine(&self) -> &Arc<Engine<T>> {
        &self.engine
    }

    /// Starts the receive worker, registers the discovery handlers,
    /// broadcasts a Who-Is, and schedules the periodic refresh.
    pub async fn open(self: &Arc<Self>) -> Result<(), ClientError> {
        self.engine.start();
        self.register_handlers();
        if self.config.listen_only {
            return Ok(());
        }
        if let Err(err) = self
            .engine
            .broadcast(UnconfirmedService::WhoIs, |buf| WhoIs::global().encode(buf))
            .await
        {
            log::warn!("initial device search failed: {err}");
        }

        let weak = Arc::downgrade(self);
        let interval = self.config.whois_interval;
        *self.whois_task.lock().expect("whois task lock") = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(client) = weak.upgrade() else {
                    break;
                };
                if let Err(err) = client
                    .engine
                    .broadcast(UnconfirmedService::WhoIs, |buf| WhoIs::global().encode(buf))
                    .await
                {
                    log::warn!("periodic device search failed: {err}");
                }
            }
        }));
        Ok(())
    }

    /// Stops the refresh task and the engine; in-flight calls observe
    /// [`ClientError::Closed`].
    pub fn close(&self) {
        if let Some(task) = self.whois_task.lock().expect("whois task lock").take() {
            task.abort();
        }
        self.engine.close();
    }

    fn register_handlers(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.engine
            .on_unconfirmed(UnconfirmedService::IAm, move |source, payload| {
                let client = weak.upgrade()?;
                let mut cur = DecodeCursor::new(payload);
                match IAm::decode(&mut cur) {
                    Ok(i_am) => client.absorb_i_am(source, i_am),
                    Err(err) => log::debug!("ignoring malformed I-Am from {source}: {err}"),
                }
                None
            });

        let weak: Weak<Self> = Arc::downgrade(self);
        self.engine
            .on_unconfirmed(UnconfirmedService::IHave, move |source, payload| {
                let client = weak.upgrade()?;
                let mut cur = DecodeCursor::new(payload);
                if let Ok(i_have) = IHave::decode(&mut cur) {
                    let sink = client.ihave_sink.lock().expect("ihave sink lock");
                    if let Some(tx) = sink.as_ref() {
                        let _ = tx.send((
                            source.clone(),
                            OwnedIHave {
                                device_id: i_have.device_id,
                                object_id: i_have.object_id,
                                object_name: i_have.object_name,
                            },
                        ));
                    }
                }
                None
            });

        let weak: Weak<Self> = Arc::downgrade(self);
        self.engine
            .on_unconfirmed(UnconfirmedService::CovNotification, move |source, payload| {
                let client = weak.upgrade()?;
                let mut cur = DecodeCursor::new(payload);
                if let Ok(notification) = CovNotification::decode(&mut cur) {
                    client.push_cov(CovEvent {
                        source: source.clone(),
                        confirmed: false,
                        notification,
                    });
                }
                None
            });

        let weak: Weak<Self> = Arc::downgrade(self);
        self.engine
            .on_confirmed(ConfirmedService::CovNotification, move |source, payload| {
                let Some(client) = weak.upgrade() else {
                    return Ok(Reply::Simple);
                };
                let mut cur = DecodeCursor::new(payload);
                let notification = CovNotification::decode(&mut cur)
                    .map_err(crate::engine::ServiceFault::from_decode)?;
                client.push_cov(CovEvent {
                    source: source.clone(),
                    confirmed: true,
                    notification,
                });
                Ok(Reply::Simple)
            });
    }

    fn push_cov(&self, event: CovEvent) {
        let sink = self.cov_sink.lock().expect("cov sink lock");
        if let Some(tx) = sink.as_ref() {
            let _ = tx.send(event);
        }
    }

    fn absorb_i_am(self: &Arc<Self>, source: &Address, i_am: IAm) {
        let device_id = i_am.device_id.instance();
        if let Some(target) = self.config.target_device_id {
            if target != 0 && target != device_id {
                return;
            }
        }
        let is_new = {
            let mut nodes = self.nodes.lock().expect("node lock");
            let is_new = !nodes.contains_key(&device_id);
            let entry = nodes
                .entry(device_id)
                .or_insert_with(|| BacNode::new(source.clone(), device_id));
            entry.address = source.clone();
            entry.max_apdu = i_am.max_apdu;
            entry.segmentation = i_am.segmentation;
            entry.vendor_id = i_am.vendor_id;
            is_new
        };
        self.node_seen.notify_waiters();

        if is_new && self.config.auto_enumerate && !self.config.listen_only {
            let client = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = client.enumerate_properties(device_id, true).await {
                    log::warn!("enumeration of device {device_id} failed: {err}");
                }
            });
        }
    }

    /// Broadcasts a Who-Is and waits for the first device to answer.
    pub async fn scan(&self) -> Result<Option<BacNode>, ClientError> {
        if let Err(err) = self
            .engine
            .broadcast(UnconfirmedService::WhoIs, |buf| WhoIs::global().encode(buf))
            .await
        {
            log::warn!("device search broadcast failed: {err}");
        }
        let deadline = Instant::now() + self.config.scan_wait;
        loop {
            if let Some(node) = self.nodes.lock().expect("node lock").values().next() {
                return Ok(Some(node.clone()));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let _ = timeout(remaining, self.node_seen.notified()).await;
        }
    }

    /// The node for a device id, if discovered.
    pub fn get_node(&self, device_id: u32) -> Option<BacNode> {
        self.nodes.lock().expect("node lock").get(&device_id).cloned()
    }

    /// The node at a transport address, if discovered.
    pub fn get_node_by_address(&self, address: &Address) -> Option<BacNode> {
        self.nodes
            .lock()
            .expect("node lock")
            .values()
            .find(|node| node.address.same_endpoint(address))
            .cloned()
    }

    /// All discovered nodes.
    pub fn nodes(&self) -> Vec<BacNode> {
        self.nodes.lock().expect("node lock").values().cloned().collect()
    }

    /// Waits until `device_id` shows up, bounded by `wait`.
    pub async fn wait_for_device(&self, device_id: u32, wait: Duration) -> Option<BacNode> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(node) = self.get_node(device_id) {
                return Some(node);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let _ = timeout(remaining, self.node_seen.notified()).await;
        }
    }

    /// Reads the device's object list and batch-reads name, value, and
    /// description for every object, updating the node's point list.
    pub async fn enumerate_properties(
        &self,
        device_id: u32,
        include_values: bool,
    ) -> Result<Vec<BacPoint>, ClientError> {
        let address = self
            .get_node(device_id)
            .ok_or(ClientError::UnknownDevice(device_id))?
            .address;

        let list = self
            .read_property_values(
                &address,
                ObjectId::new(ObjectType::Device, device_id),
                PropertyRef::whole(PropertyId::ObjectList),
            )
            .await?;
        let object_ids: Vec<ObjectId> = list
            .iter()
            .filter_map(|value| match value {
                TaggedValue::ObjectId(id) => Some(*id),
                _ => None,
            })
            .filter(|id| {
                !matches!(
                    id.object_type(),
                    ObjectType::Device | ObjectType::NotificationClass
                )
            })
            .collect();

        let mut points = Vec::with_capacity(object_ids.len());
        // Manual stepping: one ReadPropertyMultiple per batch of objects.
        for batch in object_ids.chunks(self.config.batch_size.max(1)) {
            let request = ReadPropertyMultiple {
                specs: batch
                    .iter()
                    .map(|&object_id| ReadAccessSpec {
                        object_id,
                        references: vec![
                            PropertyRef::whole(PropertyId::ObjectName),
                            PropertyRef::whole(PropertyId::PresentValue),
                            PropertyRef::whole(PropertyId::Description),
                        ],
                    })
                    .collect(),
            };
            let ack = self.read_property_multiple(&address, &request).await?;
            for access in ack.results {
                let mut point = BacPoint::new(access.object_id);
                for property in access.properties {
                    let value = match property.values.into_iter().next() {
                        Some(TaggedValue::Error { .. }) | None => continue,
                        Some(value) => value,
                    };
                    match property.reference.property_id {
                        PropertyId::ObjectName => {
                            if let TaggedValue::CharacterString(name) = value {
                                point.name = Some(name);
                            }
                        }
                        PropertyId::Description => {
                            if let TaggedValue::CharacterString(text) = value {
                                point.description = Some(text);
                            }
                        }
                        PropertyId::PresentValue => {
                            point.kind = PointKind::for_value(&value);
                            if include_values {
                                point.value = Some(value);
                            }
                        }
                        _ => {}
                    }
                }
                points.push(point);
            }
        }

        if let Some(node) = self.nodes.lock().expect("node lock").get_mut(&device_id) {
            node.points = points.clone();
        }
        Ok(points)
    }

    /// Low-level ReadProperty returning every value of the property.
    pub async fn read_property_values(
        &self,
        address: &Address,
        object_id: ObjectId,
        reference: PropertyRef,
    ) -> Result<Vec<TaggedValue>, ClientError> {
        let request = ReadProperty {
            object_id,
            reference,
        };
        let outcome = self
            .engine
            .confirmed_request(address, ConfirmedService::ReadProperty, |buf| {
                request.encode(buf)
            })
            .await?;
        let ServiceOutcome::Complex(payload) = outcome else {
            return Err(ClientError::UnexpectedResponse);
        };
        let mut cur = DecodeCursor::new(&payload);
        Ok(ReadPropertyAck::decode(&mut cur)?.values)
    }

    /// Reads a point's present value by its `"instance_type"` name.
    pub async fn read_property(
        &self,
        address: &Address,
        point: &str,
    ) -> Result<TaggedValue, ClientError> {
        let point: PointRef = point.parse()?;
        self.read_object_value(address, point.object_id()).await
    }

    /// Reads an object's present value.
    pub async fn read_object_value(
        &self,
        address: &Address,
        object_id: ObjectId,
    ) -> Result<TaggedValue, ClientError> {
        let mut values = self
            .read_property_values(
                address,
                object_id,
                PropertyRef::whole(PropertyId::PresentValue),
            )
            .await?;
        match values.len() {
            0 => Ok(TaggedValue::Null),
            1 => Ok(values.remove(0)),
            _ => Ok(TaggedValue::Constructed {
                tag_num: 0,
                values,
            }),
        }
    }

    /// Batch-reads several points' present values in one request. The
    /// result maps each requested name to its value; entries the device
    /// answered with an error are omitted.
    pub async fn read_properties(
        &self,
        address: &Address,
        points: &[&str],
    ) -> Result<HashMap<String, TaggedValue>, ClientError> {
        let mut by_object: HashMap<ObjectId, String> = HashMap::new();
        let mut specs = Vec::with_capacity(points.len());
        for name in points {
            let point: PointRef = name.parse()?;
            let object_id = point.object_id();
            by_object.insert(object_id, (*name).to_owned());
            specs.push(ReadAccessSpec {
                object_id,
                references: vec![PropertyRef::whole(PropertyId::PresentValue)],
            });
        }

        let ack = self
            .read_property_multiple(address, &ReadPropertyMultiple { specs })
            .await?;
        let mut out = HashMap::new();
        for access in ack.results {
            let Some(name) = by_object.get(&access.object_id) else {
                continue;
            };
            for property in access.properties {
                if property.reference.property_id != PropertyId::PresentValue {
                    continue;
                }
                match property.values.into_iter().next() {
                    Some(TaggedValue::Error { class, code }) => {
                        log::debug!(
                            "device at {address} answered {name} with {class:?}/{code:?}"
                        );
                    }
                    Some(value) => {
                        out.insert(name.clone(), value);
                    }
                    None => {}
                }
            }
        }
        Ok(out)
    }

    /// Raw ReadPropertyMultiple exchange.
    pub async fn read_property_multiple(
        &self,
        address: &Address,
        request: &ReadPropertyMultiple,
    ) -> Result<ReadPropertyMultipleAck, ClientError> {
        let outcome = self
            .engine
            .confirmed_request(address, ConfirmedService::ReadPropertyMultiple, |buf| {
                request.encode(buf)
            })
            .await?;
        let ServiceOutcome::Complex(payload) = outcome else {
            return Err(ClientError::UnexpectedResponse);
        };
        let mut cur = DecodeCursor::new(&payload);
        Ok(ReadPropertyMultipleAck::decode(&mut cur)?)
    }

    /// Writes a point's present value by its `"instance_type"` name.
    pub async fn write_property(
        &self,
        address: &Address,
        point: &str,
        value: TaggedValue,
        priority: Option<u8>,
    ) -> Result<(), ClientError> {
        let point: PointRef = point.parse()?;
        let mut request = WriteProperty::new(
            point.object_id(),
            PropertyId::PresentValue,
            value,
        );
        request.priority = priority;
        self.write(address, &request).await
    }

    /// Raw WriteProperty exchange.
    pub async fn write(
        &self,
        address: &Address,
        request: &WriteProperty,
    ) -> Result<(), ClientError> {
        let outcome = self
            .engine
            .confirmed_request(address, ConfirmedService::WriteProperty, |buf| {
                request.encode(buf)
            })
            .await?;
        match outcome {
            ServiceOutcome::Simple => Ok(()),
            ServiceOutcome::Complex(_) => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Writes several points' present values in one request.
    pub async fn write_properties(
        &self,
        address: &Address,
        writes: &[(&str, TaggedValue)],
    ) -> Result<(), ClientError> {
        let mut specs = Vec::with_capacity(writes.len());
        for (name, value) in writes {
            let point: PointRef = name.parse()?;
            specs.push(WriteAccessSpec {
                object_id: point.object_id(),
                properties: vec![PropertyValue::new(
                    PropertyRef::whole(PropertyId::PresentValue),
                    vec![value.clone()],
                )],
            });
        }
        let request = WritePropertyMultiple { specs };
        let outcome = self
            .engine
            .confirmed_request(address, ConfirmedService::WritePropertyMultiple, |buf| {
                request.encode(buf)
            })
            .await?;
        match outcome {
            ServiceOutcome::Simple => Ok(()),
            ServiceOutcome::Complex(_) => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Broadcasts a Who-Has and collects the I-Have answers that arrive
    /// within `wait`.
    pub async fn who_has(
        &self,
        target: WhoHasTarget,
        wait: Duration,
    ) -> Result<Vec<(Address, OwnedIHave)>, ClientError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.ihave_sink.lock().expect("ihave sink lock") = Some(tx);
        let request = WhoHas {
            range: None,
            target,
        };
        self.engine
            .broadcast(UnconfirmedService::WhoHas, |buf| request.encode(buf))
            .await?;

        let mut found = Vec::new();
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, rx.recv()).await {
                Ok(Some(observation)) => found.push(observation),
                Ok(None) | Err(_) => break,
            }
        }
        *self.ihave_sink.lock().expect("ihave sink lock") = None;
        Ok(found)
    }

    /// Subscribes to change-of-value notifications for an object.
    pub async fn subscribe_cov(
        &self,
        address: &Address,
        request: &SubscribeCov,
    ) -> Result<(), ClientError> {
        let outcome = self
            .engine
            .confirmed_request(address, ConfirmedService::SubscribeCov, |buf| {
                request.encode(buf)
            })
            .await?;
        match outcome {
            ServiceOutcome::Simple => Ok(()),
            ServiceOutcome::Complex(_) => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Opens the stream of received COV notifications. Only one consumer
    /// at a time; a second call replaces the first.
    pub fn cov_events(&self) -> mpsc::UnboundedReceiver<CovEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.cov_sink.lock().expect("cov sink lock") = Some(tx);
        rx
    }

    /// Broadcasts a time synchronization, local or UTC.
    pub async fn time_synchronize(
        &self,
        date: Date,
        time: Time,
        utc: bool,
    ) -> Result<(), ClientError> {
        let service = if utc {
            UnconfirmedService::UtcTimeSynchronization
        } else {
            UnconfirmedService::TimeSynchronization
        };
        let request = TimeSynchronization { date, time };
        self.engine
            .broadcast(service, |buf| request.encode(buf))
            .await
    }

    /// Injects an unconfirmed reply helper so server façades can answer
    /// Who-Is through the same engine.
    pub fn reply_i_am(i_am: &IAm) -> Result<UnconfirmedReply, ClientError> {
        let mut raw = [0u8; 64];
        let mut buf = bacstack_core::encoding::buffer::EncodeBuffer::new(&mut raw);
        i_am.encode(&mut buf)?;
        Ok(UnconfirmedReply {
            service: UnconfirmedService::IAm,
            payload: buf.payload().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BacnetClient, ClientConfig};
    use bacstack_datalink::UdpTransport;

    #[tokio::test]
    async fn scan_returns_none_on_silent_domain() {
        let transport = UdpTransport::bind_ephemeral().await.unwrap();
        let config = ClientConfig {
            scan_wait: std::time::Duration::from_millis(100),
            ..ClientConfig::default()
        };
        let client = BacnetClient::new(transport, config);
        client.open().await.unwrap();
        assert!(client.scan().await.unwrap().is_none());
        client.close();
    }
}
