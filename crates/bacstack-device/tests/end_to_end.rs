//! End-to-end exchanges between a device server and a client over
//! localhost UDP. The client's broadcast address is pointed at the
//! server's socket so discovery works without a real broadcast domain.

use bacstack_client::{BacnetClient, ClientConfig, ClientError};
use bacstack_core::services::read_property_multiple::{ReadAccessSpec, ReadPropertyMultiple};
use bacstack_core::types::{
    ErrorCode, ObjectId, ObjectType, PropertyId, PropertyRef, TaggedValue,
};
use bacstack_datalink::{Address, UdpTransport, UdpTransportConfig};
use bacstack_device::{DeviceServer, ServerConfig, StorageObject};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

async fn start_server(device_id: u32, objects: Vec<StorageObject>) -> (DeviceServer, SocketAddr) {
    let server = DeviceServer::bind(ServerConfig::new(device_id).with_port(0))
        .await
        .unwrap();
    {
        let storage = server.storage();
        let mut storage = storage.lock().unwrap();
        for object in objects {
            storage.add_object(object);
        }
    }
    server.open().await.unwrap();
    let port = server.local_addr().unwrap().port();
    (
        server,
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
    )
}

async fn start_client(server: SocketAddr) -> Arc<BacnetClient<UdpTransport>> {
    let transport = UdpTransport::bind(UdpTransportConfig {
        bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        broadcast: Some(server),
        ..UdpTransportConfig::default()
    })
    .await
    .unwrap();
    let client = BacnetClient::new(
        transport,
        ClientConfig {
            auto_enumerate: false,
            scan_wait: Duration::from_millis(3000),
            ..ClientConfig::default()
        },
    );
    client.open().await.unwrap();
    client
}

fn analog_value(instance: u32, value: f32) -> StorageObject {
    StorageObject::commandable(ObjectType::AnalogValue, instance, TaggedValue::Real(value))
}

#[tokio::test]
async fn discovery_finds_the_device() {
    let (server, addr) = start_server(666, vec![]).await;
    let client = start_client(addr).await;

    let node = client
        .wait_for_device(666, Duration::from_secs(3))
        .await
        .expect("device answers the broadcast");
    assert_eq!(node.device_id, 666);
    assert_eq!(node.address.endpoint(), addr);
    assert_eq!(client.nodes().len(), 1);

    client.close();
    server.close();
}

#[tokio::test]
async fn read_analog_value_by_point_name_and_object_id() {
    let (server, addr) = start_server(10, vec![analog_value(0, 1234.5)]).await;
    let client = start_client(addr).await;
    let target = Address::new(addr);

    let by_name = client.read_property(&target, "0_2").await.unwrap();
    assert_eq!(by_name, TaggedValue::Real(1234.5));

    let by_id = client
        .read_object_value(&target, ObjectId::new(ObjectType::AnalogValue, 0))
        .await
        .unwrap();
    assert_eq!(by_id, TaggedValue::Real(1234.5));

    client.close();
    server.close();
}

#[tokio::test]
async fn write_then_read_roundtrip_and_denied_write() {
    let (server, addr) = start_server(
        10,
        vec![
            analog_value(0, 0.0),
            StorageObject::new(ObjectType::AnalogInput, 0)
                .with_property(PropertyId::PresentValue, vec![TaggedValue::Real(0.0)]),
        ],
    )
    .await;
    let client = start_client(addr).await;
    let target = Address::new(addr);

    client
        .write_property(&target, "0_2", TaggedValue::Real(777.25), None)
        .await
        .unwrap();
    let value = client.read_property(&target, "0_2").await.unwrap();
    assert_eq!(value, TaggedValue::Real(777.25));

    // Analog inputs are outside the default writable set.
    let err = client
        .write_property(&target, "0_0", TaggedValue::Real(1.0), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::ServiceError {
            code: ErrorCode::WriteAccessDenied,
            ..
        }
    ));

    client.close();
    server.close();
}

#[tokio::test]
async fn batch_read_returns_every_requested_point() {
    let (server, addr) =
        start_server(10, vec![analog_value(0, 10.0), analog_value(2, 20.0)]).await;
    let client = start_client(addr).await;
    let target = Address::new(addr);

    let values = client
        .read_properties(&target, &["0_2", "2_2"])
        .await
        .unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values["0_2"], TaggedValue::Real(10.0));
    assert_eq!(values["2_2"], TaggedValue::Real(20.0));

    client.close();
    server.close();
}

#[tokio::test]
async fn priority_array_over_the_wire() {
    let (server, addr) = start_server(10, vec![analog_value(0, 1.0)]).await;
    let client = start_client(addr).await;
    let target = Address::new(addr);

    client
        .write_property(&target, "0_2", TaggedValue::Real(1.0), Some(8))
        .await
        .unwrap();
    assert_eq!(
        client.read_property(&target, "0_2").await.unwrap(),
        TaggedValue::Real(1.0)
    );

    client
        .write_property(&target, "0_2", TaggedValue::Real(2.0), Some(4))
        .await
        .unwrap();
    assert_eq!(
        client.read_property(&target, "0_2").await.unwrap(),
        TaggedValue::Real(2.0)
    );

    client
        .write_property(&target, "0_2", TaggedValue::Null, Some(4))
        .await
        .unwrap();
    assert_eq!(
        client.read_property(&target, "0_2").await.unwrap(),
        TaggedValue::Real(1.0)
    );

    client.close();
    server.close();
}

#[tokio::test]
async fn batch_read_of_fifty_objects_arrives_in_request_order() {
    let objects: Vec<StorageObject> = (0..50)
        .map(|i| {
            StorageObject::commandable(ObjectType::AnalogValue, i, TaggedValue::Real(i as f32))
                .with_property(
                    PropertyId::ObjectName,
                    vec![TaggedValue::CharacterString(format!(
                        "supply air temperature sensor {i:02}"
                    ))],
                )
                .with_property(
                    PropertyId::Description,
                    vec![TaggedValue::CharacterString(format!(
                        "air handler {} discharge, north riser",
                        i / 4
                    ))],
                )
        })
        .collect();
    let (server, addr) = start_server(10, objects).await;
    let client = start_client(addr).await;
    let target = Address::new(addr);

    // All fifty objects in one request: the answer cannot fit one APDU,
    // so this exchange only succeeds through segment reassembly.
    let request = ReadPropertyMultiple {
        specs: (0..50)
            .map(|i| ReadAccessSpec {
                object_id: ObjectId::new(ObjectType::AnalogValue, i),
                references: vec![
                    PropertyRef::whole(PropertyId::ObjectName),
                    PropertyRef::whole(PropertyId::PresentValue),
                    PropertyRef::whole(PropertyId::Description),
                ],
            })
            .collect(),
    };
    let ack = client.read_property_multiple(&target, &request).await.unwrap();

    assert_eq!(ack.results.len(), 50);
    for (i, access) in ack.results.iter().enumerate() {
        assert_eq!(
            access.object_id,
            ObjectId::new(ObjectType::AnalogValue, i as u32),
            "answers must arrive in request order"
        );
        let value = access
            .properties
            .iter()
            .find(|p| p.reference.property_id == PropertyId::PresentValue)
            .and_then(|p| p.values.first())
            .unwrap();
        assert_eq!(value, &TaggedValue::Real(i as f32));
    }

    client.close();
    server.close();
}

#[tokio::test]
async fn enumeration_collects_names_and_values() {
    let objects = vec![
        analog_value(0, 21.5).with_property(
            PropertyId::ObjectName,
            vec![TaggedValue::CharacterString("Zone Temp".into())],
        ),
        StorageObject::new(ObjectType::BinaryValue, 1)
            .with_property(PropertyId::PresentValue, vec![TaggedValue::Boolean(true)])
            .with_property(
                PropertyId::ObjectName,
                vec![TaggedValue::CharacterString("Fan Status".into())],
            ),
    ];
    let (server, addr) = start_server(20, objects).await;
    let client = start_client(addr).await;

    client
        .wait_for_device(20, Duration::from_secs(3))
        .await
        .expect("discovered");
    let points = client.enumerate_properties(20, true).await.unwrap();

    // The device object itself is filtered out of the point list.
    assert_eq!(points.len(), 2);
    let zone = points
        .iter()
        .find(|p| p.object_id == ObjectId::new(ObjectType::AnalogValue, 0))
        .unwrap();
    assert_eq!(zone.name.as_deref(), Some("Zone Temp"));
    assert_eq!(zone.value, Some(TaggedValue::Real(21.5)));
    assert_eq!(zone.kind, bacstack_client::PointKind::Real);

    client.close();
    server.close();
}
