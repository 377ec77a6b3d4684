//! Wire-level retransmission behavior, observed with a raw socket
//! standing in for a silent peer.

use bacstack_client::{ClientError, Engine, EngineConfig};
use bacstack_core::services::read_property::ReadProperty;
use bacstack_core::services::ConfirmedService;
use bacstack_core::types::{ObjectId, ObjectType, PropertyId};
use bacstack_datalink::{Address, UdpTransport};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

#[tokio::test]
async fn silent_peer_sees_identical_retransmissions() {
    let observer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let observer_port = observer.local_addr().unwrap().port();
    let target = Address::new(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        observer_port,
    ));

    let retries = 3u8;
    let attempt_timeout = Duration::from_millis(150);
    let engine = Engine::new(
        UdpTransport::bind_ephemeral().await.unwrap(),
        EngineConfig {
            timeout: attempt_timeout,
            retries,
            window_size: 10,
        },
    );
    engine.start();

    let request = ReadProperty::new(
        ObjectId::new(ObjectType::AnalogValue, 0),
        PropertyId::PresentValue,
    );
    let started = Instant::now();
    let outcome = engine
        .confirmed_request(&target, ConfirmedService::ReadProperty, |buf| {
            request.encode(buf)
        })
        .await;
    assert!(matches!(outcome, Err(ClientError::Timeout)));

    // One original transmission plus `retries` retransmissions, each the
    // same bytes.
    let mut datagrams: Vec<Vec<u8>> = Vec::new();
    loop {
        let mut rx = [0u8; 256];
        match timeout(Duration::from_millis(50), observer.recv_from(&mut rx)).await {
            Ok(Ok((n, _))) => datagrams.push(rx[..n].to_vec()),
            _ => break,
        }
    }
    assert_eq!(datagrams.len(), usize::from(retries) + 1);
    for frame in &datagrams[1..] {
        assert_eq!(frame, &datagrams[0]);
    }
    assert!(started.elapsed() >= attempt_timeout * (u32::from(retries) + 1));

    engine.close();
}
