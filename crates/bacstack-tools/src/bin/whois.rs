use bacstack_client::{BacnetClient, ClientConfig};
use bacstack_datalink::{UdpTransport, UdpTransportConfig};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bacnet-whois", about = "Discover BACnet devices on the local domain")]
struct Args {
    /// Target UDP port of the broadcast.
    #[arg(long, default_value_t = 47808)]
    port: u16,
    /// Seconds to wait for answers.
    #[arg(long, default_value_t = 3)]
    wait: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let transport = UdpTransport::bind(UdpTransportConfig {
        bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        broadcast: Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), args.port)),
        ..UdpTransportConfig::default()
    })
    .await?;
    let client = BacnetClient::new(
        transport,
        ClientConfig {
            auto_enumerate: false,
            ..ClientConfig::default()
        },
    );
    client.open().await?;

    tokio::time::sleep(Duration::from_secs(args.wait)).await;
    let nodes = client.nodes();
    if nodes.is_empty() {
        println!("no devices answered");
    }
    for node in nodes {
        println!(
            "device {} at {} (max-apdu {}, vendor {})",
            node.device_id, node.address, node.max_apdu, node.vendor_id
        );
    }
    client.close();
    Ok(())
}
