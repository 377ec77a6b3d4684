use bacstack_client::{BacnetClient, ClientConfig};
use bacstack_datalink::{UdpTransport, UdpTransportConfig};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "bacnet-walkdevice",
    about = "Discover a device and list every point with name, value, and description"
)]
struct Args {
    /// Device id to walk.
    device_id: u32,
    #[arg(long, default_value_t = 47808)]
    port: u16,
    /// Seconds to wait for the device to answer discovery.
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
            target_device_id: Some(args.device_id),
            auto_enumerate: false,
            ..ClientConfig::default()
        },
    );
    client.open().await?;

    let Some(node) = client
        .wait_for_device(args.device_id, Duration::from_secs(args.wait))
        .await
    else {
        eprintln!("device {} did not answer", args.device_id);
        std::process::exit(1);
    };
    println!("device {} at {}", node.device_id, node.address);

    let points = client.enumerate_properties(args.device_id, true).await?;
    for point in points {
        println!(
            "  {:8} {:<30} {:<12} {}",
            point.point_ref().to_string(),
            point.name.as_deref().unwrap_or("-"),
            point
                .value
                .as_ref()
                .map(|v| bacstack_tools::format_value(v))
                .unwrap_or_else(|| "-".into()),
            point.description.as_deref().unwrap_or("")
        );
    }
    client.close();
    Ok(())
}
