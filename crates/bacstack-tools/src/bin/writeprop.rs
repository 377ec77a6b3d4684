use bacstack_client::{BacnetClient, ClientConfig};
use bacstack_datalink::{Address, UdpTransport};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};

#[derive(Parser, Debug)]
#[command(name = "bacnet-writeprop", about = "Write a point's present value")]
struct Args {
    /// Device IP.
    #[arg(long)]
    ip: IpAddr,
    #[arg(long, default_value_t = 47808)]
    port: u16,
    /// Command priority 1..=16.
    #[arg(long)]
    priority: Option<u8>,
    /// Point name in instance_type form.
    point: String,
    /// Value literal; see bacstack-tools docs for the accepted forms.
    value: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let value = bacstack_tools::parse_value(&args.value)?;

    let transport = UdpTransport::bind_ephemeral().await?;
    let client = BacnetClient::new(
        transport,
        ClientConfig {
            auto_enumerate: false,
            ..ClientConfig::default()
        },
    );
    client.open().await?;

    let target = Address::new(SocketAddr::new(args.ip, args.port));
    match client
        .write_property(&target, &args.point, value, args.priority)
        .await
    {
        Ok(()) => println!("ok"),
        Err(err) => {
            eprintln!("write failed: {err}");
            std::process::exit(1);
        }
    }
    client.close();
    Ok(())
}
