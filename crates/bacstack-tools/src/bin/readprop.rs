use bacstack_client::{BacnetClient, ClientConfig};
use bacstack_datalink::{Address, UdpTransport};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};

#[derive(Parser, Debug)]
#[command(name = "bacnet-readprop", about = "Read a point's present value")]
struct Args {
    /// Device IP.
    #[arg(long)]
    ip: IpAddr,
    #[arg(long, default_value_t = 47808)]
    port: u16,
    /// Point name in instance_type form, e.g. 0_2 for analog-value 0.
    point: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

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
    match client.read_property(&target, &args.point).await {
        Ok(value) => println!("{}", bacstack_tools::format_value(&value)),
        Err(err) => {
            eprintln!("read failed: {err}");
            std::process::exit(1);
        }
    }
    client.close();
    Ok(())
}
