use bacstack_core::types::{ObjectType, TaggedValue};
use bacstack_device::{DeviceServer, ServerConfig, StorageObject};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bacnet-serve", about = "Run a BACnet device server")]
struct Args {
    /// Device id to announce.
    device_id: u32,
    #[arg(long, default_value_t = 47808)]
    port: u16,
    /// Storage document to serve; started with a handful of analog
    /// values when absent.
    #[arg(long)]
    storage: Option<PathBuf>,
    #[arg(long, default_value_t = 0)]
    vendor_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ServerConfig::new(args.device_id).with_port(args.port);
    config.vendor_id = args.vendor_id;
    if let Some(path) = &args.storage {
        config = config.with_storage_file(path);
    }
    let seed_demo_objects = args.storage.is_none();

    let server = DeviceServer::bind(config).await?;
    if seed_demo_objects {
        let storage = server.storage();
        let mut storage = storage.lock().expect("storage lock");
        for instance in 0..4u32 {
            storage.add_object(StorageObject::commandable(
                ObjectType::AnalogValue,
                instance,
                TaggedValue::Real(instance as f32 * 10.0),
            ));
        }
    }
    server.open().await?;
    log::info!(
        "device {} serving on {}",
        args.device_id,
        server.local_addr()?
    );

    tokio::signal::ctrl_c().await?;
    server.close();
    Ok(())
}
