//! Tag memory example
//!
//! Reads the EPC and user memory of the tag nearest the antenna, then
//! optionally writes a new EPC given as hex in `NEW_EPC`.

use std::time::Duration;

use rfidlink::{Reader, ReaderConfig, Region, SerialTransport};

const TAG_OP_TIMEOUT: Duration = Duration::from_millis(1000);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let port = std::env::var("RFID_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    let transport = SerialTransport::open(&port, 115_200)?;
    let reader = Reader::open(transport, ReaderConfig::default()).await?;

    reader
        .run(async |reader| {
            reader.set_region(Region::NorthAmerica).await?;
            reader.set_read_power(500).await?;
            reader.set_gen2_protocol().await?;
            reader.set_antenna_port().await?;

            let epc = reader.read_tag_epc(TAG_OP_TIMEOUT).await?;
            println!("EPC:       {}", hex::encode_upper(&epc));

            match reader.read_user_data(TAG_OP_TIMEOUT).await {
                Ok(data) => println!("User data: {}", hex::encode_upper(&data)),
                Err(e) => println!("No user memory: {}", e),
            }

            if let Ok(new_epc) = std::env::var("NEW_EPC") {
                let bytes = hex::decode(&new_epc)
                    .map_err(|e| rfidlink::Error::InvalidArgument(format!("{}: {}", new_epc, e)))?;
                reader.write_tag_epc(&bytes, TAG_OP_TIMEOUT).await?;
                println!("EPC written");
            }

            Ok(())
        })
        .await?;

    Ok(())
}

