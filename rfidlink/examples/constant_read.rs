//! Constant read example
//!
//! Streams tags until Ctrl+C. Set `RFID_PORT` to the serial device and
//! `RFID_MODULE=hecto` for an M7E Hecto.

use std::time::Duration;

use anyhow::Context;
use rfidlink::{ModuleFamily, Reader, ReaderConfig, Region, SerialTransport, StreamEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rfidlink=info".into()),
        )
        .init();

    let port = std::env::var("RFID_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
    let module = match std::env::var("RFID_MODULE").as_deref() {
        Ok("hecto") => ModuleFamily::M7eHecto,
        _ => ModuleFamily::M6eNano,
    };

    let transport = SerialTransport::open(&port, 115_200)
        .with_context(|| format!("opening {}", port))?;
    let mut reader = Reader::open(transport, ReaderConfig::new(module)).await?;

    reader.set_region(Region::NorthAmerica).await?;
    reader.set_read_power(500).await?; // 5.00 dBm
    reader.set_gen2_protocol().await?;
    reader.set_antenna_port().await?;

    let version = reader.get_version().await?;
    println!("{} ready: {}", module, version);
    println!("Press Ctrl+C to stop scanning");

    reader.start_reading().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            pumped = reader.pump(Duration::from_millis(50)) => {
                pumped?;
                for event in reader.poll_events()? {
                    match event {
                        StreamEvent::Tag(tag) => {
                            println!("Tag found");
                            println!("  RSSI: {} dBm", tag.rssi);
                            println!("  Freq: {} kHz", tag.frequency_khz);
                            println!("  Time: {} ms", tag.timestamp);
                            println!("  EPC:  {}", tag.epc_hex());
                        }
                        StreamEvent::Notice(kind) if kind.is_warning() => {
                            println!("Warning: {}", kind);
                        }
                        StreamEvent::Notice(_) => {}
                        StreamEvent::Malformed(e) => println!("Bad report: {}", e),
                    }
                }
            }
        }
    }

    println!("Stopping...");
    let outcome = reader.stop_reading().await?;
    if !outcome.acknowledged {
        println!("Module did not confirm the stop");
    }

    reader.close().await?;
    println!("Connection closed.");

    Ok(())
}
