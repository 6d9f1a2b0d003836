//! TCP transport
//!
//! Reaches a module whose serial port is exported by a network bridge
//! (ser2net, a serial device server, or a carrier board running one). The
//! bridge forwards bytes unchanged, so framing is identical to a local port.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{error::*, Transport};

/// Serial-over-TCP transport
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport for `addr:port`; call [`connect`](Self::connect) before use
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            stream: None,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Open the TCP connection to the bridge
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            debug!(endpoint = %self.endpoint(), "Already connected");
            return Ok(());
        }

        let addr = self.resolve_addr().await?;

        debug!(%addr, "Connecting to serial bridge");

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)??;

        // Frames are small; don't let Nagle hold them back
        stream.set_nodelay(true)?;

        info!(%addr, "Connected to serial bridge");

        self.stream = Some(stream);
        Ok(())
    }

    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.addr, self.port);

        let addr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;

        self.socket_addr = Some(addr);
        Ok(addr)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!(len = data.len(), data = %hex::encode_upper(data), "Sending");

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn read_available(&mut self, max_wait: Duration) -> Result<Bytes> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::with_capacity(1024);

        let n = match timeout(max_wait, stream.read_buf(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => return Ok(Bytes::new()),
        };

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        trace!(len = n, data = %hex::encode_upper(&buf), "Received");

        Ok(buf.freeze())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!(endpoint = %self.endpoint(), "Disconnecting from serial bridge");

            if let Err(e) = stream.shutdown().await {
                warn!(error = %e, "TCP shutdown failed");
            }
        }

        self.socket_addr = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("TCP transport dropped while still connected");
        }
    }
}
