//! High-level reader interface

use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use rfidlink_core::{
    constants::{protocols, reader_options},
    CommandRequest, Error as CoreError, Frame, ModuleFamily, ModuleProfile, Opcode, SessionState,
    StreamAssembler, TagRecord,
};
use rfidlink_transport::Transport;
use rfidlink_types::{MemoryBank, PinLevel, PinMode, PinState, Region, VersionInfo};

use crate::{
    config::ReaderConfig,
    continuous::{ContinuousReadSession, StopOutcome, StreamEvent},
    error::{Error, Result},
    transaction::Transaction,
};

/// Option byte for tag memory reads
const READ_DATA_OPTION: u8 = 0x10;

/// Bytes before the tag data in a read-data reply: status(2), option(1), flags(2)
const READ_DATA_HEADER: usize = 5;

/// ThingMagic reader module
///
/// Owns the transport, the receive buffer and the continuous-read session.
/// All synchronous commands are refused while a continuous read is active.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use rfidlink::{Reader, ReaderConfig, Region, SerialTransport};
///
/// #[tokio::main]
/// async fn main() -> rfidlink::Result<()> {
///     let transport = SerialTransport::open("/dev/ttyUSB0", 115_200)?;
///     let mut reader = Reader::open(transport, ReaderConfig::default()).await?;
///
///     reader.set_region(Region::NorthAmerica).await?;
///     reader.set_read_power(500).await?;
///
///     reader.start_reading().await?;
///     let tags = reader.next_tags(Duration::from_secs(1)).await?;
///     for tag in &tags {
///         println!("{}", tag);
///     }
///     reader.stop_reading().await?;
///
///     reader.close().await?;
///     Ok(())
/// }
/// ```
pub struct Reader<T: Transport> {
    transport: T,
    assembler: StreamAssembler,
    session: ContinuousReadSession,
    profile: &'static ModuleProfile,
    config: ReaderConfig,
}

impl<T: Transport> Reader<T> {
    /// Take over a connected transport
    ///
    /// Bytes arriving during the configured startup drain window are
    /// discarded; modules print boot chatter after power-up.
    pub async fn open(transport: T, config: ReaderConfig) -> Result<Self> {
        if !transport.is_connected() {
            return Err(Error::NotConnected);
        }

        let profile = config.module.profile();
        let mut reader = Self {
            transport,
            assembler: StreamAssembler::new(),
            session: ContinuousReadSession::new(profile, config.command_timeout, config.stop_grace),
            profile,
            config,
        };

        reader.drain_startup().await?;

        info!(
            module = profile.name,
            endpoint = %reader.transport.endpoint(),
            "Reader opened"
        );

        Ok(reader)
    }

    async fn drain_startup(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.startup_drain;
        let mut discarded = 0;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            discarded += self.transport.read_available(deadline - now).await?.len();
        }

        if discarded > 0 {
            debug!(discarded, "Discarded startup bytes");
        }
        Ok(())
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn module(&self) -> ModuleFamily {
        self.config.module
    }

    /// Get current session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_streaming()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send a command and wait for its reply
    ///
    /// # Errors
    ///
    /// Fails with `InvalidSessionState` while a continuous read is active.
    /// See [`Transaction::execute`] for the rest.
    pub async fn send_command(
        &mut self,
        opcode: impl Into<u8>,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Frame> {
        self.transact(CommandRequest::with_payload(opcode, payload), timeout)
            .await
    }

    async fn command(&mut self, opcode: Opcode, payload: impl Into<Bytes>) -> Result<Frame> {
        let timeout = self.config.command_timeout;
        self.transact(CommandRequest::with_payload(opcode, payload), timeout)
            .await
    }

    async fn transact(&mut self, request: CommandRequest, timeout: Duration) -> Result<Frame> {
        self.session.ensure_idle()?;

        let result = Transaction::new(&mut self.transport, &mut self.assembler, self.profile, request)
            .execute(timeout)
            .await;

        self.check(result)
    }

    fn check<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!(error = %e, "Fatal error, resetting session");
                self.reset();
            }
        }
        result
    }

    /// Start continuous reading
    ///
    /// Disables the read filter first so every sighting is reported.
    pub async fn start_reading(&mut self) -> Result<()> {
        self.disable_read_filter().await?;

        let result = self
            .session
            .start(&mut self.transport, &mut self.assembler)
            .await;
        self.check(result)
    }

    /// Stop continuous reading and collect the tags still in flight
    pub async fn stop_reading(&mut self) -> Result<StopOutcome> {
        let result = self
            .session
            .stop(&mut self.transport, &mut self.assembler)
            .await;
        self.check(result)
    }

    /// Tags decoded from bytes already received; never waits
    pub fn poll_tags(&mut self) -> Result<Vec<TagRecord>> {
        self.session.poll(&mut self.assembler)
    }

    /// Everything decoded from bytes already received; never waits
    pub fn poll_events(&mut self) -> Result<Vec<StreamEvent>> {
        self.session.poll_events(&mut self.assembler)
    }

    /// Read whatever the transport delivers within `max_wait`
    ///
    /// Returns the number of bytes buffered.
    pub async fn pump(&mut self, max_wait: Duration) -> Result<usize> {
        let result = self
            .transport
            .read_available(max_wait)
            .await
            .map_err(Error::from);
        let chunk = self.check(result)?;

        self.assembler.feed(&chunk);
        Ok(chunk.len())
    }

    /// Wait up to `max_wait` for at least one tag
    ///
    /// Returns an empty list if none arrived in time.
    pub async fn next_tags(&mut self, max_wait: Duration) -> Result<Vec<TagRecord>> {
        if !self.session.is_streaming() {
            return Err(CoreError::InvalidSessionState(format!(
                "next_tags needs an active continuous read, session is {}",
                self.session.state()
            ))
            .into());
        }

        let deadline = Instant::now() + max_wait;

        loop {
            let tags = self.poll_tags()?;
            if !tags.is_empty() {
                return Ok(tags);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(tags);
            }

            self.pump((deadline - now).min(self.config.read_slice)).await?;
        }
    }

    /// Return to idle and drop buffered bytes
    ///
    /// Recovers from a start or stop that was abandoned mid-way, e.g. by
    /// dropping its future.
    pub fn reset(&mut self) {
        self.session.reset();
        self.assembler.clear();
        debug!("Reader reset");
    }

    /// Stop reading if needed and close the transport
    pub async fn close(&mut self) -> Result<()> {
        if self.session.is_streaming() {
            if let Err(e) = self.stop_reading().await {
                warn!(error = %e, "Failed to stop reading before close");
            }
        }
        self.reset();

        self.transport.close().await?;
        info!("Reader closed");
        Ok(())
    }

    /// Run `f` with the reader, then close it on every exit path
    ///
    /// An error from `f` takes precedence over an error while closing.
    pub async fn run<F, R>(mut self, f: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut Self) -> Result<R>,
    {
        let result = f(&mut self).await;
        let closed = self.close().await;

        let value = result?;
        closed?;
        Ok(value)
    }

    // Module settings

    /// Get the module's version information
    pub async fn get_version(&mut self) -> Result<VersionInfo> {
        let frame = self.command(Opcode::Version, Bytes::new()).await?;
        Ok(VersionInfo::parse(&frame.data())?)
    }

    /// Change the module's baud rate
    ///
    /// No reply is awaited: the module switches immediately and answers at
    /// the new rate. Reopen the transport at `baud_rate` afterwards.
    pub async fn set_baud(&mut self, baud_rate: u32) -> Result<()> {
        self.session.ensure_idle()?;

        let request = CommandRequest::with_payload(Opcode::SetBaudRate, baud_rate.to_be_bytes().to_vec());
        let result = Transaction::new(&mut self.transport, &mut self.assembler, self.profile, request)
            .send_only()
            .await;
        self.check(result)?;

        info!(baud_rate, "Baud rate change sent");
        Ok(())
    }

    /// Set the regulatory region
    pub async fn set_region(&mut self, region: Region) -> Result<()> {
        let code = self.profile.region_code(region.code());
        if code != region.code() {
            debug!(%region, code, "Region remapped for module");
        }
        self.command(Opcode::SetRegion, vec![code]).await?;
        Ok(())
    }

    /// Set read TX power in centi-dBm (500 = 5.00 dBm)
    ///
    /// Values above the module maximum are clamped.
    pub async fn set_read_power(&mut self, cdbm: i16) -> Result<()> {
        let power = self.clamped_power(cdbm);
        self.command(Opcode::SetReadTxPower, power.to_be_bytes().to_vec())
            .await?;
        Ok(())
    }

    /// Get read TX power in centi-dBm
    pub async fn get_read_power(&mut self) -> Result<i16> {
        let frame = self.command(Opcode::GetReadTxPower, vec![0x00]).await?;
        power_from_reply(&frame)
    }

    /// Set write TX power in centi-dBm
    ///
    /// Values above the module maximum are clamped.
    pub async fn set_write_power(&mut self, cdbm: i16) -> Result<()> {
        let power = self.clamped_power(cdbm);
        self.command(Opcode::SetWriteTxPower, power.to_be_bytes().to_vec())
            .await?;
        Ok(())
    }

    /// Get write TX power in centi-dBm
    pub async fn get_write_power(&mut self) -> Result<i16> {
        let frame = self.command(Opcode::GetWriteTxPower, vec![0x00]).await?;
        power_from_reply(&frame)
    }

    fn clamped_power(&self, cdbm: i16) -> i16 {
        let power = self.profile.clamp_tx_power(cdbm);
        if power != cdbm {
            warn!(requested = cdbm, applied = power, "TX power clamped");
        }
        power
    }

    /// Select the air protocol
    pub async fn set_tag_protocol(&mut self, protocol: u8) -> Result<()> {
        self.command(Opcode::SetTagProtocol, vec![0x00, protocol])
            .await?;
        Ok(())
    }

    /// Select Gen2, the protocol every supported module speaks
    pub async fn set_gen2_protocol(&mut self) -> Result<()> {
        self.set_tag_protocol(protocols::GEN2).await
    }

    /// Transmit and receive on antenna port 1
    pub async fn set_antenna_port(&mut self) -> Result<()> {
        self.command(Opcode::SetAntennaPort, vec![0x01, 0x01])
            .await?;
        Ok(())
    }

    /// Search only antenna port 1
    pub async fn set_antenna_search_list(&mut self) -> Result<()> {
        self.command(Opcode::SetAntennaPort, vec![0x02, 0x01, 0x01])
            .await?;
        Ok(())
    }

    /// Set one reader option
    pub async fn set_reader_configuration(&mut self, option: u8, value: u8) -> Result<()> {
        self.command(Opcode::SetReaderOptionalParams, vec![0x01, option, value])
            .await?;
        Ok(())
    }

    /// Report each tag once per search
    pub async fn enable_read_filter(&mut self) -> Result<()> {
        self.set_reader_configuration(reader_options::READ_FILTER, 0x01)
            .await
    }

    /// Report every sighting of every tag
    pub async fn disable_read_filter(&mut self) -> Result<()> {
        self.set_reader_configuration(reader_options::READ_FILTER, 0x00)
            .await
    }

    // GPIO

    /// Configure a user GPIO pin
    pub async fn pin_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        self.command(Opcode::SetUserGpioOutputs, vec![0x01, pin, mode as u8, 0x00])
            .await?;
        Ok(())
    }

    /// Drive an output pin
    pub async fn digital_write(&mut self, pin: u8, level: PinLevel) -> Result<()> {
        self.command(Opcode::SetUserGpioOutputs, vec![pin, u8::from(level)])
            .await?;
        Ok(())
    }

    /// Read the state of every user GPIO pin
    pub async fn read_gpio(&mut self) -> Result<Vec<PinState>> {
        let frame = self.command(Opcode::GetUserGpioInputs, vec![0x01]).await?;
        let data = frame.data();

        // First byte echoes the request option; then (pin, direction, level)
        let pins = data.get(1..).unwrap_or_default();
        Ok(pins
            .chunks_exact(3)
            .map(|entry| PinState {
                pin: entry[0],
                mode: PinMode::from(entry[1]),
                level: PinLevel::from(entry[2] != 0),
            })
            .collect())
    }

    /// Read the level of one pin
    ///
    /// # Errors
    ///
    /// `InvalidResponse` if the module does not report the pin.
    pub async fn digital_read(&mut self, pin: u8) -> Result<PinLevel> {
        self.read_gpio()
            .await?
            .into_iter()
            .find(|state| state.pin == pin)
            .map(|state| state.level)
            .ok_or_else(|| Error::InvalidResponse(format!("GPIO{} missing from reply", pin)))
    }

    // Tag memory

    /// Read a memory bank of the first tag found, starting at word `address`
    ///
    /// `timeout` is the tag operation time given to the module; the reply
    /// is awaited for that long plus the command timeout.
    pub async fn read_data(
        &mut self,
        bank: MemoryBank,
        address: u32,
        timeout: Duration,
    ) -> Result<Bytes> {
        let op_ms = op_timeout_ms(timeout)?;

        let mut payload = BytesMut::with_capacity(11);
        payload.put_u16(op_ms);
        payload.put_u8(READ_DATA_OPTION);
        payload.put_u16(0x0000); // no metadata
        payload.put_u8(bank.code());
        payload.put_u32(address);
        payload.put_u8(0x00); // whole bank

        let frame = self
            .transact(
                CommandRequest::with_payload(Opcode::ReadTagData, payload.freeze()),
                timeout + self.config.command_timeout,
            )
            .await?;

        if frame.payload.len() < READ_DATA_HEADER {
            return Err(Error::InvalidResponse(format!(
                "read data reply too short ({} bytes)",
                frame.payload.len()
            )));
        }

        let data = frame.payload.slice(READ_DATA_HEADER..);
        debug!(%bank, address, len = data.len(), "Tag memory read");
        Ok(data)
    }

    /// Write to a memory bank of the first tag found
    pub async fn write_data(
        &mut self,
        bank: MemoryBank,
        address: u32,
        data: &[u8],
        timeout: Duration,
    ) -> Result<()> {
        let op_ms = op_timeout_ms(timeout)?;

        let mut payload = BytesMut::with_capacity(8 + data.len());
        payload.put_u16(op_ms);
        payload.put_u8(0x00);
        payload.put_u32(address);
        payload.put_u8(bank.code());
        payload.put_slice(data);

        self.transact(
            CommandRequest::with_payload(Opcode::WriteTagData, payload.freeze()),
            timeout + self.config.command_timeout,
        )
        .await?;

        debug!(%bank, address, len = data.len(), "Tag memory written");
        Ok(())
    }

    /// Permanently disable the first tag found
    ///
    /// Irreversible.
    pub async fn kill_tag(&mut self, password: [u8; 4], timeout: Duration) -> Result<()> {
        let op_ms = op_timeout_ms(timeout)?;

        let mut payload = BytesMut::with_capacity(8);
        payload.put_u16(op_ms);
        payload.put_u8(0x00);
        payload.put_slice(&password);
        payload.put_u8(0x00); // RFU

        self.transact(
            CommandRequest::with_payload(Opcode::KillTag, payload.freeze()),
            timeout + self.config.command_timeout,
        )
        .await?;

        warn!("Tag killed");
        Ok(())
    }

    pub async fn read_tag_epc(&mut self, timeout: Duration) -> Result<Bytes> {
        self.read_data(MemoryBank::Epc, 0x02, timeout).await
    }

    /// Replace the EPC of the first tag found
    pub async fn write_tag_epc(&mut self, epc: &[u8], timeout: Duration) -> Result<()> {
        if epc.len() % 2 != 0 {
            return Err(Error::InvalidArgument(format!(
                "EPC must be a whole number of 16-bit words, got {} bytes",
                epc.len()
            )));
        }
        self.write_data(MemoryBank::Epc, 0x02, epc, timeout).await
    }

    pub async fn read_user_data(&mut self, timeout: Duration) -> Result<Bytes> {
        self.read_data(MemoryBank::User, 0x00, timeout).await
    }

    pub async fn write_user_data(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        self.write_data(MemoryBank::User, 0x00, data, timeout).await
    }

    pub async fn read_tid(&mut self, timeout: Duration) -> Result<Bytes> {
        self.read_data(MemoryBank::Tid, 0x02, timeout).await
    }

    pub async fn read_kill_password(&mut self, timeout: Duration) -> Result<Bytes> {
        self.read_data(MemoryBank::Reserved, 0x00, timeout).await
    }

    pub async fn write_kill_password(&mut self, password: [u8; 4], timeout: Duration) -> Result<()> {
        self.write_data(MemoryBank::Reserved, 0x00, &password, timeout)
            .await
    }

    pub async fn read_access_password(&mut self, timeout: Duration) -> Result<Bytes> {
        self.read_data(MemoryBank::Reserved, 0x02, timeout).await
    }

    pub async fn write_access_password(&mut self, password: [u8; 4], timeout: Duration) -> Result<()> {
        self.write_data(MemoryBank::Reserved, 0x02, &password, timeout)
            .await
    }
}

fn op_timeout_ms(timeout: Duration) -> Result<u16> {
    u16::try_from(timeout.as_millis()).map_err(|_| {
        Error::InvalidArgument(format!(
            "tag operation timeout {}ms exceeds {}ms",
            timeout.as_millis(),
            u16::MAX
        ))
    })
}

/// Power replies echo the request option byte, then a BE i16
fn power_from_reply(frame: &Frame) -> Result<i16> {
    let data = frame.data();
    if data.len() < 3 {
        return Err(Error::InvalidResponse(format!(
            "power reply too short ({} bytes)",
            data.len()
        )));
    }
    Ok(BigEndian::read_i16(&data[1..3]))
}
