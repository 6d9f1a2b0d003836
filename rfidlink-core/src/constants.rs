//! Protocol constants

use std::time::Duration;

/// Start-of-frame marker
pub const START_MARKER: u8 = 0xFF;

/// Maximum payload length (LEN is one byte)
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Marker, length, opcode and two CRC bytes
pub const FRAME_OVERHEAD: usize = 5;

/// Largest frame the module can send
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD;

/// Bytes that may be discarded without a valid frame before the stream is
/// declared desynchronized
pub const DESYNC_LIMIT: usize = 2 * MAX_FRAME_LEN;

/// Default command timeout
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default time to wait for the stop acknowledgement
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(2000);

/// Default upper bound for a single transport read
pub const DEFAULT_READ_SLICE: Duration = Duration::from_millis(50);

/// Default time spent discarding startup chatter after opening a port
pub const DEFAULT_STARTUP_DRAIN: Duration = Duration::from_millis(100);

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Maximum read/write TX power in centi-dBm (27.00 dBm)
pub const MAX_TX_POWER_CDBM: i16 = 2700;

/// Status words carried by the module
pub mod status {
    /// Command completed
    pub const SUCCESS: u16 = 0x0000;

    /// Continuous read still running
    pub const KEEP_ALIVE: u16 = 0x0400;

    /// Module throttling TX power on temperature
    pub const TEMPERATURE_THROTTLE: u16 = 0x0504;

    /// Antenna reflects too much power
    pub const HIGH_RETURN_LOSS: u16 = 0x0505;
}

/// Tag protocol identifiers
pub mod protocols {
    /// EPC Gen2 (ISO 18000-6C)
    pub const GEN2: u8 = 0x05;
}

/// Reader configuration keys (SET_READER_OPTIONAL_PARAMS)
pub mod reader_options {
    /// Unique-tag read filter
    pub const READ_FILTER: u8 = 0x0C;
}

/// Continuous read sub-commands (MULTI_PROTOCOL_TAG_OP)
pub mod continuous {
    /// Start continuous reading: timeout, sub-command, embedded READ_TAG_ID_MULTIPLE
    /// with metadata and search flags
    pub const START_PAYLOAD: [u8; 16] = [
        0x00, 0x00, 0x01, 0x22, 0x00, 0x00, 0x05, 0x07,
        0x22, 0x10, 0x00, 0x1B, 0x03, 0xE8, 0x01, 0xFF,
    ];

    /// Stop continuous reading
    pub const STOP_PAYLOAD: [u8; 3] = [0x00, 0x00, 0x02];
}
