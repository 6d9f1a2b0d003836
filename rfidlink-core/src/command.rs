//! ThingMagic serial protocol opcodes and command requests

use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Protocol opcodes
///
/// Opcodes used by the M6E Nano / M7E Hecto serial reader protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // Module information
    Version = 0x03,
    SetBaudRate = 0x06,

    // Tag operations
    ReadTagIdSingle = 0x21,
    ReadTagIdMultiple = 0x22,
    WriteTagId = 0x23,
    WriteTagData = 0x24,
    KillTag = 0x26,
    ReadTagData = 0x28,
    ClearTagIdBuffer = 0x2A,
    MultiProtocolTagOp = 0x2F,

    // Getters
    GetReadTxPower = 0x62,
    GetWriteTxPower = 0x64,
    GetUserGpioInputs = 0x66,
    GetPowerMode = 0x68,
    GetReaderOptionalParams = 0x6A,
    GetProtocolParam = 0x6B,

    // Setters
    SetAntennaPort = 0x91,
    SetReadTxPower = 0x92,
    SetTagProtocol = 0x93,
    SetWriteTxPower = 0x94,
    SetUserGpioOutputs = 0x96,
    SetRegion = 0x97,
    SetReaderOptionalParams = 0x9A,
    SetProtocolParam = 0x9B,
}

impl Opcode {
    /// Get opcode name
    pub fn name(self) -> &'static str {
        match self {
            Self::Version => "VERSION",
            Self::SetBaudRate => "SET_BAUD_RATE",
            Self::ReadTagIdSingle => "READ_TAG_ID_SINGLE",
            Self::ReadTagIdMultiple => "READ_TAG_ID_MULTIPLE",
            Self::WriteTagId => "WRITE_TAG_ID",
            Self::WriteTagData => "WRITE_TAG_DATA",
            Self::KillTag => "KILL_TAG",
            Self::ReadTagData => "READ_TAG_DATA",
            Self::ClearTagIdBuffer => "CLEAR_TAG_ID_BUFFER",
            Self::MultiProtocolTagOp => "MULTI_PROTOCOL_TAG_OP",
            Self::GetReadTxPower => "GET_READ_TX_POWER",
            Self::GetWriteTxPower => "GET_WRITE_TX_POWER",
            Self::GetUserGpioInputs => "GET_USER_GPIO_INPUTS",
            Self::GetPowerMode => "GET_POWER_MODE",
            Self::GetReaderOptionalParams => "GET_READER_OPTIONAL_PARAMS",
            Self::GetProtocolParam => "GET_PROTOCOL_PARAM",
            Self::SetAntennaPort => "SET_ANTENNA_PORT",
            Self::SetReadTxPower => "SET_READ_TX_POWER",
            Self::SetTagProtocol => "SET_TAG_PROTOCOL",
            Self::SetWriteTxPower => "SET_WRITE_TX_POWER",
            Self::SetUserGpioOutputs => "SET_USER_GPIO_OUTPUTS",
            Self::SetRegion => "SET_REGION",
            Self::SetReaderOptionalParams => "SET_READER_OPTIONAL_PARAMS",
            Self::SetProtocolParam => "SET_PROTOCOL_PARAM",
        }
    }

    /// Get a printable name for a raw opcode
    pub fn describe(raw: u8) -> &'static str {
        Self::try_from(raw).map(Self::name).unwrap_or("UNKNOWN")
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> u8 {
        opcode as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x03 => Ok(Self::Version),
            0x06 => Ok(Self::SetBaudRate),
            0x21 => Ok(Self::ReadTagIdSingle),
            0x22 => Ok(Self::ReadTagIdMultiple),
            0x23 => Ok(Self::WriteTagId),
            0x24 => Ok(Self::WriteTagData),
            0x26 => Ok(Self::KillTag),
            0x28 => Ok(Self::ReadTagData),
            0x2A => Ok(Self::ClearTagIdBuffer),
            0x2F => Ok(Self::MultiProtocolTagOp),
            0x62 => Ok(Self::GetReadTxPower),
            0x64 => Ok(Self::GetWriteTxPower),
            0x66 => Ok(Self::GetUserGpioInputs),
            0x68 => Ok(Self::GetPowerMode),
            0x6A => Ok(Self::GetReaderOptionalParams),
            0x6B => Ok(Self::GetProtocolParam),
            0x91 => Ok(Self::SetAntennaPort),
            0x92 => Ok(Self::SetReadTxPower),
            0x93 => Ok(Self::SetTagProtocol),
            0x94 => Ok(Self::SetWriteTxPower),
            0x96 => Ok(Self::SetUserGpioOutputs),
            0x97 => Ok(Self::SetRegion),
            0x9A => Ok(Self::SetReaderOptionalParams),
            0x9B => Ok(Self::SetProtocolParam),
            _ => Err(Error::UnknownOpcode(value)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// A command to send to the module
///
/// Owned by exactly one transaction for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Raw opcode byte
    pub opcode: u8,

    /// Command payload
    pub payload: Bytes,
}

impl CommandRequest {
    /// Create a request with empty payload
    pub fn new(opcode: impl Into<u8>) -> Self {
        Self {
            opcode: opcode.into(),
            payload: Bytes::new(),
        }
    }

    /// Create a request with payload
    ///
    /// # Examples
    ///
    /// ```
    /// use rfidlink_core::{CommandRequest, Opcode};
    ///
    /// let request = CommandRequest::with_payload(Opcode::SetRegion, vec![0x0D]);
    /// assert_eq!(request.opcode, 0x97);
    /// assert_eq!(request.payload.len(), 1);
    /// ```
    pub fn with_payload(opcode: impl Into<u8>, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: opcode.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(0x{:02X}, len={})",
            Opcode::describe(self.opcode),
            self.opcode,
            self.payload.len()
        )
    }
}
