//! GPIO pin types

use std::fmt;

/// Direction of a user GPIO pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PinMode {
    #[default]
    Input = 0,
    Output = 1,
}

impl From<u8> for PinMode {
    fn from(value: u8) -> Self {
        if value == 0 { Self::Input } else { Self::Output }
    }
}

/// Logic level of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    pub fn is_high(self) -> bool {
        self == Self::High
    }
}

impl From<bool> for PinLevel {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl From<PinLevel> for u8 {
    fn from(level: PinLevel) -> Self {
        match level {
            PinLevel::Low => 0,
            PinLevel::High => 1,
        }
    }
}

/// One pin as reported by the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    pub pin: u8,
    pub mode: PinMode,
    pub level: PinLevel,
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{} {:?} {:?}", self.pin, self.mode, self.level)
    }
}
