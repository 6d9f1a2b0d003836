//! Module families and their protocol profiles
//!
//! Differences between the supported modules are data, not code: each
//! [`ModuleFamily`] maps to one static [`ModuleProfile`] that is selected
//! when a reader is constructed.

use std::fmt;

use crate::{
    command::{CommandRequest, Opcode},
    constants::{continuous, status, MAX_TX_POWER_CDBM},
    frame::Frame,
};

/// Supported reader modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModuleFamily {
    /// ThingMagic M6E Nano
    #[default]
    M6eNano,

    /// ThingMagic M7E Hecto
    M7eHecto,
}

impl ModuleFamily {
    /// Protocol profile for this module
    pub fn profile(self) -> &'static ModuleProfile {
        match self {
            Self::M6eNano => &M6E_NANO,
            Self::M7eHecto => &M7E_HECTO,
        }
    }
}

impl fmt::Display for ModuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

/// Byte positions inside a streamed tag report payload
///
/// Offsets are relative to the start of the payload, i.e. the status word
/// is at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagReportLayout {
    /// Opcode of streamed tag reports
    pub opcode: u8,

    /// Position of the big-endian metadata flag word
    pub flags_offset: usize,

    /// Position of the first metadata field
    pub metadata_offset: usize,
}

/// Per-module protocol parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProfile {
    /// Human-readable module name
    pub name: &'static str,

    /// Tag report layout
    pub tag_report: TagReportLayout,

    /// Opcode of keep-alive frames
    pub keep_alive_opcode: u8,

    /// Opcode used for start and stop of continuous reading
    pub continuous_opcode: u8,

    /// Payload that starts continuous reading
    pub start_payload: &'static [u8],

    /// Payload that stops continuous reading
    pub stop_payload: &'static [u8],

    /// Region codes the module expects under a different value
    pub region_aliases: &'static [(u8, u8)],

    /// Highest accepted TX power, centi-dBm
    pub max_tx_power_cdbm: i16,
}

const THINGMAGIC_TAG_REPORT: TagReportLayout = TagReportLayout {
    opcode: Opcode::ReadTagIdMultiple as u8,
    flags_offset: 5,
    metadata_offset: 8,
};

static M6E_NANO: ModuleProfile = ModuleProfile {
    name: "M6E Nano",
    tag_report: THINGMAGIC_TAG_REPORT,
    keep_alive_opcode: Opcode::ReadTagIdMultiple as u8,
    continuous_opcode: Opcode::MultiProtocolTagOp as u8,
    start_payload: &continuous::START_PAYLOAD,
    stop_payload: &continuous::STOP_PAYLOAD,
    // North America (0x01) is only accepted as North America 2 (0x0D)
    region_aliases: &[(0x01, 0x0D)],
    max_tx_power_cdbm: MAX_TX_POWER_CDBM,
};

static M7E_HECTO: ModuleProfile = ModuleProfile {
    name: "M7E Hecto",
    tag_report: THINGMAGIC_TAG_REPORT,
    keep_alive_opcode: Opcode::ReadTagIdMultiple as u8,
    continuous_opcode: Opcode::MultiProtocolTagOp as u8,
    start_payload: &continuous::START_PAYLOAD,
    stop_payload: &continuous::STOP_PAYLOAD,
    region_aliases: &[],
    max_tx_power_cdbm: MAX_TX_POWER_CDBM,
};

impl ModuleProfile {
    /// Check if a frame is a keep-alive
    ///
    /// Keep-alives carry nothing but the `0x0400` status word.
    pub fn is_keep_alive(&self, frame: &Frame) -> bool {
        frame.opcode == self.keep_alive_opcode
            && frame.payload.len() == 2
            && frame.status() == Some(status::KEEP_ALIVE)
    }

    /// Request that starts continuous reading
    pub fn start_request(&self) -> CommandRequest {
        CommandRequest::with_payload(self.continuous_opcode, self.start_payload)
    }

    /// Request that stops continuous reading
    pub fn stop_request(&self) -> CommandRequest {
        CommandRequest::with_payload(self.continuous_opcode, self.stop_payload)
    }

    /// Region code to send for a requested region
    pub fn region_code(&self, region: u8) -> u8 {
        self.region_aliases
            .iter()
            .find(|(from, _)| *from == region)
            .map(|(_, to)| *to)
            .unwrap_or(region)
    }

    /// Clamp a TX power to what the module accepts
    pub fn clamp_tx_power(&self, cdbm: i16) -> i16 {
        cdbm.min(self.max_tx_power_cdbm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_lookup() {
        assert_eq!(ModuleFamily::M6eNano.profile().name, "M6E Nano");
        assert_eq!(ModuleFamily::M7eHecto.to_string(), "M7E Hecto");
        assert_eq!(ModuleFamily::default(), ModuleFamily::M6eNano);
    }

    #[test]
    fn test_region_aliases() {
        assert_eq!(ModuleFamily::M6eNano.profile().region_code(0x01), 0x0D);
        assert_eq!(ModuleFamily::M6eNano.profile().region_code(0x08), 0x08);
        assert_eq!(ModuleFamily::M7eHecto.profile().region_code(0x01), 0x01);
    }

    #[test]
    fn test_keep_alive_detection() {
        let profile = ModuleFamily::M6eNano.profile();

        assert!(profile.is_keep_alive(&Frame::with_payload(0x22u8, vec![0x04, 0x00])));
        assert!(!profile.is_keep_alive(&Frame::with_payload(0x22u8, vec![0x00, 0x00])));
        assert!(!profile.is_keep_alive(&Frame::with_payload(0x22u8, vec![0x04, 0x00, 0x01])));
        assert!(!profile.is_keep_alive(&Frame::with_payload(0x2Fu8, vec![0x04, 0x00])));
    }

    #[test]
    fn test_start_stop_requests() {
        let profile = ModuleFamily::M7eHecto.profile();

        let start = profile.start_request();
        assert_eq!(start.opcode, 0x2F);
        assert_eq!(start.payload.len(), 16);

        let stop = profile.stop_request();
        assert_eq!(stop.payload.as_ref(), &[0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_clamp_tx_power() {
        let profile = ModuleFamily::M6eNano.profile();
        assert_eq!(profile.clamp_tx_power(3000), 2700);
        assert_eq!(profile.clamp_tx_power(500), 500);
    }
}
