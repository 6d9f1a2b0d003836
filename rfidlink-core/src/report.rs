//! Classification of frames arriving during continuous reading

use std::fmt;

use crate::{constants::status, frame::Frame, module::ModuleProfile};

/// What a streamed frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Module still scanning
    KeepAlive,

    /// Module is reducing TX power because of temperature
    TemperatureThrottle,

    /// Too much power reflected back; check the antenna
    HighReturnLoss,

    /// Any other status-only report
    Status(u16),

    /// Periodic temperature report
    Temperature,

    /// Report of a length with no known meaning
    Unrecognized(usize),

    /// A tag record
    TagFound,

    /// Frame from outside the tag report opcode
    Foreign(u8),
}

/// Data bytes after the status word of a temperature report
const TEMPERATURE_REPORT_LEN: usize = 10;

/// Data bytes after the status word of an unidentified report
const UNRECOGNIZED_REPORT_LEN: usize = 8;

/// Classify a frame received while streaming
///
/// # Examples
///
/// ```
/// use rfidlink_core::{report::{self, ReportKind}, Frame, ModuleFamily};
///
/// let profile = ModuleFamily::M6eNano.profile();
/// let frame = Frame::with_payload(0x22u8, vec![0x04, 0x00]);
/// assert_eq!(report::classify(&frame, profile), ReportKind::KeepAlive);
/// ```
pub fn classify(frame: &Frame, profile: &ModuleProfile) -> ReportKind {
    if frame.opcode != profile.tag_report.opcode {
        return ReportKind::Foreign(frame.opcode);
    }

    match frame.payload.len().saturating_sub(2) {
        0 => match frame.status().unwrap_or(status::SUCCESS) {
            status::KEEP_ALIVE => ReportKind::KeepAlive,
            status::TEMPERATURE_THROTTLE => ReportKind::TemperatureThrottle,
            status::HIGH_RETURN_LOSS => ReportKind::HighReturnLoss,
            other => ReportKind::Status(other),
        },
        UNRECOGNIZED_REPORT_LEN => ReportKind::Unrecognized(UNRECOGNIZED_REPORT_LEN),
        TEMPERATURE_REPORT_LEN => ReportKind::Temperature,
        _ => ReportKind::TagFound,
    }
}

impl ReportKind {
    /// Check if the report needs operator attention
    pub fn is_warning(self) -> bool {
        matches!(self, Self::TemperatureThrottle | Self::HighReturnLoss)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepAlive => f.write_str("keep-alive"),
            Self::TemperatureThrottle => f.write_str("temperature throttle"),
            Self::HighReturnLoss => f.write_str("high return loss"),
            Self::Status(code) => write!(f, "status 0x{:04X}", code),
            Self::Temperature => f.write_str("temperature report"),
            Self::Unrecognized(len) => write!(f, "unrecognized {}-byte report", len),
            Self::TagFound => f.write_str("tag found"),
            Self::Foreign(opcode) => write!(f, "foreign opcode 0x{:02X}", opcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleFamily;
    use crate::tag::tests::tag_frame;

    fn classify_payload(payload: Vec<u8>) -> ReportKind {
        classify(
            &Frame::with_payload(0x22u8, payload),
            ModuleFamily::M6eNano.profile(),
        )
    }

    #[test]
    fn test_status_only_reports() {
        assert_eq!(classify_payload(vec![0x04, 0x00]), ReportKind::KeepAlive);
        assert_eq!(classify_payload(vec![0x05, 0x04]), ReportKind::TemperatureThrottle);
        assert_eq!(classify_payload(vec![0x05, 0x05]), ReportKind::HighReturnLoss);
        assert_eq!(classify_payload(vec![0x01, 0x05]), ReportKind::Status(0x0105));
    }

    #[test]
    fn test_sized_reports() {
        assert_eq!(classify_payload(vec![0; 2 + 8]), ReportKind::Unrecognized(8));
        assert_eq!(classify_payload(vec![0; 2 + 10]), ReportKind::Temperature);
    }

    #[test]
    fn test_tag_found() {
        let frame = tag_frame(&[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(
            classify(&frame, ModuleFamily::M6eNano.profile()),
            ReportKind::TagFound
        );
    }

    #[test]
    fn test_foreign_opcode() {
        let frame = Frame::with_payload(0x2Fu8, vec![0x00, 0x00]);
        assert_eq!(
            classify(&frame, ModuleFamily::M6eNano.profile()),
            ReportKind::Foreign(0x2F)
        );
    }

    #[test]
    fn test_warnings() {
        assert!(ReportKind::HighReturnLoss.is_warning());
        assert!(!ReportKind::KeepAlive.is_warning());
    }
}
