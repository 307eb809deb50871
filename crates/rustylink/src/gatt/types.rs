//! Types shared by the host interface service

use crate::att::{CCCD_INDICATE, CCCD_LEN, CCCD_NOTIFY};
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Default command buffer size, one maximum-length attribute value
pub const DEFAULT_COMMAND_CAPACITY: usize = crate::att::ATT_MAX_VALUE_LEN;

/// Attribute handles of the host interface service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHandles {
    /// Command characteristic value, written by the peer
    pub command: u16,
    /// Response characteristic value, notified or indicated to the peer
    pub response: u16,
    /// Client Characteristic Configuration of the response characteristic
    pub response_cccd: u16,
}

impl Default for ServiceHandles {
    fn default() -> Self {
        Self {
            command: 0x0012,
            response: 0x0015,
            response_cccd: 0x0016,
        }
    }
}

impl ServiceHandles {
    /// All three handles are distinct and non-zero
    pub fn is_valid(&self) -> bool {
        let handles = [self.command, self.response, self.response_cccd];
        handles.iter().all(|&h| h != 0)
            && self.command != self.response
            && self.command != self.response_cccd
            && self.response != self.response_cccd
    }
}

bitflags! {
    /// Delivery modes the peer enabled on the response characteristic
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClientConfig: u16 {
        /// Notifications enabled
        const NOTIFY = CCCD_NOTIFY;
        /// Indications enabled
        const INDICATE = CCCD_INDICATE;
    }
}

impl ClientConfig {
    /// Decode a written CCCD value
    pub fn from_cccd(value: &[u8]) -> Option<Self> {
        if value.len() != CCCD_LEN {
            return None;
        }
        Some(Self::from_bits_truncate(LittleEndian::read_u16(value)))
    }

    /// Encode as a CCCD value
    pub fn to_cccd(self) -> [u8; CCCD_LEN] {
        let mut value = [0u8; CCCD_LEN];
        LittleEndian::write_u16(&mut value, self.bits());
        value
    }
}

/// Whether a write expects an acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Write request, answered with a write or error response
    Request,
    /// Write command, never answered
    Command,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteKind::Request => write!(f, "write request"),
            WriteKind::Command => write!(f, "write command"),
        }
    }
}

/// What the service did with an inbound write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Command stored; `buffered` is false when it was empty or a command
    /// was already pending
    Command { buffered: bool },
    /// Response characteristic configuration updated
    ClientConfig(ClientConfig),
    /// Handle does not belong to this service
    NotHandled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cccd_decoding() {
        assert_eq!(ClientConfig::from_cccd(&[0x01, 0x00]), Some(ClientConfig::NOTIFY));
        assert_eq!(ClientConfig::from_cccd(&[0x02, 0x00]), Some(ClientConfig::INDICATE));
        assert_eq!(ClientConfig::from_cccd(&[0x03, 0x00]), Some(ClientConfig::all()));
        assert_eq!(ClientConfig::from_cccd(&[0x00, 0x00]), Some(ClientConfig::empty()));
        // Reserved bits are ignored
        assert_eq!(ClientConfig::from_cccd(&[0x05, 0x80]), Some(ClientConfig::NOTIFY));
        assert_eq!(ClientConfig::from_cccd(&[0x01]), None);
        assert_eq!(ClientConfig::NOTIFY.to_cccd(), [0x01, 0x00]);
    }

    #[test]
    fn test_default_handles_are_valid() {
        assert!(ServiceHandles::default().is_valid());
        let clash = ServiceHandles {
            command: 5,
            response: 5,
            response_cccd: 6,
        };
        assert!(!clash.is_valid());
    }
}
