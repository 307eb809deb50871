//! Negotiated MTU tracking for the single active connection

use super::constants::{ATT_DEFAULT_MTU, ATT_MAX_MTU, ATT_VALUE_HEADER_LEN};
use log::debug;

/// Tracks the ATT MTU negotiated on the current connection.
///
/// The value starts at [`ATT_DEFAULT_MTU`], is set at most once per
/// connection when the peer requests an exchange, and goes back to the
/// default when the link drops. `ATT_DEFAULT_MTU <= current() <= max()`
/// holds at all times.
#[derive(Debug, Clone)]
pub struct MtuTracker {
    current: u16,
    max: u16,
    exchanged: bool,
}

impl MtuTracker {
    /// Create a tracker for an implementation supporting at most `max_mtu`.
    pub fn new(max_mtu: u16) -> Self {
        Self {
            current: ATT_DEFAULT_MTU,
            max: max_mtu.clamp(ATT_DEFAULT_MTU, ATT_MAX_MTU),
            exchanged: false,
        }
    }

    /// Record the peer's exchange request and return the negotiated value.
    ///
    /// Only the first request of a connection is honoured; later ones leave
    /// the stored value untouched.
    pub fn on_exchange_requested(&mut self, peer_mtu: u16) -> u16 {
        if self.exchanged {
            debug!(
                "Ignoring MTU renegotiation to {} (kept {})",
                peer_mtu, self.current
            );
            return self.current;
        }

        self.current = peer_mtu.clamp(ATT_DEFAULT_MTU, self.max);
        self.exchanged = true;
        self.current
    }

    /// Drop back to the protocol default. Called exactly on disconnect.
    pub fn reset(&mut self) {
        self.current = ATT_DEFAULT_MTU;
        self.exchanged = false;
    }

    pub fn current(&self) -> u16 {
        self.current
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    pub fn is_exchanged(&self) -> bool {
        self.exchanged
    }

    /// Largest value that fits in one notification or indication.
    pub fn max_payload(&self) -> usize {
        self.current as usize - ATT_VALUE_HEADER_LEN
    }
}

impl Default for MtuTracker {
    fn default() -> Self {
        Self::new(ATT_MAX_MTU)
    }
}
