//! Key material handed between the transport and the peripheral
//!
//! The transport generates the local identity and signing keys once the
//! device address is known. The peripheral keeps the resulting bundle and
//! hands it back to the transport for every first-time peer so pairing can
//! complete.

use super::constants::*;
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Which keys are distributed during pairing
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyDistribution: u8 {
        /// Initiator distributes its LTK
        const INIT_ENC_KEY = SMP_KEY_DIST_ENC_KEY;
        /// Initiator distributes its IRK
        const INIT_ID_KEY = SMP_KEY_DIST_ID_KEY;
        /// Initiator distributes its CSRK
        const INIT_SIGN_KEY = SMP_KEY_DIST_SIGN_KEY;
        /// Initiator derives a link key
        const INIT_LINK_KEY = SMP_KEY_DIST_LINK_KEY;
        /// Responder distributes its LTK
        const RESP_ENC_KEY = SMP_KEY_DIST_ENC_KEY << 4;
        /// Responder distributes its IRK
        const RESP_ID_KEY = SMP_KEY_DIST_ID_KEY << 4;
        /// Responder distributes its CSRK
        const RESP_SIGN_KEY = SMP_KEY_DIST_SIGN_KEY << 4;
        /// Responder derives a link key
        const RESP_LINK_KEY = SMP_KEY_DIST_LINK_KEY << 4;
    }
}

impl KeyDistribution {
    /// Keys this device distributes
    pub fn local_default() -> Self {
        Self::INIT_ENC_KEY | Self::INIT_ID_KEY | Self::INIT_SIGN_KEY
    }

    /// Keys exchanged in both directions
    pub fn exchange_default() -> Self {
        Self::local_default() | Self::RESP_ENC_KEY | Self::RESP_ID_KEY | Self::RESP_SIGN_KEY
    }
}

/// Keys generated by the transport
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecurityKeys {
    /// Identity Resolving Key
    pub irk: [u8; SMP_KEY_SIZE],
    /// Identity address information (type + address)
    pub id_addr_info: [u8; SMP_ID_ADDR_INFO_SIZE],
    /// Connection Signature Resolving Key
    pub csrk: [u8; SMP_KEY_SIZE],
}

// Key values never reach the log.
impl fmt::Debug for SecurityKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityKeys")
            .field("id_addr_info", &hex::encode(self.id_addr_info))
            .finish_non_exhaustive()
    }
}

/// Generated keys plus the distribution flags they were generated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBundle {
    /// Keys distributed by this device
    pub local: KeyDistribution,
    /// Keys exchanged with the peer
    pub exchange: KeyDistribution,
    /// Key values
    pub keys: SecurityKeys,
}

impl KeyBundle {
    pub fn new(local: KeyDistribution, exchange: KeyDistribution, keys: SecurityKeys) -> Self {
        Self {
            local,
            exchange,
            keys,
        }
    }
}
