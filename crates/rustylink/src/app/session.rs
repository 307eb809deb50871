//! Session context
//!
//! Everything the peripheral remembers between events: the active link, the
//! negotiated MTU, key material and the security context. There is one
//! peripheral and at most one peer, so there is at most one open link.

use crate::att::MtuTracker;
use crate::error::{LinkError, LinkResult};
use crate::gap::ConnHandle;
use crate::smp::{KeyBundle, SecurityConfig, SecurityContext};
use crate::transport::{ConnectionInfo, DeviceAddresses};
use log::warn;

/// State carried across events for the single link
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Active link, set on connect and cleared on disconnect
    conn: Option<ConnHandle>,
    /// Parameters the link was established with
    peer: Option<ConnectionInfo>,
    /// Negotiated MTU of the active link
    mtu: MtuTracker,
    /// Keys handed to first-time peers
    keys: Option<KeyBundle>,
    /// Addresses read back from the controller
    addresses: Option<DeviceAddresses>,
    /// Local security requirements and last authentication error
    security: SecurityContext,
    /// Bonding data waits to be persisted
    pending_persist: bool,
}

impl SessionContext {
    pub fn new(max_mtu: u16, security: SecurityConfig) -> Self {
        Self {
            conn: None,
            peer: None,
            mtu: MtuTracker::new(max_mtu),
            keys: None,
            addresses: None,
            security: SecurityContext::new(security),
            pending_persist: false,
        }
    }

    /// Active link, if any
    pub fn connection(&self) -> Option<ConnHandle> {
        self.conn
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Parameters of the active link
    pub fn peer(&self) -> Option<&ConnectionInfo> {
        self.peer.as_ref()
    }

    /// Record a newly established link.
    ///
    /// Fails while another link is still open.
    pub fn open(&mut self, info: ConnectionInfo) -> LinkResult<ConnHandle> {
        if let Some(current) = self.conn {
            warn!(
                "Link {} still open, refusing new link bdHandle={:#04x}",
                current, info.bd_handle
            );
            return Err(LinkError::InvalidState);
        }
        let conn = ConnHandle::new(info.bd_handle, 0);
        self.conn = Some(conn);
        self.peer = Some(info);
        self.mtu.reset();
        Ok(conn)
    }

    /// Attach the attribute-layer id once GATT connects
    pub fn bind(&mut self, conn: ConnHandle) {
        match self.conn {
            Some(current) if current.bd_handle != conn.bd_handle => {
                warn!("GATT connected on {} while link is {}", conn, current);
            }
            _ => self.conn = Some(conn),
        }
    }

    /// Forget the link. The MTU drops back to the default.
    pub fn close(&mut self, bd_handle: u8) {
        match self.conn {
            Some(current) if current.bd_handle != bd_handle => {
                warn!(
                    "Disconnect for bdHandle={:#04x} while link is {}",
                    bd_handle, current
                );
            }
            _ => {
                self.conn = None;
                self.peer = None;
            }
        }
        self.mtu.reset();
    }

    pub fn mtu(&self) -> &MtuTracker {
        &self.mtu
    }

    pub fn mtu_mut(&mut self) -> &mut MtuTracker {
        &mut self.mtu
    }

    pub fn keys(&self) -> Option<&KeyBundle> {
        self.keys.as_ref()
    }

    pub fn set_keys(&mut self, keys: KeyBundle) {
        self.keys = Some(keys);
    }

    pub fn addresses(&self) -> Option<&DeviceAddresses> {
        self.addresses.as_ref()
    }

    pub fn set_addresses(&mut self, addresses: DeviceAddresses) {
        self.addresses = Some(addresses);
    }

    pub fn security(&self) -> &SecurityContext {
        &self.security
    }

    pub fn security_mut(&mut self) -> &mut SecurityContext {
        &mut self.security
    }

    /// Whether bonding data waits to be persisted
    pub fn persist_pending(&self) -> bool {
        self.pending_persist
    }

    pub fn set_persist_pending(&mut self, pending: bool) {
        self.pending_persist = pending;
    }
}
