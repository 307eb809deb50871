//! In-memory transport for host-side testing
//!
//! `SimTransport` behaves like a well-mannered stack: requests that have an
//! asynchronous outcome queue the matching event, and every outbound call is
//! recorded so a test can assert exactly what the peripheral asked for.
//! Failure knobs let tests script the unhappy paths.

use super::event::TransportEvent;
use super::types::*;
use super::{BondStore, EventSource, GapOps, GattServerOps};
use crate::att::AttErrorCode;
use crate::error::{LinkError, LinkResult, StatusCode};
use crate::gap::{AddressType, BdAddr, ConnHandle, ConnParamUpdate};
use crate::smp::{AuthInfo, KeyBundle, KeyDistribution, SecurityKeys};
use rand::Rng;
use std::collections::{HashMap, VecDeque};

/// Status the simulated stack reports for a rejected request
pub const SIM_STATUS_REJECTED: StatusCode = StatusCode(0x0104);
/// Status the simulated stack reports when no bonded device exists
pub const SIM_STATUS_NO_DEVICE: StatusCode = StatusCode(0x0106);
/// Status the simulated stack reports when flash is not writable
pub const SIM_STATUS_FLASH_BUSY: StatusCode = StatusCode(0x010A);

/// Outbound call recorded by [`SimTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Enable,
    Disable,
    StartAdvertising(AdvertisingMode, u8),
    StopAdvertising,
    RequestDeviceAddress,
    GenerateKeys(KeyDistribution, KeyDistribution),
    SetIdentityAddress(BdAddr),
    SetDefaultPhy(Phy, Phy),
    AuthRequest(AuthInfo),
    AuthReply(AuthInfo),
    SetSecurityKeys(u8),
    ConnParamUpdate(ConnParamUpdate),
    EnterLowPower,
    WriteAttribute(u16, Vec<u8>),
    WriteCccd(u16, Vec<u8>),
    WriteResponse(ConnHandle),
    ErrorResponse {
        opcode: u8,
        handle: u16,
        code: AttErrorCode,
    },
    Notify(u16, Vec<u8>),
    Indicate(u16, Vec<u8>),
    RemoveAllBonded,
    RemoveOldestBonded,
    StoreBondingData,
}

/// Scriptable in-memory transport
#[derive(Debug)]
pub struct SimTransport {
    /// Pending events, delivered in order
    events: VecDeque<TransportEvent>,
    /// Every outbound call, in order
    calls: Vec<Call>,
    stack: StackState,
    advertising: AdvState,
    /// The single simulated link
    link: Option<(ConnHandle, ConnState)>,
    addresses: DeviceAddresses,
    attributes: HashMap<u16, Vec<u8>>,
    cccds: HashMap<u16, Vec<u8>>,
    bonds: Vec<BondedDevice>,
    /// Event pumps left before the attribute layer reports idle
    busy_polls: u32,
    /// Event pumps each notification or indication keeps the layer busy for
    busy_after_send: u32,
    /// Never report idle
    stuck_busy: bool,
    /// Number of upcoming auth replies to reject
    pub fail_auth_replies: u32,
    /// Error returned by every local attribute write
    pub fail_attribute_writes: Option<AttErrorCode>,
    /// Number of upcoming bonding-data stores to reject
    pub fail_bond_stores: u32,
    /// Error returned when reading the bond list
    pub fail_bond_list: Option<StatusCode>,
    /// Reject advertising requests
    pub fail_advertising: bool,
}

impl SimTransport {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            calls: Vec::new(),
            stack: StackState::Stopped,
            advertising: AdvState::Stopped,
            link: None,
            addresses: DeviceAddresses {
                public: BdAddr::new([0x01, 0x00, 0x50, 0xA0, 0x50, 0x00]),
                private: BdAddr::new([0x9A, 0x23, 0x11, 0xEF, 0x4C, 0x5D]),
            },
            attributes: HashMap::new(),
            cccds: HashMap::new(),
            bonds: Vec::new(),
            busy_polls: 0,
            busy_after_send: 1,
            stuck_busy: false,
            fail_auth_replies: 0,
            fail_attribute_writes: None,
            fail_bond_stores: 0,
            fail_bond_list: None,
            fail_advertising: false,
        }
    }

    /// Queue an arbitrary event
    pub fn push_event(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `pred`
    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    /// Values sent by notification, in order
    pub fn notifications(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Notify(_, value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Values sent by indication, in order
    pub fn indications(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Indicate(_, value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn attribute(&self, handle: u16) -> Option<&[u8]> {
        self.attributes.get(&handle).map(Vec::as_slice)
    }

    pub fn add_bond(&mut self, address: BdAddr, address_type: AddressType, bd_handle: u8) {
        self.bonds.push(BondedDevice {
            address,
            address_type,
            bd_handle,
        });
    }

    /// Keep the attribute layer busy for the next `polls` event pumps
    pub fn set_busy_for(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Keep the attribute layer busy forever
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    pub fn set_busy_after_send(&mut self, polls: u32) {
        self.busy_after_send = polls;
    }

    /// Simulate a central connecting: advertising stops, the link comes up
    /// and the attribute layer connects.
    pub fn connect(&mut self, bd_handle: u8, att_id: u8, peer: BdAddr) {
        let conn = ConnHandle::new(bd_handle, att_id);
        self.advertising = AdvState::Stopped;
        self.link = Some((conn, ConnState::Connected));
        self.push_event(TransportEvent::AdvertisingStartStop);
        self.push_event(TransportEvent::DeviceConnected(ConnectionInfo {
            status: 0,
            bd_handle,
            peer_address: peer,
            peer_address_type: AddressType::Public,
            interval: 24,
            latency: 0,
            supervision_timeout: 400,
            enhanced: false,
        }));
        self.push_event(TransportEvent::GattConnected(conn));
    }

    /// Simulate the central dropping the link
    pub fn disconnect(&mut self, reason: u8) {
        if let Some((conn, _)) = self.link.take() {
            self.push_event(TransportEvent::DeviceDisconnected(DisconnectInfo {
                bd_handle: conn.bd_handle,
                reason,
                status: 0,
            }));
            self.push_event(TransportEvent::GattDisconnected(conn));
        }
    }

    /// Mark the current link encrypted
    pub fn encrypt_link(&mut self) {
        if let Some((_, state)) = self.link.as_mut() {
            *state = ConnState::Encrypted;
        }
    }

    /// Current link handle, if connected
    pub fn link(&self) -> Option<ConnHandle> {
        self.link.map(|(conn, _)| conn)
    }

    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }

    fn require_stack_on(&self) -> LinkResult<()> {
        if self.stack == StackState::On {
            Ok(())
        } else {
            Err(LinkError::InvalidState)
        }
    }

    fn require_link(&self, conn: ConnHandle) -> LinkResult<()> {
        match self.link {
            Some((current, state)) if current == conn && state >= ConnState::Connected => Ok(()),
            _ => Err(LinkError::NoConnection),
        }
    }
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for SimTransport {
    fn next_event(&mut self) -> Option<TransportEvent> {
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
        }

        let event = self.events.pop_front()?;
        match event {
            TransportEvent::StackOn => self.stack = StackState::On,
            TransportEvent::StackOff => {
                self.stack = StackState::Stopped;
                self.advertising = AdvState::Stopped;
                self.link = None;
            }
            _ => {}
        }
        Some(event)
    }
}

impl GapOps for SimTransport {
    fn enable(&mut self) -> LinkResult<()> {
        self.record(Call::Enable);
        if self.stack != StackState::Stopped {
            return Err(LinkError::InvalidState);
        }
        self.stack = StackState::Starting;
        self.push_event(TransportEvent::StackOn);
        // The controller programs its configured address while starting
        self.push_event(TransportEvent::SetDeviceAddressComplete);
        Ok(())
    }

    fn disable(&mut self) -> LinkResult<()> {
        self.record(Call::Disable);
        if self.stack == StackState::Stopped {
            return Err(LinkError::InvalidState);
        }
        self.stack = StackState::Stopping;
        self.push_event(TransportEvent::StackOff);
        Ok(())
    }

    fn stack_state(&self) -> StackState {
        self.stack
    }

    fn stack_version(&self) -> LinkResult<StackVersion> {
        Ok(StackVersion {
            major: 5,
            minor: 0,
            patch: 6,
            build: 945,
        })
    }

    fn start_advertising(&mut self, mode: AdvertisingMode, profile: u8) -> LinkResult<()> {
        self.record(Call::StartAdvertising(mode, profile));
        self.require_stack_on()?;
        if self.fail_advertising {
            return Err(LinkError::Transport(SIM_STATUS_REJECTED));
        }
        self.advertising = AdvState::Advertising;
        self.push_event(TransportEvent::AdvertisingStartStop);
        Ok(())
    }

    fn stop_advertising(&mut self) -> LinkResult<()> {
        self.record(Call::StopAdvertising);
        self.advertising = AdvState::Stopped;
        self.push_event(TransportEvent::AdvertisingStartStop);
        Ok(())
    }

    fn advertising_state(&self) -> AdvState {
        self.advertising
    }

    fn active_connections(&self) -> usize {
        match self.link {
            Some((_, state)) if state >= ConnState::Connected => 1,
            _ => 0,
        }
    }

    fn request_device_address(&mut self) -> LinkResult<()> {
        self.record(Call::RequestDeviceAddress);
        self.push_event(TransportEvent::DeviceAddressResolved(self.addresses));
        Ok(())
    }

    fn generate_keys(
        &mut self,
        local: KeyDistribution,
        exchange: KeyDistribution,
    ) -> LinkResult<()> {
        self.record(Call::GenerateKeys(local, exchange));
        let mut rng = rand::thread_rng();
        let mut keys = SecurityKeys::default();
        rng.fill(&mut keys.irk);
        rng.fill(&mut keys.csrk);
        keys.id_addr_info[0] = u8::from(AddressType::Public);
        keys.id_addr_info[1..].copy_from_slice(self.addresses.public.as_slice());
        self.push_event(TransportEvent::KeysGenerated(keys));
        Ok(())
    }

    fn set_identity_address(&mut self, address: BdAddr) -> LinkResult<()> {
        self.record(Call::SetIdentityAddress(address));
        Ok(())
    }

    fn set_default_phy(&mut self, tx: Phy, rx: Phy) -> LinkResult<()> {
        self.record(Call::SetDefaultPhy(tx, rx));
        self.push_event(TransportEvent::DefaultPhySet);
        Ok(())
    }

    fn auth_request(&mut self, info: &AuthInfo) -> LinkResult<()> {
        self.record(Call::AuthRequest(*info));
        Ok(())
    }

    fn auth_reply(&mut self, info: &AuthInfo) -> LinkResult<()> {
        self.record(Call::AuthReply(*info));
        if self.fail_auth_replies > 0 {
            self.fail_auth_replies -= 1;
            return Err(LinkError::Transport(SIM_STATUS_REJECTED));
        }
        Ok(())
    }

    fn set_security_keys(&mut self, bd_handle: u8, _bundle: &KeyBundle) -> LinkResult<()> {
        self.record(Call::SetSecurityKeys(bd_handle));
        Ok(())
    }

    fn conn_param_update(&mut self, params: &ConnParamUpdate) -> LinkResult<()> {
        self.record(Call::ConnParamUpdate(*params));
        self.push_event(TransportEvent::ConnParamUpdateResponse { accepted: true });
        Ok(())
    }

    fn enter_low_power(&mut self) {
        self.record(Call::EnterLowPower);
    }
}

impl GattServerOps for SimTransport {
    fn write_attribute_local(&mut self, handle: u16, value: &[u8]) -> Result<(), AttErrorCode> {
        self.record(Call::WriteAttribute(handle, value.to_vec()));
        if let Some(code) = self.fail_attribute_writes {
            return Err(code);
        }
        self.attributes.insert(handle, value.to_vec());
        Ok(())
    }

    fn write_cccd(
        &mut self,
        _conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> Result<(), AttErrorCode> {
        self.record(Call::WriteCccd(handle, value.to_vec()));
        if let Some(code) = self.fail_attribute_writes {
            return Err(code);
        }
        if value.len() != 2 {
            return Err(AttErrorCode::InvalidAttributeValueLength);
        }
        self.cccds.insert(handle, value.to_vec());
        Ok(())
    }

    fn send_write_response(&mut self, conn: ConnHandle) -> LinkResult<()> {
        self.record(Call::WriteResponse(conn));
        Ok(())
    }

    fn send_error_response(
        &mut self,
        _conn: ConnHandle,
        opcode: u8,
        handle: u16,
        code: AttErrorCode,
    ) -> LinkResult<()> {
        self.record(Call::ErrorResponse {
            opcode,
            handle,
            code,
        });
        Ok(())
    }

    fn send_notification(
        &mut self,
        conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> LinkResult<()> {
        self.require_link(conn)?;
        self.record(Call::Notify(handle, value.to_vec()));
        self.busy_polls = self.busy_after_send;
        Ok(())
    }

    fn send_indication(&mut self, conn: ConnHandle, handle: u16, value: &[u8]) -> LinkResult<()> {
        self.require_link(conn)?;
        self.record(Call::Indicate(handle, value.to_vec()));
        self.busy_polls = self.busy_after_send;
        self.push_event(TransportEvent::IndicationConfirmed(conn));
        Ok(())
    }

    fn is_busy(&self, _conn: ConnHandle) -> bool {
        self.stuck_busy || self.busy_polls > 0
    }

    fn connection_state(&self, conn: ConnHandle) -> ConnState {
        match self.link {
            Some((current, state)) if current == conn => state,
            _ => ConnState::Disconnected,
        }
    }
}

impl BondStore for SimTransport {
    fn bonded_devices(&self) -> LinkResult<Vec<BondedDevice>> {
        match self.fail_bond_list {
            Some(code) => Err(LinkError::Transport(code)),
            None => Ok(self.bonds.clone()),
        }
    }

    fn remove_all_bonded(&mut self) -> LinkResult<()> {
        self.record(Call::RemoveAllBonded);
        self.bonds.clear();
        Ok(())
    }

    fn remove_oldest_bonded(&mut self) -> LinkResult<()> {
        self.record(Call::RemoveOldestBonded);
        if self.bonds.is_empty() {
            return Err(LinkError::Transport(SIM_STATUS_NO_DEVICE));
        }
        self.bonds.remove(0);
        Ok(())
    }

    fn store_bonding_data(&mut self) -> LinkResult<()> {
        self.record(Call::StoreBondingData);
        if self.fail_bond_stores > 0 {
            self.fail_bond_stores -= 1;
            return Err(LinkError::Transport(SIM_STATUS_FLASH_BUSY));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_delivers_stack_on() {
        let mut sim = SimTransport::new();
        sim.enable().unwrap();
        assert_eq!(sim.stack_state(), StackState::Starting);
        assert_eq!(sim.next_event(), Some(TransportEvent::StackOn));
        assert_eq!(sim.stack_state(), StackState::On);
        assert_eq!(
            sim.next_event(),
            Some(TransportEvent::SetDeviceAddressComplete)
        );
        assert_eq!(sim.next_event(), None);
    }

    #[test]
    fn test_advertising_requires_stack() {
        let mut sim = SimTransport::new();
        assert_eq!(
            sim.start_advertising(AdvertisingMode::Fast, 0),
            Err(LinkError::InvalidState)
        );
    }

    #[test]
    fn test_busy_drains_with_event_pumps() {
        let mut sim = SimTransport::new();
        let conn = ConnHandle::new(1, 0);
        sim.set_busy_for(2);
        assert!(sim.is_busy(conn));
        sim.next_event();
        assert!(sim.is_busy(conn));
        sim.next_event();
        assert!(!sim.is_busy(conn));
    }

    #[test]
    fn test_remove_oldest_bonded_pops_front() {
        let mut sim = SimTransport::new();
        sim.add_bond(BdAddr::new([1; 6]), AddressType::Public, 1);
        sim.add_bond(BdAddr::new([2; 6]), AddressType::Random, 2);
        sim.remove_oldest_bonded().unwrap();
        let bonds = sim.bonded_devices().unwrap();
        assert_eq!(bonds.len(), 1);
        assert_eq!(bonds[0].bd_handle, 2);
        sim.remove_oldest_bonded().unwrap();
        assert_eq!(
            sim.remove_oldest_bonded(),
            Err(LinkError::Transport(SIM_STATUS_NO_DEVICE))
        );
    }
}
