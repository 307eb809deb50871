//! Interface to the underlying BLE stack
//!
//! The peripheral never talks to a radio. Everything below the policy layer
//! is reached through the traits in this module:
//! - [`EventSource`] hands out pending events one at a time
//! - [`GapOps`] drives advertising, addressing, pairing and link parameters
//! - [`GattServerOps`] touches the local attribute database and pushes values
//! - [`BondStore`] exposes the transport's persisted bond list
//!
//! [`Transport`] bundles all four and is implemented for any type that
//! provides them.

pub mod event;
pub mod sim;
pub mod types;

pub use event::TransportEvent;
pub use sim::SimTransport;
pub use types::*;

use crate::att::AttErrorCode;
use crate::error::LinkResult;
use crate::gap::{BdAddr, ConnHandle, ConnParamUpdate};
use crate::smp::{AuthInfo, KeyBundle, KeyDistribution};

/// Source of transport events
pub trait EventSource {
    /// Let the stack run and return the next pending event, if any.
    fn next_event(&mut self) -> Option<TransportEvent>;
}

/// GAP level requests
pub trait GapOps {
    /// Initialise and enable the stack. `StackOn` follows.
    fn enable(&mut self) -> LinkResult<()>;

    /// Begin shutting the stack down. `StackOff` follows.
    fn disable(&mut self) -> LinkResult<()>;

    fn stack_state(&self) -> StackState;

    fn stack_version(&self) -> LinkResult<StackVersion>;

    fn start_advertising(&mut self, mode: AdvertisingMode, profile: u8) -> LinkResult<()>;

    fn stop_advertising(&mut self) -> LinkResult<()>;

    fn advertising_state(&self) -> AdvState;

    /// Number of links currently established
    fn active_connections(&self) -> usize;

    /// Ask the controller for the device address. `DeviceAddressResolved` follows.
    fn request_device_address(&mut self) -> LinkResult<()>;

    /// Generate local security keys. `KeysGenerated` follows.
    fn generate_keys(&mut self, local: KeyDistribution, exchange: KeyDistribution)
        -> LinkResult<()>;

    fn set_identity_address(&mut self, address: BdAddr) -> LinkResult<()>;

    fn set_default_phy(&mut self, tx: Phy, rx: Phy) -> LinkResult<()>;

    /// Initiate authentication on a link
    fn auth_request(&mut self, info: &AuthInfo) -> LinkResult<()>;

    /// Answer a peer's authentication request
    fn auth_reply(&mut self, info: &AuthInfo) -> LinkResult<()>;

    /// Provide the generated key bundle for a peer
    fn set_security_keys(&mut self, bd_handle: u8, bundle: &KeyBundle) -> LinkResult<()>;

    fn conn_param_update(&mut self, params: &ConnParamUpdate) -> LinkResult<()>;

    /// Wait for the next interrupt in a low-power state
    fn enter_low_power(&mut self);
}

/// Local attribute database and value delivery
pub trait GattServerOps {
    /// Store a value in the local attribute database
    fn write_attribute_local(&mut self, handle: u16, value: &[u8]) -> Result<(), AttErrorCode>;

    /// Store a peer-written Client Characteristic Configuration value
    fn write_cccd(&mut self, conn: ConnHandle, handle: u16, value: &[u8])
        -> Result<(), AttErrorCode>;

    fn send_write_response(&mut self, conn: ConnHandle) -> LinkResult<()>;

    fn send_error_response(
        &mut self,
        conn: ConnHandle,
        opcode: u8,
        handle: u16,
        code: AttErrorCode,
    ) -> LinkResult<()>;

    fn send_notification(&mut self, conn: ConnHandle, handle: u16, value: &[u8])
        -> LinkResult<()>;

    fn send_indication(&mut self, conn: ConnHandle, handle: u16, value: &[u8]) -> LinkResult<()>;

    /// Whether the attribute layer is still draining earlier traffic
    fn is_busy(&self, conn: ConnHandle) -> bool;

    fn connection_state(&self, conn: ConnHandle) -> ConnState;
}

/// The transport's persisted bond list
pub trait BondStore {
    /// Bonded devices in the transport's index order
    fn bonded_devices(&self) -> LinkResult<Vec<BondedDevice>>;

    fn remove_all_bonded(&mut self) -> LinkResult<()>;

    fn remove_oldest_bonded(&mut self) -> LinkResult<()>;

    /// Persist pending bonding data
    fn store_bonding_data(&mut self) -> LinkResult<()>;
}

/// Everything the peripheral needs from the stack
pub trait Transport: EventSource + GapOps + GattServerOps + BondStore {}

impl<T: EventSource + GapOps + GattServerOps + BondStore> Transport for T {}
