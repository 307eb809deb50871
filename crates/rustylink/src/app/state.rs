//! Connection and security state machine
//!
//! [`transition`] is a pure function of the current state, one event and the
//! configured policy. It returns the next state and the actions the
//! peripheral must carry out; nothing here touches the transport, so every
//! transition can be tested on its own.

use crate::gap::ConnHandle;
use crate::smp::{AuthInfo, SecurityKeys};
use crate::transport::{ConnectionInfo, DeviceAddresses, DisconnectInfo, TransportEvent};
use std::fmt;

/// Lifecycle of the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// Stack not running
    StackOff,
    /// Stack running, not advertising
    StackOn,
    /// Advertising, waiting for a central
    Advertising,
    /// Link established, attribute layer not yet connected
    Connecting,
    /// Link and attribute layer up
    Connected,
    /// Pairing in progress
    Authenticating,
    /// Pairing completed
    Secured,
    /// Link gone, waiting for advertising to resume
    Disconnecting,
    /// Controller failed; nothing else happens
    Faulted,
}

impl LinkState {
    /// Whether a link to a peer is up
    pub fn has_link(&self) -> bool {
        matches!(
            self,
            LinkState::Connecting
                | LinkState::Connected
                | LinkState::Authenticating
                | LinkState::Secured
        )
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::StackOff => "StackOff",
            LinkState::StackOn => "StackOn",
            LinkState::Advertising => "Advertising",
            LinkState::Connecting => "Connecting",
            LinkState::Connected => "Connected",
            LinkState::Authenticating => "Authenticating",
            LinkState::Secured => "Secured",
            LinkState::Disconnecting => "Disconnecting",
            LinkState::Faulted => "Faulted",
        };
        f.write_str(name)
    }
}

/// Policy inputs of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policy {
    /// Connecting peers must be asked to authenticate
    pub requires_pairing: bool,
    /// Ask for the 2M PHY after key generation
    pub phy_update: bool,
}

/// Work the peripheral carries out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start advertising with the configured mode and profile
    StartAdvertising,
    /// Log the bond list
    LogBonds,
    /// Stop doing anything; the controller is gone
    Halt,
    /// Ask the controller for the device address
    RequestDeviceAddress,
    /// Remember the device addresses
    StoreAddresses(DeviceAddresses),
    /// Ask the transport to generate local keys
    GenerateKeys,
    /// Remember the generated keys
    StoreKeys(SecurityKeys),
    /// Program the identity address
    SetIdentityAddress,
    /// Ask for the 2M PHY
    NegotiatePhy,
    /// Follow the transport's advertising state
    SyncAdvertising,
    /// Record a newly established link
    OpenSession(ConnectionInfo),
    /// Attach the attribute-layer connection to the link
    BindSession(ConnHandle),
    /// Ask the peer on this link to authenticate
    RequestAuthentication(u8),
    /// Hand the key bundle to the transport unless the peer is bonded
    ProvisionKeys(u8),
    /// Answer the peer's authentication request
    ReplyAuthentication(AuthInfo),
    /// Record an authentication failure
    RecordAuthFailure(AuthInfo),
    /// Show a passkey to the user
    ShowPasskey(u32),
    /// Show a numeric comparison value to the user
    ShowNumericComparison(u32),
    /// Apply the peer's MTU exchange request
    NegotiateMtu(u16),
    /// Forget the link
    CloseSession(DisconnectInfo),
    /// Persist bonding data from the poll loop
    FlagPersist,
}

/// Result of one transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the event
    pub next: LinkState,
    /// Actions to carry out, in order
    pub actions: Vec<Action>,
}

impl Transition {
    fn stay(state: LinkState) -> Self {
        Self::to(state, Vec::new())
    }

    fn to(next: LinkState, actions: Vec<Action>) -> Self {
        Self { next, actions }
    }
}

/// Compute the transition for `event` in `state`.
pub fn transition(state: LinkState, event: &TransportEvent, policy: Policy) -> Transition {
    use LinkState::*;

    if state == Faulted {
        return Transition::stay(Faulted);
    }

    match event {
        TransportEvent::HardwareError => Transition::to(Faulted, vec![Action::Halt]),

        TransportEvent::StackOn => {
            Transition::to(StackOn, vec![Action::StartAdvertising, Action::LogBonds])
        }
        TransportEvent::StackOff => Transition::stay(StackOff),

        TransportEvent::SetDeviceAddressComplete => {
            Transition::to(state, vec![Action::RequestDeviceAddress])
        }
        TransportEvent::DeviceAddressResolved(addresses) => Transition::to(
            state,
            vec![Action::StoreAddresses(*addresses), Action::GenerateKeys],
        ),
        TransportEvent::KeysGenerated(keys) => {
            let mut actions = vec![Action::StoreKeys(keys.clone()), Action::SetIdentityAddress];
            if policy.phy_update {
                actions.push(Action::NegotiatePhy);
            }
            Transition::to(state, actions)
        }

        TransportEvent::AdvertisingStartStop => {
            Transition::to(state, vec![Action::SyncAdvertising])
        }

        TransportEvent::DeviceConnected(info) if info.status != 0 => Transition::stay(state),
        // Only one link at a time; the session refuses the newcomer
        TransportEvent::DeviceConnected(info) if state.has_link() => {
            Transition::to(state, vec![Action::OpenSession(*info)])
        }
        TransportEvent::DeviceConnected(info) => {
            let mut actions = vec![Action::OpenSession(*info)];
            let next = if policy.requires_pairing {
                actions.push(Action::RequestAuthentication(info.bd_handle));
                Authenticating
            } else {
                Connecting
            };
            actions.push(Action::ProvisionKeys(info.bd_handle));
            Transition::to(next, actions)
        }
        TransportEvent::GattConnected(conn) => Transition::to(
            if state == Connecting { Connected } else { state },
            vec![Action::BindSession(*conn)],
        ),

        TransportEvent::AuthRequested(peer) => Transition::to(
            if state.has_link() { Authenticating } else { state },
            vec![Action::ReplyAuthentication(*peer)],
        ),
        TransportEvent::PasskeyDisplay(passkey) => {
            Transition::to(state, vec![Action::ShowPasskey(*passkey)])
        }
        TransportEvent::NumericComparisonRequested(value) => {
            Transition::to(state, vec![Action::ShowNumericComparison(*value)])
        }
        TransportEvent::AuthComplete(_) if state.has_link() => Transition::stay(Secured),
        TransportEvent::AuthFailed(info) => Transition::to(
            if state == Authenticating { Connected } else { state },
            vec![Action::RecordAuthFailure(*info)],
        ),

        TransportEvent::MtuExchangeRequested { mtu, .. } => {
            Transition::to(state, vec![Action::NegotiateMtu(*mtu)])
        }

        TransportEvent::DeviceDisconnected(info) => Transition::to(
            if state == StackOff { StackOff } else { Disconnecting },
            vec![Action::CloseSession(*info)],
        ),

        TransportEvent::PendingFlashWrite => Transition::to(state, vec![Action::FlagPersist]),

        _ => Transition::stay(state),
    }
}
