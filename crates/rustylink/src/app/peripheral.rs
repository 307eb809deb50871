//! The peripheral
//!
//! Owns the transport and drives it from a single poll loop. Every event the
//! transport delivers goes through [`Peripheral::handle_event`]: the
//! connection and security state machine sees it first, then the host
//! interface service.

use super::config::PeripheralConfig;
use super::session::SessionContext;
use super::state::{transition, Action, LinkState, Policy, Transition};
use crate::bond::BondRegistry;
use crate::diag::{Diagnostics, LogDiagnostics};
use crate::error::{LinkError, LinkResult};
use crate::gap::{interval_to_ms, supervision_timeout_to_ms, BdAddr, ConnHandle, ConnParamUpdate};
use crate::gatt::{ClientConfig, HostInterface, WriteKind, WriteOutcome};
use crate::smp::{AuthError, AuthInfo, KeyBundle};
use crate::transport::{AdvState, ConnState, Phy, StackState, Transport, TransportEvent};
use log::{debug, error, info, trace, warn};

/// A BLE peripheral serving the host interface service over one link
pub struct Peripheral<T: Transport, D: Diagnostics = LogDiagnostics> {
    /// The underlying stack
    transport: T,
    /// Queued debug output
    diag: D,
    /// Configuration fixed at construction
    config: PeripheralConfig,
    /// State machine state
    state: LinkState,
    /// Link, MTU, keys and security context
    session: SessionContext,
    /// View of the transport's bond list
    bonds: BondRegistry,
    /// Command/response engine
    service: HostInterface,
}

impl<T: Transport> Peripheral<T> {
    /// Create a peripheral logging through the global logger
    pub fn new(transport: T, config: PeripheralConfig) -> LinkResult<Self> {
        Self::with_diagnostics(transport, LogDiagnostics, config)
    }
}

impl<T: Transport, D: Diagnostics> Peripheral<T, D> {
    pub fn with_diagnostics(transport: T, diag: D, config: PeripheralConfig) -> LinkResult<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            diag,
            session: SessionContext::new(config.max_mtu, config.security),
            bonds: BondRegistry::new(config.bonding),
            service: HostInterface::new(config.handles, config.command_capacity),
            state: LinkState::StackOff,
            config,
        })
    }

    /// Start the stack. Advertising begins once the stack reports it is on.
    pub fn init(&mut self) -> LinkResult<()> {
        match self.transport.stack_version() {
            Ok(version) => info!("BLE stack version: {}", version),
            Err(err) => warn!("Failed to read the stack version: {}", err),
        }
        self.transport.enable()?;
        debug!("Stack enable requested");
        Ok(())
    }

    /// Run one iteration of the application loop.
    ///
    /// Processes pending events, then waits in low power if configured,
    /// restarts advertising when idle and persists bonding data when asked
    /// to. The last two happen only once diagnostics have drained.
    pub fn poll(&mut self) -> LinkResult<()> {
        self.ensure_running()?;
        self.pump()?;

        if self.config.low_power && self.diag.is_drained() {
            self.transport.enter_low_power();
        }

        if self.transport.stack_state() == StackState::On
            && self.transport.advertising_state() == AdvState::Stopped
            && self.transport.active_connections() == 0
        {
            info!("No active connection, restarting advertising");
            if let Err(err) = self.start_advertising() {
                warn!("Failed to restart advertising: {}", err);
            }
        }

        if self.session.persist_pending() && self.diag.is_drained() {
            match self.transport.store_bonding_data() {
                Ok(()) => {
                    self.session.set_persist_pending(false);
                    info!("Bonding data stored");
                }
                Err(err) => warn!("Failed to store bonding data, will retry: {}", err),
            }
        }

        Ok(())
    }

    /// Shut the stack down and wait until it has stopped.
    pub fn stop(&mut self) -> LinkResult<()> {
        self.transport.disable()?;
        let mut poller = self.config.busy_wait.start();
        while self.transport.stack_state() != StackState::Stopped {
            poller.tick()?;
            self.pump_once()?;
        }
        self.state = LinkState::StackOff;
        info!("Stack stopped");
        self.diag.flush();
        Ok(())
    }

    /// Ask the central for new connection parameters.
    ///
    /// Intervals are in 1.25 ms units, the timeout in 10 ms units. Values
    /// out of range fail before anything reaches the transport.
    pub fn request_connection_param_update(
        &mut self,
        interval_min: u16,
        interval_max: u16,
        latency: u16,
        supervision_timeout: u16,
    ) -> LinkResult<()> {
        self.ensure_running()?;
        let bd_handle = self.session.connection().map_or(0, |conn| conn.bd_handle);
        let params = ConnParamUpdate::new(
            bd_handle,
            interval_min,
            interval_max,
            latency,
            supervision_timeout,
        )?;

        if !self.session.is_connected() || self.transport.active_connections() == 0 {
            return Err(LinkError::NoConnection);
        }

        debug!(
            "Requesting interval {:.2}..{:.2} ms, latency {}, timeout {} ms",
            interval_to_ms(interval_min),
            interval_to_ms(interval_max),
            latency,
            supervision_timeout_to_ms(supervision_timeout)
        );
        self.transport.conn_param_update(&params)
    }

    /// MTU negotiated on the current link
    pub fn current_negotiated_mtu(&self) -> u16 {
        self.session.mtu().current()
    }

    /// Register the hook run for every stored, non-empty command
    pub fn on_command<F>(&mut self, callback: F)
    where
        F: FnMut(&[u8]) + 'static,
    {
        self.service.set_callback(Box::new(callback));
    }

    /// Send a response by notification.
    ///
    /// Waits, pumping events, until the transport is idle, sends the payload
    /// cut to the MTU, then waits for idle again. Returns the delivered
    /// length.
    pub fn send_response_fast(&mut self, payload: &[u8]) -> LinkResult<usize> {
        self.ensure_running()?;
        let conn = self.service.notify_target(&self.transport)?;
        self.wait_idle(conn)?;

        // The link may have changed while events were pumped
        let delivered = self
            .service
            .notify(&mut self.transport, self.session.mtu(), payload)?;

        match self.wait_idle(conn) {
            Ok(()) | Err(LinkError::NoConnection) => {}
            Err(LinkError::Timeout) => warn!("Transport still busy after notification"),
            Err(err) => return Err(err),
        }
        Ok(delivered)
    }

    /// Send a response by indication. Returns the delivered length; the
    /// confirmation arrives later as an event.
    pub fn send_response_reliable(&mut self, payload: &[u8]) -> LinkResult<usize> {
        self.ensure_running()?;
        self.service
            .indicate(&mut self.transport, self.session.mtu(), payload)
    }

    /// Process every pending event. Returns how many were processed.
    pub fn pump(&mut self) -> LinkResult<usize> {
        let mut processed = 0;
        while self.pump_once()? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Process at most one pending event. Returns whether there was one.
    ///
    /// Failures are logged by [`handle_event`](Self::handle_event); only a
    /// fatal one is returned.
    pub fn pump_once(&mut self) -> LinkResult<bool> {
        let Some(event) = self.transport.next_event() else {
            return Ok(false);
        };
        match self.handle_event(event) {
            Err(err) if err.is_fatal() => Err(err),
            _ => Ok(true),
        }
    }

    /// Dispatch one event to the state machine, then to the service.
    ///
    /// Returns the first failure; later actions still run.
    pub fn handle_event(&mut self, event: TransportEvent) -> LinkResult<()> {
        self.report(&event);

        let Transition { next, actions } = transition(self.state, &event, self.policy());
        if next != self.state {
            debug!("State {} -> {}", self.state, next);
            self.state = next;
        }

        let mut result = Ok(());
        for action in actions {
            if let Err(err) = self.apply(action) {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!("{} handling failed: {}", event.name(), err);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        if let Err(err) = self.dispatch_service(&event) {
            warn!("{} handling failed: {}", event.name(), err);
            if result.is_ok() {
                result = Err(err);
            }
        }
        result
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    pub fn bonds(&self) -> &BondRegistry {
        &self.bonds
    }

    pub fn service(&self) -> &HostInterface {
        &self.service
    }

    /// Consume the pending command
    pub fn take_command(&mut self) -> Option<Vec<u8>> {
        self.service.take_command()
    }

    /// Pending command, left in place
    pub fn pending_command(&self) -> Option<&[u8]> {
        self.service.command_buffer().peek()
    }

    /// Remove every bonded device
    pub fn clear_bonds(&mut self) -> LinkResult<()> {
        self.bonds.clear_all(&mut self.transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn diagnostics(&self) -> &D {
        &self.diag
    }

    pub fn diagnostics_mut(&mut self) -> &mut D {
        &mut self.diag
    }

    fn policy(&self) -> Policy {
        Policy {
            requires_pairing: self.session.security().requires_pairing(),
            phy_update: self.config.phy_update,
        }
    }

    fn ensure_running(&self) -> LinkResult<()> {
        if self.state == LinkState::Faulted {
            Err(LinkError::HardwareFault)
        } else {
            Ok(())
        }
    }

    fn start_advertising(&mut self) -> LinkResult<()> {
        let advertising = self.config.advertising;
        self.transport
            .start_advertising(advertising.mode, advertising.profile)
    }

    /// Pump events until the attribute layer on `conn` is idle.
    fn wait_idle(&mut self, conn: ConnHandle) -> LinkResult<()> {
        let mut poller = self.config.busy_wait.start();
        while self.transport.is_busy(conn) {
            if self.transport.connection_state(conn) < ConnState::Connected {
                return Err(LinkError::NoConnection);
            }
            poller.tick()?;
            self.pump_once()?;
        }
        Ok(())
    }

    fn apply(&mut self, action: Action) -> LinkResult<()> {
        trace!("Action {:?}", action);
        match action {
            Action::StartAdvertising => self.start_advertising(),
            Action::LogBonds => self.bonds.log_bonds(&self.transport),
            Action::Halt => {
                error!("Controller hardware failure, halting");
                Err(LinkError::HardwareFault)
            }
            Action::RequestDeviceAddress => self.transport.request_device_address(),
            Action::StoreAddresses(addresses) => {
                info!(
                    "Public address: {}, private address: {}",
                    addresses.public, addresses.private
                );
                self.session.set_addresses(addresses);
                Ok(())
            }
            Action::GenerateKeys => self
                .transport
                .generate_keys(self.config.local_keys, self.config.exchange_keys),
            Action::StoreKeys(keys) => {
                debug!("Security keys generated: {:?}", keys);
                self.session.set_keys(KeyBundle::new(
                    self.config.local_keys,
                    self.config.exchange_keys,
                    keys,
                ));
                Ok(())
            }
            Action::SetIdentityAddress => {
                let address = self.identity_address().ok_or(LinkError::InvalidState)?;
                self.transport.set_identity_address(address)
            }
            Action::NegotiatePhy => self.transport.set_default_phy(Phy::Le2M, Phy::Le2M),
            Action::SyncAdvertising => {
                self.sync_advertising();
                Ok(())
            }
            Action::OpenSession(info) => {
                info!("Connected: {}", info);
                self.session.open(info).map(|_| ())
            }
            Action::BindSession(conn) => {
                self.session.bind(conn);
                Ok(())
            }
            Action::RequestAuthentication(bd_handle) => {
                let request = self.session.security_mut().request_for(bd_handle);
                debug!("Requesting authentication: {}", request);
                self.transport.auth_request(&request)
            }
            Action::ProvisionKeys(bd_handle) => self.provision_keys(bd_handle),
            Action::ReplyAuthentication(peer) => self.reply_authentication(&peer),
            Action::RecordAuthFailure(info) => {
                warn!("Authentication failed: {}", info.error);
                self.session.security_mut().record_failure(&info);
                Ok(())
            }
            Action::ShowPasskey(passkey) => {
                info!("Passkey: {:06}", passkey);
                Ok(())
            }
            Action::ShowNumericComparison(value) => {
                info!("Compare with the peer: {:06}", value);
                Ok(())
            }
            Action::NegotiateMtu(peer_mtu) => {
                let mtu = self.session.mtu_mut().on_exchange_requested(peer_mtu);
                info!("MTU exchange: peer {}, negotiated {}", peer_mtu, mtu);
                Ok(())
            }
            Action::CloseSession(info) => {
                info!(
                    "Disconnected: bdHandle={:#04x} reason={:#04x}",
                    info.bd_handle, info.reason
                );
                self.session.close(info.bd_handle);
                Ok(())
            }
            Action::FlagPersist => {
                self.session.set_persist_pending(true);
                Ok(())
            }
        }
    }

    fn identity_address(&self) -> Option<BdAddr> {
        if let Some(addresses) = self.session.addresses() {
            return Some(addresses.public);
        }
        self.session
            .keys()
            .and_then(|bundle| BdAddr::from_slice(&bundle.keys.id_addr_info[1..]))
    }

    fn sync_advertising(&mut self) {
        match self.transport.advertising_state() {
            AdvState::Advertising => {
                info!("Advertising started");
                if matches!(
                    self.state,
                    LinkState::StackOn | LinkState::Disconnecting | LinkState::Advertising
                ) {
                    self.state = LinkState::Advertising;
                }
            }
            AdvState::Stopped => {
                info!("Advertising stopped");
                if self.state == LinkState::Advertising {
                    self.state = LinkState::StackOn;
                }
            }
            other => trace!("Advertising state {:?}", other),
        }
    }

    /// Hand the generated keys to a first-time peer. A bonded peer already
    /// holds valid keys and is left alone.
    fn provision_keys(&mut self, bd_handle: u8) -> LinkResult<()> {
        if self.bonds.contains(&self.transport, bd_handle)? {
            debug!("bdHandle={:#04x} already bonded, keeping its keys", bd_handle);
            return Ok(());
        }
        match self.session.keys() {
            Some(bundle) => self.transport.set_security_keys(bd_handle, bundle),
            None => {
                warn!("No security keys generated yet for bdHandle={:#04x}", bd_handle);
                Ok(())
            }
        }
    }

    /// Answer the peer's authentication request. A rejected reply usually
    /// means the bond list is full: evict the oldest bond and retry once.
    fn reply_authentication(&mut self, peer: &AuthInfo) -> LinkResult<()> {
        let reply = self.session.security_mut().reply_for(peer);
        if reply.error != AuthError::None {
            warn!("Refusing authentication: {}", reply.error);
        }

        if let Err(err) = self.transport.auth_reply(&reply) {
            warn!("Authentication reply failed ({}), removing oldest bond", err);
            self.transport.remove_oldest_bonded()?;
            self.transport.auth_reply(&reply)?;
        }
        Ok(())
    }

    /// Service-level handling, after the state machine has run
    fn dispatch_service(&mut self, event: &TransportEvent) -> LinkResult<()> {
        match event {
            TransportEvent::GattConnected(conn) => self.service.on_connected(*conn),
            TransportEvent::GattDisconnected(conn) => self.service.on_disconnected(*conn),
            TransportEvent::WriteRequest(params) => {
                let outcome =
                    self.service
                        .handle_write(&mut self.transport, WriteKind::Request, params)?;
                log_write(outcome, params.handle);
            }
            TransportEvent::WriteCommand(params) => {
                let outcome =
                    self.service
                        .handle_write(&mut self.transport, WriteKind::Command, params)?;
                log_write(outcome, params.handle);
            }
            TransportEvent::NotificationEnabled { handle, .. } => {
                self.service
                    .on_client_config_event(*handle, ClientConfig::NOTIFY, true)
            }
            TransportEvent::NotificationDisabled { handle, .. } => {
                self.service
                    .on_client_config_event(*handle, ClientConfig::NOTIFY, false)
            }
            TransportEvent::IndicationEnabled { handle, .. } => {
                self.service
                    .on_client_config_event(*handle, ClientConfig::INDICATE, true)
            }
            TransportEvent::IndicationDisabled { handle, .. } => {
                self.service
                    .on_client_config_event(*handle, ClientConfig::INDICATE, false)
            }
            TransportEvent::IndicationConfirmed(conn) => {
                self.service.on_indication_confirmed(*conn)
            }
            _ => {}
        }
        Ok(())
    }

    /// Log what an event carries
    fn report(&self, event: &TransportEvent) {
        match event {
            TransportEvent::StackBusyStatus { busy } => debug!("Stack busy: {}", busy),
            TransportEvent::DataLengthChanged(length)
            | TransportEvent::GetDataLengthComplete(length) => debug!(
                "{}: tx {} octets / {} us, rx {} octets / {} us",
                event.name(),
                length.max_tx_octets,
                length.max_tx_time,
                length.max_rx_octets,
                length.max_rx_time
            ),
            TransportEvent::Timeout { code } => warn!("Timeout, reason {:#04x}", code),
            TransportEvent::PasskeyEntryRequested => info!("Passkey entry requested"),
            TransportEvent::NegotiatedAuthInfo(info) => debug!("Negotiated: {}", info),
            TransportEvent::AuthRequested(info) => info!("Authentication requested: {}", info),
            TransportEvent::AuthComplete(info) => info!("Authentication complete: {}", info),
            TransportEvent::ConnParamUpdateResponse { accepted } => debug!(
                "Connection parameter update {}",
                if *accepted { "accepted" } else { "rejected" }
            ),
            TransportEvent::ConnectionUpdated(params) => info!(
                "Connection updated: interval {:.2} ms, latency {}, supervision timeout {} ms",
                interval_to_ms(params.interval),
                params.latency,
                supervision_timeout_to_ms(params.supervision_timeout)
            ),
            TransportEvent::EncryptionChanged { enabled } => info!(
                "Encryption {}",
                if *enabled { "enabled" } else { "disabled" }
            ),
            TransportEvent::ReadAccessRequest { conn, handle } => {
                debug!("Read of handle {:#06x} on {}", handle, conn)
            }
            TransportEvent::Other(code) => debug!("Unhandled event {:#x}", code),
            other => debug!("{}", other),
        }
    }
}

fn log_write(outcome: WriteOutcome, handle: u16) {
    match outcome {
        WriteOutcome::NotHandled => trace!("Write to handle {:#06x} left to the stack", handle),
        outcome => trace!("Write to handle {:#06x}: {:?}", handle, outcome),
    }
}
