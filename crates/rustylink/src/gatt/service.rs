//! Host interface service
//!
//! A custom GATT service with two characteristics: the peer writes commands
//! to the command characteristic and receives responses on the response
//! characteristic by notification or indication.
//!
//! The attribute database lives in the transport. A command is first written
//! there so a concurrent read sees it; only a successful store reaches the
//! command buffer and the application callback.

use super::command::CommandBuffer;
use super::types::{ClientConfig, ServiceHandles, WriteKind, WriteOutcome};
use crate::att::{AttErrorCode, MtuTracker, ATT_VALUE_HEADER_LEN, ATT_WRITE_REQ};
use crate::error::{LinkError, LinkResult};
use crate::gap::ConnHandle;
use crate::transport::{ConnState, GattServerOps, WriteParams};
use log::{debug, trace, warn};
use std::fmt;

/// Application hook run for every stored, non-empty command
pub type CommandCallback = Box<dyn FnMut(&[u8])>;

/// Cut `payload` down to what fits in one value PDU at `mtu`
pub fn truncate_to_mtu(payload: &[u8], mtu: u16) -> &[u8] {
    let max = usize::from(mtu).saturating_sub(ATT_VALUE_HEADER_LEN);
    if payload.len() > max {
        &payload[..max]
    } else {
        payload
    }
}

/// Command/response engine of the host interface service
pub struct HostInterface {
    /// Attribute handles of the service
    handles: ServiceHandles,
    /// Attribute-layer connection, set between GATT connect and disconnect
    conn: Option<ConnHandle>,
    /// Delivery modes enabled by the peer
    client_config: ClientConfig,
    /// Pending command
    buffer: CommandBuffer,
    /// Application command hook
    callback: Option<CommandCallback>,
}

impl HostInterface {
    pub fn new(handles: ServiceHandles, command_capacity: usize) -> Self {
        Self {
            handles,
            conn: None,
            client_config: ClientConfig::empty(),
            buffer: CommandBuffer::new(command_capacity),
            callback: None,
        }
    }

    pub fn handles(&self) -> &ServiceHandles {
        &self.handles
    }

    /// Attribute-layer connection, if any
    pub fn connection(&self) -> Option<ConnHandle> {
        self.conn
    }

    pub fn client_config(&self) -> ClientConfig {
        self.client_config
    }

    pub fn notifications_enabled(&self) -> bool {
        self.client_config.contains(ClientConfig::NOTIFY)
    }

    pub fn indications_enabled(&self) -> bool {
        self.client_config.contains(ClientConfig::INDICATE)
    }

    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.buffer
    }

    /// Consume the pending command
    pub fn take_command(&mut self) -> Option<Vec<u8>> {
        self.buffer.take()
    }

    /// Register the application command hook, replacing any earlier one
    pub fn set_callback(&mut self, callback: CommandCallback) {
        self.callback = Some(callback);
    }

    /// Attribute layer came up on `conn`
    pub fn on_connected(&mut self, conn: ConnHandle) {
        self.conn = Some(conn);
        self.client_config = ClientConfig::empty();
    }

    /// Attribute layer went down. Delivery modes are per connection.
    pub fn on_disconnected(&mut self, conn: ConnHandle) {
        if self.conn == Some(conn) {
            self.conn = None;
        }
        self.client_config = ClientConfig::empty();
    }

    /// Transport-reported change of a delivery mode on `handle`
    pub fn on_client_config_event(&mut self, handle: u16, mode: ClientConfig, enabled: bool) {
        if handle != self.handles.response && handle != self.handles.response_cccd {
            return;
        }
        self.client_config.set(mode, enabled);
        debug!("Response delivery modes now {:?}", self.client_config);
    }

    /// Peer confirmed an indication. Nothing is outstanding per indication
    /// yet, so there is nothing to release.
    pub fn on_indication_confirmed(&mut self, conn: ConnHandle) {
        trace!("Indication confirmed on {}", conn);
    }

    /// Handle an inbound write.
    ///
    /// Every write request to a service handle gets exactly one write or
    /// error response. Writes to other handles are left alone.
    pub fn handle_write<G: GattServerOps + ?Sized>(
        &mut self,
        gatt: &mut G,
        kind: WriteKind,
        params: &WriteParams,
    ) -> LinkResult<WriteOutcome> {
        if self.conn != Some(params.conn) {
            warn!("{} on unknown connection {}", kind, params.conn);
            return Err(LinkError::InvalidParameter(format!(
                "{} on unknown connection {}",
                kind, params.conn
            )));
        }

        if params.handle == self.handles.command {
            self.write_command_value(gatt, kind, params)
        } else if params.handle == self.handles.response_cccd && kind == WriteKind::Request {
            self.write_client_config(gatt, params)
        } else {
            trace!("{} to handle {:#06x} not handled", kind, params.handle);
            Ok(WriteOutcome::NotHandled)
        }
    }

    fn write_command_value<G: GattServerOps + ?Sized>(
        &mut self,
        gatt: &mut G,
        kind: WriteKind,
        params: &WriteParams,
    ) -> LinkResult<WriteOutcome> {
        let value = params.value.as_slice();

        if value.len() > self.buffer.capacity() {
            self.refuse(gatt, kind, params, AttErrorCode::InvalidAttributeValueLength)?;
            return Err(LinkError::InvalidParameter(format!(
                "command of {} bytes exceeds capacity {}",
                value.len(),
                self.buffer.capacity()
            )));
        }

        if let Err(code) = gatt.write_attribute_local(params.handle, value) {
            self.refuse(gatt, kind, params, code)?;
            return Err(LinkError::InvalidOperation);
        }

        if kind == WriteKind::Request {
            gatt.send_write_response(params.conn)?;
        }

        if value.is_empty() {
            return Ok(WriteOutcome::Command { buffered: false });
        }

        debug!("Command received: {}", hex::encode(value));
        if !self.buffer.offer(value) {
            debug!("Command pending, dropping new command");
            return Ok(WriteOutcome::Command { buffered: false });
        }
        if let Some(callback) = self.callback.as_mut() {
            callback(value);
        }
        Ok(WriteOutcome::Command { buffered: true })
    }

    fn write_client_config<G: GattServerOps + ?Sized>(
        &mut self,
        gatt: &mut G,
        params: &WriteParams,
    ) -> LinkResult<WriteOutcome> {
        let value = params.value.as_slice();
        let stored = gatt.write_cccd(params.conn, params.handle, value).and_then(|()| {
            ClientConfig::from_cccd(value).ok_or(AttErrorCode::InvalidAttributeValueLength)
        });

        match stored {
            Ok(config) => {
                gatt.send_write_response(params.conn)?;
                self.client_config = config;
                debug!("Response delivery modes now {:?}", config);
                Ok(WriteOutcome::ClientConfig(config))
            }
            Err(code) => {
                self.refuse(gatt, WriteKind::Request, params, code)?;
                Err(LinkError::InvalidOperation)
            }
        }
    }

    fn refuse<G: GattServerOps + ?Sized>(
        &self,
        gatt: &mut G,
        kind: WriteKind,
        params: &WriteParams,
        code: AttErrorCode,
    ) -> LinkResult<()> {
        warn!(
            "Refusing {} to handle {:#06x}: {}",
            kind, params.handle, code
        );
        if kind == WriteKind::Request {
            gatt.send_error_response(params.conn, ATT_WRITE_REQ, params.handle, code)?;
        }
        Ok(())
    }

    /// Check that a notification can be sent now and return its link.
    pub fn notify_target<G: GattServerOps + ?Sized>(&self, gatt: &G) -> LinkResult<ConnHandle> {
        let conn = self.conn.ok_or(LinkError::NoConnection)?;
        if gatt.connection_state(conn) < ConnState::Connected {
            return Err(LinkError::NoConnection);
        }
        if !self.notifications_enabled() {
            return Err(LinkError::NotificationDisabled);
        }
        Ok(conn)
    }

    /// Send `payload` as one notification, truncated to the MTU.
    ///
    /// Returns the delivered length. Does not wait for the transport.
    pub fn notify<G: GattServerOps + ?Sized>(
        &self,
        gatt: &mut G,
        mtu: &MtuTracker,
        payload: &[u8],
    ) -> LinkResult<usize> {
        let conn = self.notify_target(gatt)?;
        let value = truncate_to_mtu(payload, mtu.current());
        if value.len() < payload.len() {
            debug!(
                "Truncating notification from {} to {} bytes",
                payload.len(),
                value.len()
            );
        }
        gatt.send_notification(conn, self.handles.response, value)?;
        Ok(value.len())
    }

    /// Send `payload` as one indication, truncated to the MTU.
    ///
    /// Returns the delivered length. The confirmation arrives later as an
    /// event.
    pub fn indicate<G: GattServerOps + ?Sized>(
        &self,
        gatt: &mut G,
        mtu: &MtuTracker,
        payload: &[u8],
    ) -> LinkResult<usize> {
        if payload.is_empty() {
            return Err(LinkError::InvalidParameter("empty response".into()));
        }
        let conn = self.conn.ok_or(LinkError::InvalidState)?;
        if gatt.connection_state(conn) < ConnState::Connected {
            return Err(LinkError::InvalidState);
        }
        if !self.indications_enabled() {
            return Err(LinkError::IndicationDisabled);
        }

        let value = truncate_to_mtu(payload, mtu.current());
        if value.len() < payload.len() {
            debug!(
                "Truncating indication from {} to {} bytes",
                payload.len(),
                value.len()
            );
        }
        gatt.send_indication(conn, self.handles.response, value)?;
        Ok(value.len())
    }
}

impl fmt::Debug for HostInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostInterface")
            .field("handles", &self.handles)
            .field("conn", &self.conn)
            .field("client_config", &self.client_config)
            .field("buffer", &self.buffer)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
