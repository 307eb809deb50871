//! Events delivered by the transport

use super::types::*;
use crate::gap::ConnHandle;
use crate::smp::{AuthInfo, SecurityKeys};
use std::fmt;

/// Every event the transport can deliver to the peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    // General events
    /// Stack is up and ready
    StackOn,
    /// Stack has shut down
    StackOff,
    /// Unrecoverable controller failure
    HardwareError,
    /// Stack busy status changed
    StackBusyStatus { busy: bool },
    /// Transmit power set
    TxPowerSet,
    /// LE event mask set
    EventMaskSet,
    /// Device address programmed into the controller
    SetDeviceAddressComplete,
    /// Device address read back from the controller
    DeviceAddressResolved(DeviceAddresses),
    /// Stack shutdown finished
    ShutdownComplete,
    /// Data length changed on the link
    DataLengthChanged(DataLength),
    /// Suggested data length read
    GetDataLengthComplete(DataLength),
    /// Default PHY set
    DefaultPhySet,
    /// Transport timer or procedure timeout
    Timeout { code: u8 },

    // GAP events
    /// Key generation finished
    KeysGenerated(SecurityKeys),
    /// Peer asked to authenticate
    AuthRequested(AuthInfo),
    /// Peer expects a passkey to be typed
    PasskeyEntryRequested,
    /// Passkey to show to the user
    PasskeyDisplay(u32),
    /// Numeric comparison value to confirm
    NumericComparisonRequested(u32),
    /// Key exchange finished
    KeyExchangeComplete,
    /// Authentication parameters the SMP negotiated
    NegotiatedAuthInfo(AuthInfo),
    /// Pairing finished successfully
    AuthComplete(AuthInfo),
    /// Pairing failed
    AuthFailed(AuthInfo),
    /// Advertising started or stopped
    AdvertisingStartStop,
    /// Link established (legacy or enhanced)
    DeviceConnected(ConnectionInfo),
    /// Peer answered an L2CAP connection parameter update request
    ConnParamUpdateResponse { accepted: bool },
    /// Controller applied new connection parameters
    ConnectionUpdated(ConnParamsUpdated),
    /// Link torn down
    DeviceDisconnected(DisconnectInfo),
    /// Encryption state changed
    EncryptionChanged { enabled: bool },

    // GATT events
    /// Attribute layer connected
    GattConnected(ConnHandle),
    /// Attribute layer disconnected
    GattDisconnected(ConnHandle),
    /// Peer requested an MTU exchange
    MtuExchangeRequested { conn: ConnHandle, mtu: u16 },
    /// Acknowledged attribute write
    WriteRequest(WriteParams),
    /// Unacknowledged attribute write
    WriteCommand(WriteParams),
    /// Peer reads an attribute that needs application access
    ReadAccessRequest { conn: ConnHandle, handle: u16 },
    /// Peer confirmed an indication
    IndicationConfirmed(ConnHandle),
    /// Notifications enabled on a characteristic
    NotificationEnabled { conn: ConnHandle, handle: u16 },
    /// Notifications disabled on a characteristic
    NotificationDisabled { conn: ConnHandle, handle: u16 },
    /// Indications enabled on a characteristic
    IndicationEnabled { conn: ConnHandle, handle: u16 },
    /// Indications disabled on a characteristic
    IndicationDisabled { conn: ConnHandle, handle: u16 },

    // Other events
    /// Bonding data changed and must be persisted
    PendingFlashWrite,
    /// Event this layer does not know
    Other(u32),
}

impl TransportEvent {
    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::StackOn => "STACK_ON",
            TransportEvent::StackOff => "STACK_OFF",
            TransportEvent::HardwareError => "HARDWARE_ERROR",
            TransportEvent::StackBusyStatus { .. } => "STACK_BUSY_STATUS",
            TransportEvent::TxPowerSet => "SET_TX_PWR_COMPLETE",
            TransportEvent::EventMaskSet => "LE_SET_EVENT_MASK_COMPLETE",
            TransportEvent::SetDeviceAddressComplete => "SET_DEVICE_ADDR_COMPLETE",
            TransportEvent::DeviceAddressResolved(_) => "GET_DEVICE_ADDR_COMPLETE",
            TransportEvent::ShutdownComplete => "STACK_SHUTDOWN_COMPLETE",
            TransportEvent::DataLengthChanged(_) => "DATA_LENGTH_CHANGE",
            TransportEvent::GetDataLengthComplete(_) => "GET_DATA_LENGTH_COMPLETE",
            TransportEvent::DefaultPhySet => "SET_DEFAULT_PHY_COMPLETE",
            TransportEvent::Timeout { .. } => "TIMEOUT",
            TransportEvent::KeysGenerated(_) => "GAP_KEYS_GEN_COMPLETE",
            TransportEvent::AuthRequested(_) => "GAP_AUTH_REQ",
            TransportEvent::PasskeyEntryRequested => "GAP_PASSKEY_ENTRY_REQUEST",
            TransportEvent::PasskeyDisplay(_) => "GAP_PASSKEY_DISPLAY_REQUEST",
            TransportEvent::NumericComparisonRequested(_) => "GAP_NUMERIC_COMPARISON_REQUEST",
            TransportEvent::KeyExchangeComplete => "GAP_KEYINFO_EXCHNGE_CMPLT",
            TransportEvent::NegotiatedAuthInfo(_) => "GAP_SMP_NEGOTIATED_AUTH_INFO",
            TransportEvent::AuthComplete(_) => "GAP_AUTH_COMPLETE",
            TransportEvent::AuthFailed(_) => "GAP_AUTH_FAILED",
            TransportEvent::AdvertisingStartStop => "GAPP_ADVERTISEMENT_START_STOP",
            TransportEvent::DeviceConnected(info) if info.enhanced => "GAP_ENHANCE_CONN_COMPLETE",
            TransportEvent::DeviceConnected(_) => "GAP_DEVICE_CONNECTED",
            TransportEvent::ConnParamUpdateResponse { .. } => "L2CAP_CONN_PARAM_UPDATE_RSP",
            TransportEvent::ConnectionUpdated(_) => "GAP_CONNECTION_UPDATE_COMPLETE",
            TransportEvent::DeviceDisconnected(_) => "GAP_DEVICE_DISCONNECTED",
            TransportEvent::EncryptionChanged { .. } => "GAP_ENCRYPT_CHANGE",
            TransportEvent::GattConnected(_) => "GATT_CONNECT_IND",
            TransportEvent::GattDisconnected(_) => "GATT_DISCONNECT_IND",
            TransportEvent::MtuExchangeRequested { .. } => "GATTS_XCNHG_MTU_REQ",
            TransportEvent::WriteRequest(_) => "GATTS_WRITE_REQ",
            TransportEvent::WriteCommand(_) => "GATTS_WRITE_CMD_REQ",
            TransportEvent::ReadAccessRequest { .. } => "GATTS_READ_CHAR_VAL_ACCESS_REQ",
            TransportEvent::IndicationConfirmed(_) => "GATTS_HANDLE_VALUE_CNF",
            TransportEvent::NotificationEnabled { .. } => "GATTS_NOTIFICATION_ENABLED",
            TransportEvent::NotificationDisabled { .. } => "GATTS_NOTIFICATION_DISABLED",
            TransportEvent::IndicationEnabled { .. } => "GATTS_INDICATION_ENABLED",
            TransportEvent::IndicationDisabled { .. } => "GATTS_INDICATION_DISABLED",
            TransportEvent::PendingFlashWrite => "PENDING_FLASH_WRITE",
            TransportEvent::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::Other(code) => write!(f, "Other event: {:#x}", code),
            other => f.write_str(other.name()),
        }
    }
}
