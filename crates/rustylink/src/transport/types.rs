//! State and parameter types exchanged with the transport

use crate::gap::{interval_to_ms, supervision_timeout_to_ms, AddressType, BdAddr, ConnHandle};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::{Cursor, Read};

/// HCI LE subevent code for a legacy connection complete
pub const LE_CONN_COMPLETE_SUBEVENT: u8 = 0x01;
/// HCI LE subevent code for an enhanced connection complete
pub const LE_ENHANCED_CONN_COMPLETE_SUBEVENT: u8 = 0x0A;

/// Power state of the BLE stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    /// Stack is not running
    Stopped,
    /// Stack is starting
    Starting,
    /// Stack is up
    On,
    /// Stack is shutting down
    Stopping,
}

/// Advertising state reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvState {
    Stopped,
    Initializing,
    Advertising,
    Stopping,
}

/// Per-link connection state, ordered by how far the link got
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
    Encrypted,
}

/// Advertising flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingMode {
    /// Short interval, quick discovery
    Fast,
    /// Long interval, power saving
    Slow,
}

/// Preferred physical layer rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phy {
    Le1M,
    Le2M,
    LeCoded,
}

/// Stack library version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u16,
}

impl fmt::Display for StackVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

/// One entry of the transport's persisted bond list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondedDevice {
    /// Peer address
    pub address: BdAddr,
    /// Peer address type
    pub address_type: AddressType,
    /// Device handle the transport assigned to this bond
    pub bd_handle: u8,
}

impl fmt::Display for BondedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Peer {} Address: {}, bdHandle: {:#x}",
            self.address_type, self.address, self.bd_handle
        )
    }
}

/// Public and private addresses of this device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceAddresses {
    pub public: BdAddr,
    pub private: BdAddr,
}

/// Parameters of an established link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// HCI status, 0 on success
    pub status: u8,
    /// Device handle assigned to the peer
    pub bd_handle: u8,
    /// Peer address
    pub peer_address: BdAddr,
    /// Peer address type
    pub peer_address_type: AddressType,
    /// Connection interval (1.25 ms units)
    pub interval: u16,
    /// Peripheral latency
    pub latency: u16,
    /// Supervision timeout (10 ms units)
    pub supervision_timeout: u16,
    /// Whether the transport reported an enhanced connection complete
    pub enhanced: bool,
}

impl ConnectionInfo {
    /// Parse the parameters of an HCI LE (enhanced) connection complete
    /// subevent, subevent code first.
    pub fn parse(params: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(params);
        let subevent = cursor.read_u8().ok()?;
        let enhanced = match subevent {
            LE_CONN_COMPLETE_SUBEVENT => false,
            LE_ENHANCED_CONN_COMPLETE_SUBEVENT => true,
            _ => return None,
        };

        let status = cursor.read_u8().ok()?;
        let handle = cursor.read_u16::<LittleEndian>().ok()?;
        let _role = cursor.read_u8().ok()?;
        let peer_address_type = AddressType::from(cursor.read_u8().ok()?);

        let mut addr = [0u8; 6];
        cursor.read_exact(&mut addr).ok()?;

        if enhanced {
            // Local and peer resolvable private addresses
            let mut skip = [0u8; 12];
            cursor.read_exact(&mut skip).ok()?;
        }

        let interval = cursor.read_u16::<LittleEndian>().ok()?;
        let latency = cursor.read_u16::<LittleEndian>().ok()?;
        let supervision_timeout = cursor.read_u16::<LittleEndian>().ok()?;
        let _clock_accuracy = cursor.read_u8().ok()?;

        Some(Self {
            status,
            bd_handle: (handle & 0x00FF) as u8,
            peer_address: BdAddr::new(addr),
            peer_address_type,
            interval,
            latency,
            supervision_timeout,
            enhanced,
        })
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status={:#x} bdHandle={:#x} interval={:.2}ms latency={} supervisionTO={}ms peer={} ({})",
            self.status,
            self.bd_handle,
            interval_to_ms(self.interval),
            self.latency,
            supervision_timeout_to_ms(self.supervision_timeout),
            self.peer_address,
            self.peer_address_type
        )
    }
}

/// Link teardown report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectInfo {
    pub bd_handle: u8,
    pub reason: u8,
    pub status: u8,
}

/// Connection parameters after an update completed in the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnParamsUpdated {
    pub interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

/// Data length change report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataLength {
    pub max_tx_octets: u16,
    pub max_tx_time: u16,
    pub max_rx_octets: u16,
    pub max_rx_time: u16,
}

/// An inbound attribute write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteParams {
    /// Link the write arrived on
    pub conn: ConnHandle,
    /// Target attribute handle
    pub handle: u16,
    /// Written value
    pub value: Vec<u8>,
}

impl WriteParams {
    pub fn new(conn: ConnHandle, handle: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            conn,
            handle,
            value: value.into(),
        }
    }
}
