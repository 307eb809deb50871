use crate::error::{LinkError, LinkResult};
use crate::gap::constants::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            PUBLIC_DEVICE_ADDRESS => AddressType::Public,
            RANDOM_DEVICE_ADDRESS => AddressType::Random,
            PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::PublicIdentity => PUBLIC_IDENTITY_ADDRESS,
            AddressType::RandomIdentity => RANDOM_IDENTITY_ADDRESS,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public | AddressType::PublicIdentity => write!(f, "Public"),
            AddressType::Random | AddressType::RandomIdentity => write!(f, "Random"),
        }
    }
}

/// Bluetooth device address, stored little-endian as it travels on air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr {
    pub bytes: [u8; BD_ADDR_SIZE],
}

impl BdAddr {
    pub fn new(bytes: [u8; BD_ADDR_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= BD_ADDR_SIZE {
            let mut bytes = [0u8; BD_ADDR_SIZE];
            bytes.copy_from_slice(&slice[0..BD_ADDR_SIZE]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// The all-zero address, used by transports as "every bonded device".
    pub fn is_unset(&self) -> bool {
        self.bytes == [0u8; BD_ADDR_SIZE]
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// Identifies the one active link: the transport's device handle plus the
/// attribute-layer connection id assigned when GATT connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnHandle {
    /// Transport-assigned device (bond) handle
    pub bd_handle: u8,
    /// Attribute-interface id
    pub att_id: u8,
}

impl ConnHandle {
    pub fn new(bd_handle: u8, att_id: u8) -> Self {
        Self { bd_handle, att_id }
    }
}

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bdHandle={:#04x} attId={:#04x}", self.bd_handle, self.att_id)
    }
}

/// LE connection parameter update request, in controller units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnParamUpdate {
    /// Device handle of the link to update
    pub bd_handle: u8,
    /// Minimum connection interval (1.25 ms units)
    pub interval_min: u16,
    /// Maximum connection interval (1.25 ms units)
    pub interval_max: u16,
    /// Peripheral latency in connection events
    pub latency: u16,
    /// Supervision timeout (10 ms units)
    pub supervision_timeout: u16,
}

impl ConnParamUpdate {
    /// Build a request, rejecting any value outside the ranges the link layer allows.
    pub fn new(
        bd_handle: u8,
        interval_min: u16,
        interval_max: u16,
        latency: u16,
        supervision_timeout: u16,
    ) -> LinkResult<Self> {
        let interval_ok = |v: u16| (CONN_INTERVAL_MIN..=CONN_INTERVAL_MAX).contains(&v);

        if !interval_ok(interval_min) {
            return Err(LinkError::InvalidParameter(format!(
                "interval_min {} outside {}..={}",
                interval_min, CONN_INTERVAL_MIN, CONN_INTERVAL_MAX
            )));
        }
        if !interval_ok(interval_max) {
            return Err(LinkError::InvalidParameter(format!(
                "interval_max {} outside {}..={}",
                interval_max, CONN_INTERVAL_MIN, CONN_INTERVAL_MAX
            )));
        }
        if latency > CONN_LATENCY_MAX {
            return Err(LinkError::InvalidParameter(format!(
                "slave latency {} above {}",
                latency, CONN_LATENCY_MAX
            )));
        }
        if !(SUPERVISION_TIMEOUT_MIN..=SUPERVISION_TIMEOUT_MAX).contains(&supervision_timeout) {
            return Err(LinkError::InvalidParameter(format!(
                "timeout multiplier {} outside {}..={}",
                supervision_timeout, SUPERVISION_TIMEOUT_MIN, SUPERVISION_TIMEOUT_MAX
            )));
        }

        Ok(Self {
            bd_handle,
            interval_min,
            interval_max,
            latency,
            supervision_timeout,
        })
    }
}

/// Convert a connection interval in 1.25 ms units to milliseconds.
pub fn interval_to_ms(units: u16) -> f32 {
    units as f32 * CONN_INTERVAL_UNIT_US as f32 / 1000.0
}

/// Convert a supervision timeout in 10 ms units to milliseconds.
pub fn supervision_timeout_to_ms(units: u16) -> u32 {
    units as u32 * SUPERVISION_TIMEOUT_UNIT_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bd_addr_display_is_msb_first() {
        let addr = BdAddr::new([0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
        assert_eq!(addr.to_string(), "00:11:22:33:44:55");
        assert!(!addr.is_unset());
        assert!(BdAddr::default().is_unset());
    }

    #[test]
    fn test_conn_param_bounds_inclusive() {
        assert!(ConnParamUpdate::new(0, 6, 3200, 500, 10).is_ok());
        assert!(ConnParamUpdate::new(0, 6, 6, 0, 3200).is_ok());
        assert!(ConnParamUpdate::new(0, 5, 8, 0, 100).is_err());
        assert!(ConnParamUpdate::new(0, 6, 3201, 0, 100).is_err());
        assert!(ConnParamUpdate::new(0, 6, 8, 501, 100).is_err());
        assert!(ConnParamUpdate::new(0, 6, 8, 0, 9).is_err());
        assert!(ConnParamUpdate::new(0, 6, 8, 0, 3201).is_err());
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(interval_to_ms(8), 10.0);
        assert_eq!(supervision_timeout_to_ms(200), 2000);
    }

    proptest! {
        #[test]
        fn conn_param_accepts_exactly_the_allowed_ranges(
            min in 0u16..4000,
            max in 0u16..4000,
            latency in 0u16..1000,
            timeout in 0u16..4000,
        ) {
            let valid = (6..=3200).contains(&min)
                && (6..=3200).contains(&max)
                && latency <= 500
                && (10..=3200).contains(&timeout);
            let result = ConnParamUpdate::new(1, min, max, latency, timeout);
            prop_assert_eq!(result.is_ok(), valid);
            if let Err(err) = result {
                prop_assert!(matches!(err, LinkError::InvalidParameter(_)));
            }
        }
    }
}
