//! Peripheral configuration
//!
//! Capability flags are plain fields checked at run time, so a bonding and a
//! non-bonding peripheral can both be built and tested from one binary.

use super::poll::PollBudget;
use crate::att::{ATT_DEFAULT_MTU, ATT_MAX_MTU, ATT_MAX_VALUE_LEN};
use crate::error::{LinkError, LinkResult};
use crate::gatt::{ServiceHandles, DEFAULT_COMMAND_CAPACITY};
use crate::smp::{
    KeyDistribution, SecurityConfig, SMP_MAX_ENCRYPTION_KEY_SIZE, SMP_MIN_ENCRYPTION_KEY_SIZE,
};
use crate::transport::AdvertisingMode;

/// How the peripheral advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingConfig {
    /// Advertising flavour used on every (re)start
    pub mode: AdvertisingMode,
    /// Index of the peripheral profile configuration in the transport
    pub profile: u8,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            mode: AdvertisingMode::Fast,
            profile: 0,
        }
    }
}

/// Configuration of a [`Peripheral`](super::Peripheral)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralConfig {
    /// Keep a bond list; when false the bond registry answers empty
    pub bonding: bool,
    /// Ask for the 2M PHY once keys are generated
    pub phy_update: bool,
    /// Wait for interrupts in a low-power state between polls
    pub low_power: bool,
    /// Local security requirements
    pub security: SecurityConfig,
    /// Largest ATT MTU this implementation accepts
    pub max_mtu: u16,
    /// Advertising parameters
    pub advertising: AdvertisingConfig,
    /// Keys this device distributes
    pub local_keys: KeyDistribution,
    /// Keys exchanged with peers
    pub exchange_keys: KeyDistribution,
    /// Largest command accepted on the command characteristic
    pub command_capacity: usize,
    /// Bound of every busy-wait
    pub busy_wait: PollBudget,
    /// Attribute handles of the host interface service
    pub handles: ServiceHandles,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            bonding: true,
            phy_update: true,
            low_power: false,
            security: SecurityConfig::default(),
            max_mtu: ATT_MAX_MTU,
            advertising: AdvertisingConfig::default(),
            local_keys: KeyDistribution::local_default(),
            exchange_keys: KeyDistribution::exchange_default(),
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            busy_wait: PollBudget::default(),
            handles: ServiceHandles::default(),
        }
    }
}

impl PeripheralConfig {
    /// A peripheral that neither pairs nor bonds
    pub fn open() -> Self {
        Self {
            bonding: false,
            security: SecurityConfig::no_security(),
            ..Self::default()
        }
    }

    /// Reject inconsistent configurations
    pub fn validate(&self) -> LinkResult<()> {
        if !(ATT_DEFAULT_MTU..=ATT_MAX_MTU).contains(&self.max_mtu) {
            return Err(LinkError::InvalidParameter(format!(
                "max_mtu {} outside {}..={}",
                self.max_mtu, ATT_DEFAULT_MTU, ATT_MAX_MTU
            )));
        }
        if !(SMP_MIN_ENCRYPTION_KEY_SIZE..=SMP_MAX_ENCRYPTION_KEY_SIZE)
            .contains(&self.security.key_size)
        {
            return Err(LinkError::InvalidParameter(format!(
                "key size {} outside {}..={}",
                self.security.key_size, SMP_MIN_ENCRYPTION_KEY_SIZE, SMP_MAX_ENCRYPTION_KEY_SIZE
            )));
        }
        if self.security.bonding && !self.bonding {
            return Err(LinkError::InvalidParameter(
                "security asks for bonding but bonding is disabled".into(),
            ));
        }
        if !self.exchange_keys.contains(self.local_keys) {
            return Err(LinkError::InvalidParameter(format!(
                "local keys {:?} not part of exchanged keys {:?}",
                self.local_keys, self.exchange_keys
            )));
        }
        if self.command_capacity == 0 || self.command_capacity > ATT_MAX_VALUE_LEN {
            return Err(LinkError::InvalidParameter(format!(
                "command capacity {} outside 1..={}",
                self.command_capacity, ATT_MAX_VALUE_LEN
            )));
        }
        if !self.handles.is_valid() {
            return Err(LinkError::InvalidParameter(format!(
                "service handles {:?} must be distinct and non-zero",
                self.handles
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PeripheralConfig::default().validate().unwrap();
        PeripheralConfig::open().validate().unwrap();
    }

    #[test]
    fn test_inconsistent_configs_are_rejected() {
        let cases = [
            PeripheralConfig {
                max_mtu: 22,
                ..PeripheralConfig::default()
            },
            PeripheralConfig {
                bonding: false,
                ..PeripheralConfig::default()
            },
            PeripheralConfig {
                command_capacity: 0,
                ..PeripheralConfig::default()
            },
            PeripheralConfig {
                local_keys: KeyDistribution::RESP_LINK_KEY,
                ..PeripheralConfig::default()
            },
            PeripheralConfig {
                security: SecurityConfig {
                    key_size: 6,
                    ..SecurityConfig::default()
                },
                ..PeripheralConfig::default()
            },
        ];
        for config in cases {
            assert!(matches!(
                config.validate(),
                Err(LinkError::InvalidParameter(_))
            ));
        }
    }
}
