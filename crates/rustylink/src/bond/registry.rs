use crate::error::LinkResult;
use crate::transport::{BondStore, BondedDevice};
use log::{debug, info};

/// View of the transport's bond list
///
/// When bonding is disabled every query returns an empty answer and
/// `clear_all` does nothing, so callers keep a single code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondRegistry {
    enabled: bool,
}

impl BondRegistry {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether bonding is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bonded devices, newest index first
    pub fn list(&self, store: &dyn BondStore) -> LinkResult<Vec<BondedDevice>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        let mut devices = store.bonded_devices()?;
        devices.reverse();
        Ok(devices)
    }

    /// Number of bonded devices
    pub fn count(&self, store: &dyn BondStore) -> LinkResult<usize> {
        Ok(self.list(store)?.len())
    }

    /// Whether a device with this handle is currently bonded
    pub fn contains(&self, store: &dyn BondStore, bd_handle: u8) -> LinkResult<bool> {
        Ok(self
            .list(store)?
            .iter()
            .any(|device| device.bd_handle == bd_handle))
    }

    /// Remove every bonded device
    pub fn clear_all(&self, store: &mut dyn BondStore) -> LinkResult<()> {
        if !self.enabled {
            debug!("Bonding disabled, skip clearing the bond list");
            return Ok(());
        }
        store.remove_all_bonded()?;
        info!("Bond list cleared");
        Ok(())
    }

    /// Log the current bond list
    pub fn log_bonds(&self, store: &dyn BondStore) -> LinkResult<()> {
        let devices = self.list(store)?;
        info!("Bond list: {} device(s)", devices.len());
        for (index, device) in devices.iter().enumerate() {
            info!("  {}. {}", index + 1, device);
        }
        Ok(())
    }
}
