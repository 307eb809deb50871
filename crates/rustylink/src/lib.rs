//! RustyLink - application-level protocol logic for a BLE peripheral
//!
//! This library sits on top of a BLE stack and drives it as a peripheral.
//! It owns the connection lifecycle, the pairing and bonding policy, and a
//! command/response channel built on a custom GATT service. The stack
//! itself is reached through the [`transport`] traits, so the same logic
//! runs against real hardware bindings or the in-memory [`SimTransport`].

pub mod app;
pub mod att;
pub mod bond;
pub mod diag;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod smp;
pub mod transport;

// Re-export common types for convenience
pub use app::{LinkState, Peripheral, PeripheralConfig, PollBudget};
pub use att::{AttErrorCode, MtuTracker};
pub use bond::BondRegistry;
pub use diag::{Diagnostics, LogDiagnostics};
pub use error::{LinkError, LinkResult, StatusCode};
pub use gap::{AddressType, BdAddr, ConnHandle, ConnParamUpdate};
pub use gatt::{ClientConfig, CommandBuffer, HostInterface, ServiceHandles};
pub use smp::{AuthError, SecurityConfig, SecurityLevel, SecurityMode};
pub use transport::{SimTransport, Transport, TransportEvent};
