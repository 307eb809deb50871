//! The application layer of the peripheral
//!
//! This module ties the lower layers together:
//! - Configuration with run-time capability flags
//! - The session context carried between events
//! - The connection and security transition table
//! - Bounded busy-waiting on the transport
//! - The [`Peripheral`] that executes transitions and serves the application

pub mod config;
pub mod peripheral;
pub mod poll;
pub mod session;
pub mod state;

#[cfg(test)]
mod tests;

pub use config::{AdvertisingConfig, PeripheralConfig};
pub use peripheral::Peripheral;
pub use poll::{PollBudget, Poller};
pub use session::SessionContext;
pub use state::{transition, Action, LinkState, Policy, Transition};
