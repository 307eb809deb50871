//! Attribute Protocol (ATT) pieces used by the peripheral
//!
//! The transport owns the attribute database and the wire protocol; this
//! module carries the constants and error codes the custom service needs to
//! answer writes, plus the negotiated MTU tracker.

pub mod constants;
pub mod error;
pub mod mtu;

// Re-export the public API
pub use self::constants::*;
pub use self::error::AttErrorCode;
pub use self::mtu::MtuTracker;
