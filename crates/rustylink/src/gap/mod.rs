//! GAP vocabulary shared by the connection state machine and the transport
//!
//! Device addresses, the active connection handle and the connection
//! parameter update request with its range checks.

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::*;
