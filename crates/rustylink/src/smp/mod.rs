//! Security policy for the peripheral
//!
//! Pairing cryptography lives in the transport. This module holds what the
//! connection state machine decides with:
//! - The locally configured security requirements
//! - The security context mutated by every authentication event
//! - The key material generated by the transport
//! - The authentication failure taxonomy

mod constants;
mod keys;
mod types;

// Re-export public API
pub use self::constants::{SMP_MAX_ENCRYPTION_KEY_SIZE, SMP_MIN_ENCRYPTION_KEY_SIZE};
pub use self::keys::*;
pub use self::types::*;
