//! Error types for the rustylink library
//!
//! Every fallible operation of the peripheral returns [`LinkResult`]. Codes the
//! transport reports and this layer does not interpret travel through
//! unchanged as [`LinkError::Transport`].

use std::fmt;
use thiserror::Error;

/// Raw status code reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Errors produced by the peripheral protocol layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no connection")]
    NoConnection,

    #[error("invalid state")]
    InvalidState,

    #[error("notification is disabled")]
    NotificationDisabled,

    #[error("indication is disabled")]
    IndicationDisabled,

    #[error("invalid operation")]
    InvalidOperation,

    #[error("transport did not become idle within the poll budget")]
    Timeout,

    #[error("controller hardware fault")]
    HardwareFault,

    #[error("transport error {0}")]
    Transport(StatusCode),
}

impl LinkError {
    /// Whether the peripheral must stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::HardwareFault)
    }
}

impl From<StatusCode> for LinkError {
    fn from(code: StatusCode) -> Self {
        LinkError::Transport(code)
    }
}

/// Result type for peripheral operations
pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_codes_pass_through() {
        let err: LinkError = StatusCode(0x0104).into();
        assert_eq!(err, LinkError::Transport(StatusCode(0x0104)));
        assert_eq!(err.to_string(), "transport error 0x0104");
        assert!(!err.is_fatal());
        assert!(LinkError::HardwareFault.is_fatal());
    }
}
