//! Type definitions for the security policy layer
use super::constants::*;
use std::fmt;

/// IO Capability types for pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    /// Display only capability
    DisplayOnly,
    /// Display with yes/no capability
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input, no output
    NoInputNoOutput,
    /// Both keyboard and display
    KeyboardDisplay,
}

impl IoCapability {
    /// Convert to u8 value for protocol
    pub fn to_u8(&self) -> u8 {
        match self {
            IoCapability::DisplayOnly => SMP_IO_CAPABILITY_DISPLAY_ONLY,
            IoCapability::DisplayYesNo => SMP_IO_CAPABILITY_DISPLAY_YES_NO,
            IoCapability::KeyboardOnly => SMP_IO_CAPABILITY_KEYBOARD_ONLY,
            IoCapability::NoInputNoOutput => SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT,
            IoCapability::KeyboardDisplay => SMP_IO_CAPABILITY_KEYBOARD_DISPLAY,
        }
    }
}

/// Security mode of an LE link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// Encryption based security
    Mode1,
    /// Data signing based security
    Mode2,
}

/// Security level within a mode, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No security (no authentication, no encryption)
    NoSecurity = 1,
    /// Unauthenticated pairing with encryption
    Unauthenticated = 2,
    /// Authenticated pairing with encryption
    Authenticated = 3,
    /// Authenticated LE Secure Connections pairing
    SecureConnections = 4,
}

impl SecurityLevel {
    /// Whether pairing is needed to reach this level
    pub fn requires_pairing(&self) -> bool {
        *self > SecurityLevel::NoSecurity
    }

    /// Whether this level needs MITM protection
    pub fn is_authenticated(&self) -> bool {
        *self >= SecurityLevel::Authenticated
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {}", *self as u8)
    }
}

/// Authentication failure taxonomy reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Authentication succeeded / no error recorded
    None,
    /// Passkey entry failed
    PasskeyEntryFailed,
    /// Out-of-band data not available
    OobNotAvailable,
    /// Authentication requirements cannot be met
    AuthenticationRequirements,
    /// Confirm value did not match
    ConfirmValueMismatch,
    /// Pairing not supported
    PairingNotSupported,
    /// Encryption key size insufficient
    InsufficientEncryptionKeySize,
    /// Command not supported
    CommandNotSupported,
    /// Unspecified reason
    Unspecified,
    /// Too many attempts
    RepeatedAttempts,
    /// Invalid parameters
    InvalidParameters,
    /// DHKey check failed
    DhKeyCheckFailed,
    /// Numeric comparison failed
    NumericComparisonFailed,
    /// Authentication timed out
    Timeout,
    /// Any other reason code
    Other(u8),
}

impl From<u8> for AuthError {
    fn from(value: u8) -> Self {
        match value {
            SMP_REASON_NONE => AuthError::None,
            SMP_REASON_PASSKEY_ENTRY_FAILED => AuthError::PasskeyEntryFailed,
            SMP_REASON_OOB_NOT_AVAILABLE => AuthError::OobNotAvailable,
            SMP_REASON_AUTHENTICATION_REQUIREMENTS => AuthError::AuthenticationRequirements,
            SMP_REASON_CONFIRM_VALUE_FAILED => AuthError::ConfirmValueMismatch,
            SMP_REASON_PAIRING_NOT_SUPPORTED => AuthError::PairingNotSupported,
            SMP_REASON_ENCRYPTION_KEY_SIZE => AuthError::InsufficientEncryptionKeySize,
            SMP_REASON_COMMAND_NOT_SUPPORTED => AuthError::CommandNotSupported,
            SMP_REASON_UNSPECIFIED_REASON => AuthError::Unspecified,
            SMP_REASON_REPEATED_ATTEMPTS => AuthError::RepeatedAttempts,
            SMP_REASON_INVALID_PARAMETERS => AuthError::InvalidParameters,
            SMP_REASON_DHKEY_CHECK_FAILED => AuthError::DhKeyCheckFailed,
            SMP_REASON_NUMERIC_COMPARISON_FAILED => AuthError::NumericComparisonFailed,
            SMP_REASON_AUTHENTICATION_TIMEOUT => AuthError::Timeout,
            other => AuthError::Other(other),
        }
    }
}

impl From<AuthError> for u8 {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::None => SMP_REASON_NONE,
            AuthError::PasskeyEntryFailed => SMP_REASON_PASSKEY_ENTRY_FAILED,
            AuthError::OobNotAvailable => SMP_REASON_OOB_NOT_AVAILABLE,
            AuthError::AuthenticationRequirements => SMP_REASON_AUTHENTICATION_REQUIREMENTS,
            AuthError::ConfirmValueMismatch => SMP_REASON_CONFIRM_VALUE_FAILED,
            AuthError::PairingNotSupported => SMP_REASON_PAIRING_NOT_SUPPORTED,
            AuthError::InsufficientEncryptionKeySize => SMP_REASON_ENCRYPTION_KEY_SIZE,
            AuthError::CommandNotSupported => SMP_REASON_COMMAND_NOT_SUPPORTED,
            AuthError::Unspecified => SMP_REASON_UNSPECIFIED_REASON,
            AuthError::RepeatedAttempts => SMP_REASON_REPEATED_ATTEMPTS,
            AuthError::InvalidParameters => SMP_REASON_INVALID_PARAMETERS,
            AuthError::DhKeyCheckFailed => SMP_REASON_DHKEY_CHECK_FAILED,
            AuthError::NumericComparisonFailed => SMP_REASON_NUMERIC_COMPARISON_FAILED,
            AuthError::Timeout => SMP_REASON_AUTHENTICATION_TIMEOUT,
            AuthError::Other(code) => code,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::ConfirmValueMismatch => write!(f, "CONFIRM_VALUE_NOT_MATCH"),
            AuthError::InsufficientEncryptionKeySize => {
                write!(f, "INSUFFICIENT_ENCRYPTION_KEY_SIZE")
            }
            AuthError::Unspecified => write!(f, "UNSPECIFIED_REASON"),
            AuthError::Timeout => write!(f, "AUTHENTICATION_TIMEOUT"),
            other => write!(f, "{:#x}", u8::from(*other)),
        }
    }
}

/// Locally configured security requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Security mode
    pub mode: SecurityMode,
    /// Minimum security level
    pub level: SecurityLevel,
    /// Whether to bond with the peer
    pub bonding: bool,
    /// Encryption key size (7-16)
    pub key_size: u8,
    /// Local IO capability
    pub io_capability: IoCapability,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            mode: SecurityMode::Mode1,
            level: SecurityLevel::Unauthenticated,
            bonding: true,
            key_size: SMP_MAX_ENCRYPTION_KEY_SIZE,
            io_capability: IoCapability::NoInputNoOutput,
        }
    }
}

impl SecurityConfig {
    /// Configuration that never pairs
    pub fn no_security() -> Self {
        Self {
            level: SecurityLevel::NoSecurity,
            bonding: false,
            ..Self::default()
        }
    }

    pub fn is_no_security(&self) -> bool {
        self.mode == SecurityMode::Mode1 && self.level == SecurityLevel::NoSecurity
    }
}

/// Authentication parameters exchanged with the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthInfo {
    /// Device handle of the peer
    pub bd_handle: u8,
    /// Security mode
    pub mode: SecurityMode,
    /// Security level
    pub level: SecurityLevel,
    /// Bonding flag
    pub bonding: bool,
    /// Encryption key size
    pub key_size: u8,
    /// Authentication error, `AuthError::None` on success
    pub error: AuthError,
}

impl fmt::Display for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bdHandle={:#x}, security={:?}/{}, bonding={}, ekeySize={}, err={}",
            self.bd_handle, self.mode, self.level, self.bonding, self.key_size, self.error
        )
    }
}

/// Security context of the single security configuration, owned by the
/// connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    config: SecurityConfig,
    bd_handle: u8,
    last_error: AuthError,
}

impl SecurityContext {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config,
            bd_handle: 0,
            last_error: AuthError::None,
        }
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Last recorded authentication failure
    pub fn last_error(&self) -> AuthError {
        self.last_error
    }

    /// Whether connecting peers must be asked to authenticate
    pub fn requires_pairing(&self) -> bool {
        self.config.level.requires_pairing()
    }

    /// Parameters for a locally initiated authentication request.
    pub fn request_for(&mut self, bd_handle: u8) -> AuthInfo {
        self.bd_handle = bd_handle;
        self.last_error = AuthError::None;
        self.current()
    }

    /// Parameters for the reply to a peer's authentication request.
    ///
    /// A configuration without security refuses pairing outright; one that
    /// requires MITM protection refuses a peer offering only unauthenticated
    /// pairing.
    pub fn reply_for(&mut self, peer: &AuthInfo) -> AuthInfo {
        self.bd_handle = peer.bd_handle;
        self.last_error = if self.config.is_no_security() {
            AuthError::PairingNotSupported
        } else if self.config.level.is_authenticated() && !peer.level.is_authenticated() {
            AuthError::AuthenticationRequirements
        } else {
            AuthError::None
        };
        self.current()
    }

    /// Record a failure reported by the transport.
    pub fn record_failure(&mut self, info: &AuthInfo) {
        self.bd_handle = info.bd_handle;
        self.last_error = info.error;
    }

    fn current(&self) -> AuthInfo {
        AuthInfo {
            bd_handle: self.bd_handle,
            mode: self.config.mode,
            level: self.config.level,
            bonding: self.config.bonding,
            key_size: self.config.key_size,
            error: self.last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(level: SecurityLevel) -> AuthInfo {
        AuthInfo {
            bd_handle: 3,
            mode: SecurityMode::Mode1,
            level,
            bonding: true,
            key_size: 16,
            error: AuthError::None,
        }
    }

    #[test]
    fn test_auth_error_taxonomy_display() {
        assert_eq!(AuthError::from(0x04).to_string(), "CONFIRM_VALUE_NOT_MATCH");
        assert_eq!(AuthError::from(0x06).to_string(), "INSUFFICIENT_ENCRYPTION_KEY_SIZE");
        assert_eq!(AuthError::from(0x08).to_string(), "UNSPECIFIED_REASON");
        assert_eq!(AuthError::from(0x15).to_string(), "AUTHENTICATION_TIMEOUT");
        assert_eq!(AuthError::from(0x33).to_string(), "0x33");
    }

    #[test]
    fn test_reply_refuses_pairing_without_security() {
        let mut ctx = SecurityContext::new(SecurityConfig::no_security());
        let reply = ctx.reply_for(&peer(SecurityLevel::Unauthenticated));
        assert_eq!(reply.error, AuthError::PairingNotSupported);
        assert_eq!(reply.bd_handle, 3);
    }

    #[test]
    fn test_reply_refuses_unauthenticated_peer_when_mitm_required() {
        let mut ctx = SecurityContext::new(SecurityConfig {
            level: SecurityLevel::Authenticated,
            ..SecurityConfig::default()
        });
        let reply = ctx.reply_for(&peer(SecurityLevel::Unauthenticated));
        assert_eq!(reply.error, AuthError::AuthenticationRequirements);

        let reply = ctx.reply_for(&peer(SecurityLevel::SecureConnections));
        assert_eq!(reply.error, AuthError::None);
    }

    #[test]
    fn test_new_request_clears_last_error() {
        let mut ctx = SecurityContext::new(SecurityConfig::default());
        let mut failed = peer(SecurityLevel::Unauthenticated);
        failed.error = AuthError::Timeout;
        ctx.record_failure(&failed);
        assert_eq!(ctx.last_error(), AuthError::Timeout);

        let request = ctx.request_for(7);
        assert_eq!(request.error, AuthError::None);
        assert_eq!(request.bd_handle, 7);
        assert_eq!(ctx.last_error(), AuthError::None);
    }
}
