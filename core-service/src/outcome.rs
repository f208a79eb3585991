//! Uniform Operation Results
//!
//! Every facade operation reports one of a small set of statuses plus an
//! optional message, with any payload riding alongside. Hosts switch on
//! the status; the message is display material, never something to parse.

use core_auth::{AuthError, TokenError};
use core_transfer::TransferError;
use std::fmt;

/// The uniform status taxonomy of the client facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    /// The operation completed.
    Success,
    /// No usable credentials; an interactive login is required.
    NeedsAuthentication,
    /// The addressed remote entry does not exist.
    NotFound,
    /// The operation was cancelled cooperatively.
    Cancelled,
    /// A wire-protocol invariant was violated (cursor mismatch, size
    /// mismatch, rejected redirect).
    ProtocolError,
    /// Any other terminal failure; see the message.
    Failed,
}

impl fmt::Display for OpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OpStatus::Success => "success",
            OpStatus::NeedsAuthentication => "needs authentication",
            OpStatus::NotFound => "not found",
            OpStatus::Cancelled => "cancelled",
            OpStatus::ProtocolError => "protocol error",
            OpStatus::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Result of one facade operation: a status, an optional message, and the
/// operation's payload when it succeeded.
#[derive(Debug)]
pub struct OpOutcome<T> {
    pub status: OpStatus,
    pub message: Option<String>,
    pub value: Option<T>,
}

impl<T> OpOutcome<T> {
    pub fn success(value: T) -> Self {
        Self {
            status: OpStatus::Success,
            message: None,
            value: Some(value),
        }
    }

    pub fn status(status: OpStatus) -> Self {
        Self {
            status,
            message: None,
            value: None,
        }
    }

    pub fn failure(status: OpStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            value: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OpStatus::Success
    }

    /// Map the payload type, keeping status and message.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OpOutcome<U> {
        OpOutcome {
            status: self.status,
            message: self.message,
            value: self.value.map(f),
        }
    }
}

impl<T> From<AuthError> for OpOutcome<T> {
    fn from(e: AuthError) -> Self {
        let status = match &e {
            AuthError::Cancelled => OpStatus::Cancelled,
            AuthError::StateMismatch | AuthError::MalformedRedirect => OpStatus::ProtocolError,
            AuthError::ProviderDenied(_) | AuthError::NoPendingLogin => {
                OpStatus::NeedsAuthentication
            }
            _ => OpStatus::Failed,
        };
        OpOutcome::failure(status, e.to_string())
    }
}

impl<T> From<TokenError> for OpOutcome<T> {
    fn from(e: TokenError) -> Self {
        let status = match &e {
            TokenError::InvalidGrant => OpStatus::NeedsAuthentication,
            _ => OpStatus::Failed,
        };
        OpOutcome::failure(status, e.to_string())
    }
}

impl<T> From<TransferError> for OpOutcome<T> {
    fn from(e: TransferError) -> Self {
        let status = match &e {
            TransferError::Cancelled => OpStatus::Cancelled,
            TransferError::NotFound(_) => OpStatus::NotFound,
            TransferError::SessionProtocolError(_) | TransferError::SizeMismatch { .. } => {
                OpStatus::ProtocolError
            }
            _ => OpStatus::Failed,
        };
        OpOutcome::failure(status, e.to_string())
    }
}

impl<T> From<bridge_traits::BridgeError> for OpOutcome<T> {
    fn from(e: bridge_traits::BridgeError) -> Self {
        use bridge_traits::BridgeError;
        let status = match &e {
            BridgeError::NotFound(_) | BridgeError::Api { status: 404, .. } => OpStatus::NotFound,
            _ => OpStatus::Failed,
        };
        OpOutcome::failure(status, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_outcome() {
        let outcome = OpOutcome::success(42);
        assert!(outcome.is_success());
        assert_eq!(outcome.value, Some(42));
        assert!(outcome.message.is_none());
    }

    #[test]
    fn test_map_keeps_status() {
        let outcome = OpOutcome::success(21).map(|v| v * 2);
        assert_eq!(outcome.value, Some(42));

        let failure: OpOutcome<u32> = OpOutcome::failure(OpStatus::NotFound, "gone");
        let mapped = failure.map(|v| v * 2);
        assert_eq!(mapped.status, OpStatus::NotFound);
        assert_eq!(mapped.message.as_deref(), Some("gone"));
        assert!(mapped.value.is_none());
    }

    #[test]
    fn test_auth_error_mapping() {
        let cancelled: OpOutcome<()> = AuthError::Cancelled.into();
        assert_eq!(cancelled.status, OpStatus::Cancelled);

        let mismatch: OpOutcome<()> = AuthError::StateMismatch.into();
        assert_eq!(mismatch.status, OpStatus::ProtocolError);

        let denied: OpOutcome<()> = AuthError::ProviderDenied("denied".to_string()).into();
        assert_eq!(denied.status, OpStatus::NeedsAuthentication);

        let port: OpOutcome<()> = AuthError::PortUnavailable { port: 8400 }.into();
        assert_eq!(port.status, OpStatus::Failed);
        assert!(port.message.unwrap().contains("8400"));
    }

    #[test]
    fn test_token_error_mapping() {
        let invalid: OpOutcome<()> = TokenError::InvalidGrant.into();
        assert_eq!(invalid.status, OpStatus::NeedsAuthentication);

        let network: OpOutcome<()> = TokenError::NetworkFailure("timeout".to_string()).into();
        assert_eq!(network.status, OpStatus::Failed);
    }

    #[test]
    fn test_transfer_error_mapping() {
        let cancelled: OpOutcome<()> = TransferError::Cancelled.into();
        assert_eq!(cancelled.status, OpStatus::Cancelled);

        let missing: OpOutcome<()> = TransferError::NotFound("id".to_string()).into();
        assert_eq!(missing.status, OpStatus::NotFound);

        let mismatch: OpOutcome<()> = TransferError::SizeMismatch {
            expected: 10,
            actual: 5,
        }
        .into();
        assert_eq!(mismatch.status, OpStatus::ProtocolError);
    }
}
