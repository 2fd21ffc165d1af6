//! Interfaces to the hosting environment.
//!
//! The engine treats identity authentication, account lookup, wall-clock
//! time, value transfer, and notification delivery as external concerns.
//! Each is a pluggable trait so the engine itself stays free of any host
//! binding.

use crate::error::EscrowError;
use crate::types::{AccountId, AssetAmount};
use chrono::{DateTime, Utc};

/// Account-existence lookup.
pub trait AccountDirectory: Send + Sync {
    fn exists(&self, account: &AccountId) -> bool;
}

/// Authenticated-caller identity for the current operation.
pub trait AuthContext: Send + Sync {
    /// True when the current caller carries the authority of `account`.
    fn has_auth(&self, account: &AccountId) -> bool;

    /// Fail the operation unless the current caller is `account`.
    fn require_auth(&self, account: &AccountId) -> Result<(), EscrowError> {
        if self.has_auth(account) {
            Ok(())
        } else {
            Err(EscrowError::Authorization(format!(
                "missing authority of {account}"
            )))
        }
    }
}

/// Wall-clock time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The underlying asset-transfer primitive. Assumed atomic with the
/// calling operation: a returned error leaves no value moved.
pub trait FundTransferGateway: Send + Sync {
    fn send(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: &AssetAmount,
        memo: &str,
    ) -> Result<(), EscrowError>;
}

/// Outbound notification delivery. Best effort; never fails the operation.
pub trait NotificationBus: Send + Sync {
    fn notify(&self, account: &AccountId);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NobodyAuth;

    impl AuthContext for NobodyAuth {
        fn has_auth(&self, _account: &AccountId) -> bool {
            false
        }
    }

    #[test]
    fn require_auth_maps_to_authorization_error() {
        let auth = NobodyAuth;
        let err = auth.require_auth(&AccountId::new("alice")).unwrap_err();
        assert!(matches!(err, EscrowError::Authorization(_)));
    }
}
