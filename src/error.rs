use crate::types::{EscrowKey, ExternalReference};
use thiserror::Error;

/// Escrow ledger errors.
///
/// Every precondition failure aborts the whole operation with no partial
/// effect; none of these are recovered or retried inside the engine.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// Malformed or policy-violating input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Key or external reference does not resolve to a live record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not the identity required for the action.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Operation invalid for the record's current lifecycle state.
    #[error("Invalid state: {0}")]
    State(String),

    /// Would collide with a live record.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl EscrowError {
    pub fn record_not_found(key: EscrowKey) -> Self {
        Self::NotFound(format!("no escrow record with key {key}"))
    }

    pub fn reference_not_found(ext_ref: ExternalReference) -> Self {
        Self::NotFound(format!("no escrow record with external reference {ext_ref}"))
    }
}
